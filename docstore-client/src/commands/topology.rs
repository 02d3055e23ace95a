use http::{Method, StatusCode};
use serde::Deserialize;

use crate::command::{Command, classify};
use crate::error::{Error, Result};
use crate::topology::{ServerNode, Topology};
use crate::wire::{ErrorResponse, ResponseBody, WireRequest, WireResponse};

const SUCCESS: &[StatusCode] = &[StatusCode::OK];

/// Asks any node for the current set of nodes serving a database.
#[derive(Debug, Clone)]
pub struct GetTopologyCommand {
    database: String,
}

#[derive(Deserialize)]
struct TopologyPayload {
    #[serde(rename = "Nodes")]
    nodes: Vec<ServerNode>,
    #[serde(rename = "Etag")]
    etag: i64,
}

impl GetTopologyCommand {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
        }
    }
}

impl Command for GetTopologyCommand {
    type Output = Topology;

    fn name(&self) -> &'static str {
        "get-topology"
    }

    fn success_statuses(&self) -> &[StatusCode] {
        SUCCESS
    }

    fn build(&self) -> Result<WireRequest> {
        if self.database.trim().is_empty() {
            return Err(Error::Validation("database name must not be empty".to_string()));
        }
        Ok(WireRequest::new(Method::GET, "/topology").with_query("name", self.database.as_str()))
    }

    fn parse(&self, request: &WireRequest, response: WireResponse) -> Result<Topology> {
        let (_, response) = classify(&self.database, None, request, response, SUCCESS)?;

        let payload = response
            .body
            .clone()
            .ok_or_else(|| "topology response has no body".to_string())
            .and_then(|body| {
                serde_json::from_value::<TopologyPayload>(body)
                    .map_err(|err| format!("malformed topology response: {err}"))
            });

        match payload {
            Ok(payload) => Ok(Topology::new(
                payload.etag,
                payload.nodes.into_iter().map(|mut node| {
                    if node.database.is_empty() {
                        node.database.clone_from(&self.database);
                    }
                    node
                }),
            )),
            Err(cause) => {
                let body = ResponseBody::from_response(&response)
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                Err(Error::server(ErrorResponse::new(cause, body, request, response)))
            }
        }
    }
}
