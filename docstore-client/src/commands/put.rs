use http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::DOCS_PATH;
use crate::command::{Command, classify, require_key};
use crate::error::{Error, Result};
use crate::wire::{ChangeVector, Envelope, ErrorResponse, ResponseBody, WireRequest, WireResponse};

const SUCCESS: &[StatusCode] = &[StatusCode::OK, StatusCode::CREATED];

/// Stores a document under `key`, optionally only if it is still at an
/// expected change vector.
#[derive(Debug, Clone)]
pub struct PutDocumentCommand {
    key: String,
    document: Value,
    change_vector: Option<ChangeVector>,
}

/// What the store recorded for a successful put.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PutResult {
    #[serde(rename = "Id")]
    pub key: String,
    #[serde(rename = "ChangeVector")]
    pub change_vector: ChangeVector,
}

impl PutDocumentCommand {
    pub fn new(key: impl Into<String>, document: Value) -> Self {
        Self {
            key: key.into(),
            document,
            change_vector: None,
        }
    }

    /// Only write if the stored document is still at `change_vector`.
    /// An empty vector leaves the put unconditional.
    pub fn with_change_vector(mut self, change_vector: impl Into<String>) -> Self {
        self.change_vector = ChangeVector::non_empty(change_vector);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Command for PutDocumentCommand {
    type Output = PutResult;

    fn name(&self) -> &'static str {
        "put"
    }

    fn success_statuses(&self) -> &[StatusCode] {
        SUCCESS
    }

    fn build(&self) -> Result<WireRequest> {
        require_key(&self.key)?;
        if !self.document.is_object() {
            return Err(Error::Validation(format!(
                "document '{}' must be a JSON object",
                self.key
            )));
        }

        WireRequest::new(Method::PUT, DOCS_PATH)
            .with_query("id", self.key.as_str())
            .with_body(self.document.clone())
            .with_expected_change_vector(self.change_vector.as_ref())
    }

    fn parse(&self, request: &WireRequest, response: WireResponse) -> Result<PutResult> {
        let (envelope, response) = classify(
            &self.key,
            self.change_vector.as_ref(),
            request,
            response,
            SUCCESS,
        )?;

        let record = match envelope {
            Envelope::Results(mut records) => records.swap_remove(0),
            _ => Value::Null,
        };
        serde_json::from_value(record).map_err(|err| {
            let body = ResponseBody::from_response(&response)
                .ok()
                .flatten()
                .unwrap_or_default();
            Error::server(ErrorResponse::new(
                format!("put response without Id and ChangeVector: {err}"),
                body,
                request,
                response,
            ))
        })
    }
}
