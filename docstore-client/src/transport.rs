//! The single network primitive the executor relies on.

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::error::TransportError;
use crate::topology::ServerNode;
use crate::wire::{WireRequest, WireResponse};

/// Sends one request to one node.
///
/// An `Err` means no HTTP response was obtained at all. Every response that
/// arrived, whatever its status, is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        node: &ServerNode,
        request: &WireRequest,
    ) -> Result<WireResponse, TransportError>;
}

/// [`Transport`] over HTTP using a shared `reqwest` client.
///
/// The client carries no timeout of its own; the executor bounds each attempt.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        node: &ServerNode,
        request: &WireRequest,
    ) -> Result<WireResponse, TransportError> {
        let url = node.resolve(&request.path);
        trace!(method = %request.method, %url, "http request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(to_transport_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| TransportError::Body(err.to_string()))?;

        Ok(WireResponse {
            status,
            headers,
            body: decode_body(&bytes),
        })
    }
}

fn to_transport_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

// Non-JSON payloads (proxy error pages and the like) are kept verbatim as a
// string so they still reach the caller inside an ErrorResponse.
fn decode_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    )
}
