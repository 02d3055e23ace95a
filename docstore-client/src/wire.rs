//! Request and response shapes shared by commands and the executor.
//!
//! Response bodies are never handed to commands as open JSON objects. Every
//! response is first classified into an [`Envelope`], which admits exactly one
//! of results, no results, conflict, invalid request or server fault.

use std::fmt;

use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Opaque version token of a document, compared only for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeVector(String);

impl ChangeVector {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns `None` for an empty token, which means "no concurrency check".
    pub fn non_empty(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.is_empty()).then_some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn header_value(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.0).map_err(|_| {
            Error::Validation(format!(
                "change vector '{}' cannot be sent as a header value",
                self.0
            ))
        })
    }
}

impl fmt::Display for ChangeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeVector {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChangeVector {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Outbound request as built by a command.
///
/// `path` is relative to the database endpoint of the target node unless it
/// starts with `/`, in which case it is rooted at the node itself.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl WireRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds the conditional-match header when a non-empty expected vector is
    /// given. An empty vector means no concurrency check.
    pub fn with_expected_change_vector(mut self, expected: Option<&ChangeVector>) -> Result<Self> {
        if let Some(expected) = expected.filter(|expected| !expected.is_empty()) {
            self.headers.insert(header::IF_MATCH, expected.header_value()?);
        }
        Ok(self)
    }

    pub fn expected_change_vector(&self) -> Option<ChangeVector> {
        self.headers
            .get(header::IF_MATCH)
            .and_then(|value| value.to_str().ok())
            .and_then(ChangeVector::non_empty)
    }
}

/// Inbound response exactly as the transport received it.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl WireResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Statuses that say the node is unhealthy rather than the request wrong.
    pub fn is_node_failure(&self) -> bool {
        self.status == StatusCode::REQUEST_TIMEOUT || self.status.is_server_error()
    }
}

/// Typed view of a response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "Results", default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Value>,
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "Message", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "ActualChangeVector",
        alias = "ActualchangeVector",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub actual_change_vector: Option<ChangeVector>,
}

impl ResponseBody {
    /// Reads the structured body, if the response carries a JSON object.
    pub fn from_response(response: &WireResponse) -> serde_json::Result<Option<Self>> {
        match &response.body {
            Some(body @ Value::Object(_)) => Self::deserialize(body).map(Some),
            _ => Ok(None),
        }
    }
}

/// The single interpretation of a response under a command's success set.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Results(Vec<Value>),
    NoResults,
    Conflict {
        actual: ChangeVector,
        body: ResponseBody,
    },
    Invalid {
        body: ResponseBody,
    },
    Fault {
        cause: String,
        body: ResponseBody,
    },
}

impl Envelope {
    pub fn classify(response: &WireResponse, success: &[StatusCode]) -> Self {
        let body = match ResponseBody::from_response(response) {
            Ok(body) => body.unwrap_or_default(),
            Err(err) => {
                return Envelope::Fault {
                    cause: format!("malformed response body: {err}"),
                    body: ResponseBody::default(),
                };
            }
        };

        let status = response.status;
        if success.contains(&status) {
            // Proxy pages and bare arrays are not a store answer, even under a success status.
            if matches!(&response.body, Some(raw) if !raw.is_object() && !raw.is_null()) {
                return Envelope::Fault {
                    cause: "response body is not a JSON object".to_string(),
                    body,
                };
            }
            if body.results.is_some() && body.error.is_some() {
                return Envelope::Fault {
                    cause: "response carries both Results and Error".to_string(),
                    body,
                };
            }
            return match body.results {
                None | Some(Value::Null) => Envelope::NoResults,
                Some(Value::Array(records)) if records.is_empty() => Envelope::NoResults,
                Some(Value::Array(records)) => Envelope::Results(records),
                Some(record) => Envelope::Results(vec![record]),
            };
        }

        if status == StatusCode::CONFLICT {
            return match body.actual_change_vector.clone().filter(|cv| !cv.is_empty()) {
                Some(actual) => Envelope::Conflict { actual, body },
                None => Envelope::Fault {
                    cause: "conflict response without ActualChangeVector".to_string(),
                    body,
                },
            };
        }

        if status.is_client_error() && status != StatusCode::REQUEST_TIMEOUT {
            return Envelope::Invalid { body };
        }

        Envelope::Fault {
            cause: format!("unexpected status {status}"),
            body,
        }
    }
}

/// Everything known about a failed exchange, kept whole for diagnostics.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub cause: String,
    pub error: ResponseBody,
    pub options: WireRequest,
    pub response: WireResponse,
    /// Url of the node that answered, filled in by the executor.
    pub node: Option<String>,
}

impl ErrorResponse {
    pub fn new(
        cause: impl Into<String>,
        error: ResponseBody,
        options: &WireRequest,
        response: WireResponse,
    ) -> Self {
        Self {
            cause: cause.into(),
            error,
            options: options.clone(),
            response,
            node: None,
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {} -> {})",
            self.cause, self.options.method, self.options.path, self.response.status
        )?;
        if let Some(error) = &self.error.error {
            write!(f, ": {error}")?;
        }
        if let Some(message) = &self.error.message {
            write!(f, ": {message}")?;
        }
        if let Some(node) = &self.node {
            write!(f, " [node {node}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const OK: &[StatusCode] = &[StatusCode::OK];

    #[test]
    fn array_results_keep_their_order() {
        let response = WireResponse::new(StatusCode::OK)
            .with_body(json!({ "Results": [{ "n": 1 }, { "n": 2 }, { "n": 3 }] }));
        assert_eq!(
            Envelope::classify(&response, OK),
            Envelope::Results(vec![json!({ "n": 1 }), json!({ "n": 2 }), json!({ "n": 3 })])
        );
    }

    #[test]
    fn single_object_result_is_one_record() {
        let response = WireResponse::new(StatusCode::OK).with_body(json!({ "Results": { "n": 1 } }));
        assert_eq!(
            Envelope::classify(&response, OK),
            Envelope::Results(vec![json!({ "n": 1 })])
        );
    }

    #[test]
    fn success_without_results_is_empty() {
        assert_eq!(
            Envelope::classify(&WireResponse::new(StatusCode::OK), OK),
            Envelope::NoResults
        );
        let response = WireResponse::new(StatusCode::OK).with_body(json!({ "Results": [] }));
        assert_eq!(Envelope::classify(&response, OK), Envelope::NoResults);
    }

    #[test]
    fn results_and_error_together_are_a_fault() {
        let response = WireResponse::new(StatusCode::OK)
            .with_body(json!({ "Results": [], "Error": "boom" }));
        assert!(matches!(
            Envelope::classify(&response, OK),
            Envelope::Fault { .. }
        ));
    }

    #[test]
    fn non_object_success_body_is_a_fault() {
        for raw in [json!("<html>proxy login</html>"), json!([{ "Name": "x" }]), json!(7)] {
            let response = WireResponse::new(StatusCode::OK).with_body(raw);
            assert!(matches!(
                Envelope::classify(&response, OK),
                Envelope::Fault { cause, .. } if cause.contains("not a JSON object")
            ));
        }

        let null = WireResponse::new(StatusCode::OK).with_body(Value::Null);
        assert_eq!(Envelope::classify(&null, OK), Envelope::NoResults);
    }

    #[test]
    fn conflict_requires_actual_change_vector() {
        let with_vector = WireResponse::new(StatusCode::CONFLICT)
            .with_body(json!({ "Error": "ConcurrencyException", "ActualchangeVector": "A:2-x" }));
        assert!(matches!(
            Envelope::classify(&with_vector, OK),
            Envelope::Conflict { actual, .. } if actual.as_str() == "A:2-x"
        ));

        let without_vector = WireResponse::new(StatusCode::CONFLICT)
            .with_body(json!({ "Error": "ConcurrencyException" }));
        assert!(matches!(
            Envelope::classify(&without_vector, OK),
            Envelope::Fault { cause, .. } if cause.contains("ActualChangeVector")
        ));
    }

    #[test]
    fn client_errors_are_invalid_and_server_errors_are_faults() {
        let bad_request = WireResponse::new(StatusCode::BAD_REQUEST)
            .with_body(json!({ "Error": "BadRequest", "Message": "no id" }));
        assert!(matches!(
            Envelope::classify(&bad_request, OK),
            Envelope::Invalid { body } if body.message.as_deref() == Some("no id")
        ));

        let unavailable = WireResponse::new(StatusCode::SERVICE_UNAVAILABLE);
        assert!(matches!(
            Envelope::classify(&unavailable, OK),
            Envelope::Fault { .. }
        ));
        assert!(unavailable.is_node_failure());
        assert!(WireResponse::new(StatusCode::REQUEST_TIMEOUT).is_node_failure());
        assert!(!bad_request.is_node_failure());
    }

    #[test]
    fn mistyped_body_fields_are_a_fault() {
        let response = WireResponse::new(StatusCode::OK).with_body(json!({ "Error": 42 }));
        assert!(matches!(
            Envelope::classify(&response, OK),
            Envelope::Fault { cause, .. } if cause.starts_with("malformed")
        ));
    }

    #[test]
    fn headers_are_case_insensitive() {
        let response = WireResponse::new(StatusCode::OK)
            .with_header(header::ETAG, HeaderValue::from_static("A:1-x"));
        assert_eq!(response.header("etag"), Some("A:1-x"));
        assert_eq!(response.header("ETag"), Some("A:1-x"));
    }

    #[test]
    fn expected_change_vector_becomes_if_match() -> Result<()> {
        let expected = ChangeVector::new("A:7-abc");
        let request = WireRequest::new(Method::DELETE, "docs")
            .with_expected_change_vector(Some(&expected))?;
        assert_eq!(request.headers.get("if-match").unwrap(), "A:7-abc");
        assert_eq!(request.expected_change_vector(), Some(expected));

        let unconditional = WireRequest::new(Method::DELETE, "docs").with_expected_change_vector(None)?;
        assert!(unconditional.headers.is_empty());

        let empty = ChangeVector::from("");
        let unchecked = WireRequest::new(Method::PUT, "docs").with_expected_change_vector(Some(&empty))?;
        assert!(unchecked.headers.get(header::IF_MATCH).is_none());
        assert!(unchecked.expected_change_vector().is_none());
        Ok(())
    }

    #[test]
    fn change_vector_with_newline_is_rejected_locally() {
        let broken = ChangeVector::new("A:1\n");
        let result = WireRequest::new(Method::DELETE, "docs").with_expected_change_vector(Some(&broken));
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
