//! The unit of work the executor sends to the cluster.
//!
//! A command knows how to turn its own fields into a [`WireRequest`] and how to
//! turn the matching [`WireResponse`] into a typed result. It never performs
//! I/O itself: node selection, sending and failover belong to
//! [`crate::executor::RequestExecutor`].

use http::StatusCode;

use crate::error::{ConcurrencyConflict, Error, Result};
use crate::wire::{ChangeVector, Envelope, ErrorResponse, WireRequest, WireResponse};

pub trait Command: Send + Sync {
    type Output: Send;

    /// Short operation name used in logs.
    fn name(&self) -> &'static str;

    /// Statuses this command interprets as success.
    fn success_statuses(&self) -> &[StatusCode];

    /// Builds the request from the command's own fields.
    ///
    /// Fails only for malformed local input, never for anything the server
    /// alone can decide.
    fn build(&self) -> Result<WireRequest>;

    /// Interprets the response to a request produced by [`Command::build`].
    fn parse(&self, request: &WireRequest, response: WireResponse) -> Result<Self::Output>;

    /// Whether the command may be sent again to another node after a node
    /// failure. Commands that are not safe to resend must return `false`.
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Maps the terminal, non-success envelopes shared by every document command.
///
/// `key` and `expected` identify the document for a conflict. Success
/// envelopes are handed back so the caller can finish parsing.
pub(crate) fn classify(
    key: &str,
    expected: Option<&ChangeVector>,
    request: &WireRequest,
    response: WireResponse,
    success: &[StatusCode],
) -> Result<(Envelope, WireResponse)> {
    match Envelope::classify(&response, success) {
        envelope @ (Envelope::Results(_) | Envelope::NoResults) => Ok((envelope, response)),
        Envelope::Conflict { actual, body } => {
            Err(Error::Conflict(Box::new(ConcurrencyConflict {
                key: key.to_string(),
                expected: expected.cloned(),
                actual,
                response: ErrorResponse::new("concurrency conflict", body, request, response),
            })))
        }
        Envelope::Invalid { body } => Err(Error::server(ErrorResponse::new(
            "request rejected by server",
            body,
            request,
            response,
        ))),
        Envelope::Fault { cause, body } => {
            Err(Error::server(ErrorResponse::new(cause, body, request, response)))
        }
    }
}

pub(crate) fn require_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(Error::Validation("document key must not be empty".to_string()));
    }
    Ok(())
}
