//! Error taxonomy of the client.
//!
//! Local input problems, lost races and server rejections are terminal and
//! reach the caller on the first attempt. Node failures are absorbed by the
//! executor and only surface, with every per-node cause attached, once no
//! candidate node is left.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::wire::{ChangeVector, ErrorResponse, WireResponse};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed local input, detected before anything was sent.
    #[error("invalid command: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Conflict(Box<ConcurrencyConflict>),

    #[error("server error: {0}")]
    Server(Box<ErrorResponse>),

    #[error("topology has no nodes to send the request to")]
    NoAvailableNodes,

    /// A command that must not be resent hit a node failure.
    #[error("{0}")]
    NodeUnavailable(NodeFailure),

    #[error("all {} nodes failed: {}", .failures.len(), FailureList(.failures))]
    AllNodesFailed { failures: Vec<NodeFailure> },

    #[error("gave up after {} attempts: {}", .failures.len(), FailureList(.failures))]
    AttemptLimitReached { failures: Vec<NodeFailure> },
}

impl Error {
    pub(crate) fn server(response: ErrorResponse) -> Self {
        Error::Server(Box::new(response))
    }

    /// Records which node produced a terminal server-side failure.
    pub(crate) fn attach_node(mut self, url: &str) -> Self {
        match &mut self {
            Error::Server(response) => response.node = Some(url.to_string()),
            Error::Conflict(conflict) => conflict.response.node = Some(url.to_string()),
            _ => {}
        }
        self
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

/// The store rejected an operation because the document changed underneath it.
///
/// Never retried automatically. Retrying with [`ConcurrencyConflict::actual`]
/// overwrites the concurrent change and is the caller's decision.
#[derive(Debug, Error)]
#[error(
    "concurrency conflict on '{key}': expected {}, actual {actual}",
    .expected.as_ref().map_or("<none>", ChangeVector::as_str)
)]
pub struct ConcurrencyConflict {
    pub key: String,
    pub expected: Option<ChangeVector>,
    pub actual: ChangeVector,
    pub response: ErrorResponse,
}

/// Connection-level failure reported by a transport, distinct from any status.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Why one node was given up on during a single `execute` call.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub node: String,
    pub reason: FailureReason,
}

#[derive(Debug, Clone)]
pub enum FailureReason {
    Transport(TransportError),
    /// The node answered with 408 or 5xx.
    Status(Box<ErrorResponse>),
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::Transport(err) => write!(f, "node {} unavailable: {err}", self.node),
            FailureReason::Status(response) => write!(
                f,
                "node {} unavailable: status {}",
                self.node, response.response.status
            ),
        }
    }
}

impl NodeFailure {
    pub fn status(&self) -> Option<&WireResponse> {
        match &self.reason {
            FailureReason::Status(response) => Some(&response.response),
            FailureReason::Transport(_) => None,
        }
    }
}

struct FailureList<'a>(&'a [NodeFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}
