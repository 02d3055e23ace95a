use http::{Method, StatusCode};

use super::DOCS_PATH;
use crate::command::{Command, classify, require_key};
use crate::error::Result;
use crate::wire::{ChangeVector, WireRequest, WireResponse};

// Without an expected vector a missing document is already in the desired state.
const UNCONDITIONAL_SUCCESS: &[StatusCode] =
    &[StatusCode::OK, StatusCode::NO_CONTENT, StatusCode::NOT_FOUND];
const CONDITIONAL_SUCCESS: &[StatusCode] = &[StatusCode::OK, StatusCode::NO_CONTENT];

/// Deletes a document, optionally only if it is still at an expected change
/// vector.
#[derive(Debug, Clone)]
pub struct DeleteDocumentCommand {
    key: String,
    change_vector: Option<ChangeVector>,
}

impl DeleteDocumentCommand {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            change_vector: None,
        }
    }

    /// Only delete if the stored document is still at `change_vector`.
    /// An empty vector leaves the delete unconditional.
    pub fn with_change_vector(mut self, change_vector: impl Into<String>) -> Self {
        self.change_vector = ChangeVector::non_empty(change_vector);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Command for DeleteDocumentCommand {
    type Output = ();

    fn name(&self) -> &'static str {
        "delete"
    }

    fn success_statuses(&self) -> &[StatusCode] {
        match self.change_vector {
            Some(_) => CONDITIONAL_SUCCESS,
            None => UNCONDITIONAL_SUCCESS,
        }
    }

    fn build(&self) -> Result<WireRequest> {
        require_key(&self.key)?;
        WireRequest::new(Method::DELETE, DOCS_PATH)
            .with_query("id", self.key.as_str())
            .with_expected_change_vector(self.change_vector.as_ref())
    }

    fn parse(&self, request: &WireRequest, response: WireResponse) -> Result<()> {
        classify(
            &self.key,
            self.change_vector.as_ref(),
            request,
            response,
            self.success_statuses(),
        )?;
        Ok(())
    }
}
