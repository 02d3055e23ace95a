use http::{Method, StatusCode};
use serde_json::Value;

use super::DOCS_PATH;
use crate::command::{Command, classify, require_key};
use crate::error::{Error, Result};
use crate::wire::{ChangeVector, Envelope, WireRequest, WireResponse};

// 404 is a valid "no such document" answer, not a failure.
const SUCCESS: &[StatusCode] = &[StatusCode::OK, StatusCode::NOT_FOUND];

const METADATA: &str = "@metadata";

/// Loads one or many documents by key.
#[derive(Debug, Clone)]
pub struct GetDocumentCommand {
    keys: Vec<String>,
    metadata_only: bool,
}

/// A stored document with its `@metadata` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn key(&self) -> Option<&str> {
        self.metadata("@id")
    }

    pub fn change_vector(&self) -> Option<ChangeVector> {
        self.metadata("@change-vector").and_then(ChangeVector::non_empty)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn metadata(&self, field: &str) -> Option<&str> {
        self.0.get(METADATA)?.get(field)?.as_str()
    }
}

impl GetDocumentCommand {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            keys: vec![key.into()],
            metadata_only: false,
        }
    }

    pub fn many<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            metadata_only: false,
        }
    }

    /// Ask the store for `@metadata` only, without document bodies.
    pub fn metadata_only(mut self) -> Self {
        self.metadata_only = true;
        self
    }

    fn primary_key(&self) -> &str {
        self.keys.first().map_or("", String::as_str)
    }
}

impl Command for GetDocumentCommand {
    /// Found documents in request order. Empty when nothing was found.
    type Output = Vec<Document>;

    fn name(&self) -> &'static str {
        "get"
    }

    fn success_statuses(&self) -> &[StatusCode] {
        SUCCESS
    }

    fn build(&self) -> Result<WireRequest> {
        if self.keys.is_empty() {
            return Err(Error::Validation("get requires at least one key".to_string()));
        }

        let mut request = WireRequest::new(Method::GET, DOCS_PATH);
        for key in &self.keys {
            require_key(key)?;
            request = request.with_query("id", key.as_str());
        }
        if self.metadata_only {
            request = request.with_query("metadataOnly", "true");
        }
        Ok(request)
    }

    fn parse(&self, request: &WireRequest, response: WireResponse) -> Result<Vec<Document>> {
        let (envelope, response) =
            classify(self.primary_key(), None, request, response, SUCCESS)?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        Ok(match envelope {
            // Keys that do not exist come back as nulls in multi-key loads.
            Envelope::Results(records) => records
                .into_iter()
                .filter(|record| !record.is_null())
                .map(Document::new)
                .collect(),
            _ => Vec::new(),
        })
    }
}
