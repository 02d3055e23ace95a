use http::{Method, StatusCode, header};

use super::DOCS_PATH;
use crate::command::{Command, classify, require_key};
use crate::error::Result;
use crate::wire::{ChangeVector, WireRequest, WireResponse};

const SUCCESS: &[StatusCode] = &[StatusCode::OK, StatusCode::NOT_FOUND];
// 304 only answers an If-None-Match, so it is accepted only when one was sent.
const CONDITIONAL_SUCCESS: &[StatusCode] =
    &[StatusCode::OK, StatusCode::NOT_MODIFIED, StatusCode::NOT_FOUND];

/// Reads a document's current change vector without loading its body.
#[derive(Debug, Clone)]
pub struct HeadDocumentCommand {
    key: String,
    known: Option<ChangeVector>,
}

impl HeadDocumentCommand {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            known: None,
        }
    }

    /// Vector the caller already holds. The store answers 304 while it is
    /// still current.
    pub fn if_none_match(mut self, change_vector: impl Into<String>) -> Self {
        self.known = ChangeVector::non_empty(change_vector);
        self
    }
}

impl Command for HeadDocumentCommand {
    /// `None` when the document does not exist.
    type Output = Option<ChangeVector>;

    fn name(&self) -> &'static str {
        "head"
    }

    fn success_statuses(&self) -> &[StatusCode] {
        match self.known {
            Some(_) => CONDITIONAL_SUCCESS,
            None => SUCCESS,
        }
    }

    fn build(&self) -> Result<WireRequest> {
        require_key(&self.key)?;
        let mut request = WireRequest::new(Method::HEAD, DOCS_PATH).with_query("id", self.key.as_str());
        if let Some(known) = &self.known {
            request.headers.insert(header::IF_NONE_MATCH, known.header_value()?);
        }
        Ok(request)
    }

    fn parse(&self, request: &WireRequest, response: WireResponse) -> Result<Option<ChangeVector>> {
        let (_, response) = classify(&self.key, None, request, response, self.success_statuses())?;

        Ok(match response.status {
            StatusCode::NOT_FOUND => None,
            StatusCode::NOT_MODIFIED => self.known.clone(),
            _ => response
                .header(header::ETAG.as_str())
                .map(|etag| etag.trim_matches('"'))
                .and_then(ChangeVector::non_empty),
        })
    }
}
