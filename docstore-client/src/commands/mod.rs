//! Document and cluster commands.

mod delete;
mod get;
mod head;
mod put;
mod topology;

pub use delete::DeleteDocumentCommand;
pub use get::{Document, GetDocumentCommand};
pub use head::HeadDocumentCommand;
pub use put::{PutDocumentCommand, PutResult};
pub use topology::GetTopologyCommand;

/// Database-relative endpoint of single-document operations.
const DOCS_PATH: &str = "docs";
