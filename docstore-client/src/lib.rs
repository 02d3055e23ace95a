//! Async client for a clustered document store with optimistic concurrency.
//!
//! Documents carry an opaque version token, the [`ChangeVector`]. Writes and
//! deletes may name the vector they expect; the store rejects them with a
//! conflict when the document has moved on, so the first writer wins without
//! any server-side locking.
//!
//! Each module owns one concern:
//!
//! - [`ordered_list`] is the small ordered list candidate nodes are kept in.
//! - [`wire`] defines requests, responses and the tagged classification of a
//!   response body.
//! - [`command`] is the trait every operation implements; [`commands`] holds
//!   put, get, delete, head and topology lookups.
//! - [`executor`] sends commands to nodes, fails over on node failures and
//!   hands terminal failures back untouched.
//! - [`topology`] keeps the atomically replaceable cluster snapshot.
//! - [`transport`] is the network seam, with a `reqwest` implementation.
//! - [`config`] and [`error`] carry settings and the error taxonomy.
//!
//! ```no_run
//! use docstore_client::{ClientConfig, RequestExecutor};
//! use docstore_client::commands::{DeleteDocumentCommand, GetDocumentCommand};
//!
//! # async fn demo() -> docstore_client::Result<()> {
//! let executor = RequestExecutor::http(ClientConfig::new("Northwind", ["http://127.0.0.1:8080"]))?;
//! let documents = executor.execute(&GetDocumentCommand::new("Products/101")).await?;
//! if let Some(vector) = documents.first().and_then(|doc| doc.change_vector()) {
//!     let delete = DeleteDocumentCommand::new("Products/101").with_change_vector(vector.as_str());
//!     executor.execute(&delete).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod ordered_list;
pub mod topology;
pub mod transport;
pub mod wire;

pub use command::Command;
pub use config::ClientConfig;
pub use error::{ConcurrencyConflict, Error, Result, TransportError};
pub use executor::RequestExecutor;
pub use topology::{ServerNode, Topology};
pub use transport::{HttpTransport, Transport};
pub use wire::{ChangeVector, ErrorResponse, WireRequest, WireResponse};
