//! Outbound collaborators: the document store that mirrors projects and
//! the asset store that holds uploaded visuals.

pub mod assets;
pub mod documents;

pub use assets::{AssetStore, S3AssetStore};
pub use documents::{Document, DocumentStore, PgDocumentStore};
