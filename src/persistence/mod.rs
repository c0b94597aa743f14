//! Document Store Abstraction
//!
//! Drops are persisted as JSON documents in a named collection. The
//! registry only needs four operations from the backing engine:
//! create a collection, fetch everything in it, insert one document and
//! delete one document by id.
//!
//! Implementations:
//! - `InMemoryDocumentStore`: For unit tests and DST
//! - `LocalFsDocumentStore`: One JSON file per document, for development
//! - `SimulatedDocumentStore`: Fault-injecting wrapper for DST

mod local_fs;
mod memory;
mod simulated;

pub use local_fs::LocalFsDocumentStore;
pub use memory::InMemoryDocumentStore;
pub use simulated::{SimulatedDocumentStore, SimulatedStoreConfig, SimulatedStoreStats};

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Field holding the store-assigned document id.
pub const ID_FIELD: &str = "_id";

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Boxed future returned by every `DocumentStore` operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = PersistenceResult<T>> + Send + 'a>>;

/// Error type for document store operations
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("collection not found: {0}")]
    MissingCollection(String),
    #[error("document id already exists: {0}")]
    DuplicateId(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("operation timed out: {0}")]
    TimedOut(String),
}

/// Persistence engine consumed by the drop registry.
///
/// Deleting an id that is not present succeeds; inserting into a
/// collection that was never created creates it.
pub trait DocumentStore: Send + Sync + 'static {
    /// Create the collection if it does not exist yet
    fn create_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()>;

    /// Every document in the collection, oldest insert first
    fn fetch_all<'a>(&'a self, collection: &'a str) -> StoreFuture<'a, Vec<Document>>;

    /// Insert a document and assign it an id.
    ///
    /// With `return_document` the full stored document is returned,
    /// otherwise a document holding only `_id`.
    fn insert<'a>(
        &'a self,
        document: Document,
        collection: &'a str,
        return_document: bool,
    ) -> StoreFuture<'a, Document>;

    /// Delete one document by id
    fn delete_by_id<'a>(&'a self, id: &'a str, collection: &'a str) -> StoreFuture<'a, ()>;
}

/// Normalize a raw `_id` value to its string form.
///
/// Accepts plain strings, numbers and extended-JSON object ids
/// (`{"$oid": "..."}`). Empty strings are rejected.
pub fn normalize_id(raw: &Value) -> Option<String> {
    let id = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => match map.get("$oid") {
            Some(Value::String(s)) => s.clone(),
            _ => return None,
        },
        _ => return None,
    };

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// The normalized id of a document, if it carries one.
pub fn document_id(document: &Document) -> Option<String> {
    document.get(ID_FIELD).and_then(normalize_id)
}
