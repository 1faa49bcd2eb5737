//! Storage layer for Course Hub
//!
//! The services talk to a hosted-style document database through the
//! [`DocumentStore`] trait: documents addressed by collection path and id,
//! equality queries, shallow merges, all-or-nothing batch deletes and a
//! serialized transaction primitive. [`MemoryDocumentStore`] is the
//! in-process backend selected by the factory.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::core::types::Fields;
use crate::core::Result;

/// Collection paths, document references and values
pub mod document;

/// In-process backend
pub mod memory;

/// JSON seed import/export
pub mod seed;

/// Backend selection from configuration
pub mod factory;

pub use document::{to_fields, CollectionPath, Document, DocumentRef};
pub use factory::create_store;
pub use memory::{Fault, FaultOp, MemoryDocumentStore};

/// Store handle shared by every service
pub type SharedStore = Arc<dyn DocumentStore>;

/// Body of a transaction.
///
/// Writes staged through the [`Transaction`] commit only when the body
/// returns `Ok`; any error aborts every staged write.
pub type TransactionBody<'a> = dyn FnMut(&mut dyn Transaction) -> Result<()> + Send + 'a;

/// Reads and staged writes available inside a transaction
pub trait Transaction {
    /// Read a document, seeing writes already staged in this transaction
    fn get(&mut self, collection: &CollectionPath, id: &str) -> Result<Option<Document>>;

    /// Equality query, seeing writes already staged in this transaction
    fn query_equals(&mut self, collection: &CollectionPath, field: &str, value: &Value) -> Result<Vec<Document>>;

    /// Stage a create-or-replace
    fn set(&mut self, collection: &CollectionPath, id: &str, fields: Fields);

    /// Stage a shallow merge; NotFound if the document does not exist
    fn update(&mut self, collection: &CollectionPath, id: &str, patch: Fields) -> Result<()>;

    /// Stage a delete; deleting a missing document succeeds
    fn delete(&mut self, collection: &CollectionPath, id: &str);
}

/// Document database client consumed by the services
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; `Ok(None)` when it does not exist
    async fn get_document(&self, collection: &CollectionPath, id: &str) -> Result<Option<Document>>;

    /// Every document of one collection, in id order
    async fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>>;

    /// Documents whose `field` equals `value`
    async fn query_equals(&self, collection: &CollectionPath, field: &str, value: &Value) -> Result<Vec<Document>>;

    /// Create a document with a generated id
    async fn add_document(&self, collection: &CollectionPath, fields: Fields) -> Result<String>;

    /// Create or replace a document
    async fn set_document(&self, collection: &CollectionPath, id: &str, fields: Fields) -> Result<()>;

    /// Shallow-merge `patch` into an existing document
    async fn update_document(&self, collection: &CollectionPath, id: &str, patch: Fields) -> Result<()>;

    /// Delete a document; deleting a missing document succeeds
    async fn delete_document(&self, collection: &CollectionPath, id: &str) -> Result<()>;

    /// Delete every referenced document, or none of them
    async fn batch_delete(&self, refs: Vec<DocumentRef>) -> Result<()>;

    /// Run `body` as one serialized, atomic transaction
    async fn run_transaction(&self, body: &mut TransactionBody<'_>) -> Result<()>;
}
