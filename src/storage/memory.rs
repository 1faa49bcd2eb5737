//! In-process document store
//!
//! Collections live in one ordered map behind a `parking_lot::RwLock`.
//! Batches and transactions take the write lock for their whole apply step,
//! which is what makes them atomic and serializes concurrent transactions.
//! No lock is ever held across an `.await`.
//!
//! Faults can be injected per operation kind and path prefix so callers can
//! exercise their store-failure paths.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::core::types::Fields;
use crate::core::{Error, Result};
use crate::storage::{CollectionPath, Document, DocumentRef, DocumentStore, Transaction, TransactionBody};
use crate::system::metrics::Metrics;

type Collection = BTreeMap<String, Fields>;
type Collections = BTreeMap<CollectionPath, Collection>;

/// Raw dump of every collection: path -> id -> fields
pub type Snapshot = BTreeMap<String, BTreeMap<String, Fields>>;

/// Operation kinds a fault can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    /// get, list and query
    Read,
    /// add, set, update and delete of single documents
    Write,
    /// batch deletes; checked for every reference before anything applies
    Batch,
    /// transactions; checked when the transaction starts
    Transaction,
    /// every operation
    Any,
}

/// Injected failure: operations of kind `op` on paths under `path_prefix`
/// fail with `StoreUnavailable`
#[derive(Debug, Clone)]
pub struct Fault {
    /// Operation kind
    pub op: FaultOp,
    /// Collection path prefix; empty matches everything
    pub path_prefix: String,
    /// Remaining failures; `None` fails forever
    pub remaining: Option<usize>,
}

impl Fault {
    /// Fault that fails every matching operation until cleared
    pub fn new(op: FaultOp, path_prefix: impl Into<String>) -> Self {
        Self { op, path_prefix: path_prefix.into(), remaining: None }
    }

    /// Limit the fault to the next `n` matching operations
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, op: FaultOp, path: Option<&CollectionPath>) -> bool {
        let op_matches = self.op == FaultOp::Any || self.op == op;
        let path_matches =
            self.path_prefix.is_empty() || path.is_some_and(|path| path.starts_with(&self.path_prefix));
        op_matches && path_matches && self.remaining != Some(0)
    }
}

/// In-process [`DocumentStore`]
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryDocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.load_snapshot(snapshot);
        store
    }

    /// Merge a snapshot into the store, replacing documents with equal ids
    pub fn load_snapshot(&self, snapshot: Snapshot) {
        let mut collections = self.collections.write();
        for (path, docs) in snapshot {
            let collection = collections.entry(CollectionPath::root(&path)).or_default();
            for (id, fields) in docs {
                collection.insert(id, fields);
            }
        }
    }

    /// Dump every non-empty collection
    pub fn snapshot(&self) -> Snapshot {
        self.collections
            .read()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(path, docs)| (path.as_str().to_string(), docs.clone()))
            .collect()
    }

    /// Total number of stored documents
    pub fn document_count(&self) -> usize {
        self.collections.read().values().map(|docs| docs.len()).sum()
    }

    /// Add an injected fault
    pub fn inject_fault(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    /// Remove every injected fault
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    fn check_fault(&self, op: FaultOp, path: Option<&CollectionPath>) -> Result<()> {
        let mut faults = self.faults.lock();
        let Some(index) = faults.iter().position(|fault| fault.matches(op, path)) else {
            return Ok(());
        };

        if let Some(remaining) = faults[index].remaining.as_mut() {
            *remaining -= 1;
        }
        faults.retain(|fault| fault.remaining != Some(0));
        Metrics::global().store.failures.inc();
        let at = path.map_or("transaction", CollectionPath::as_str);
        Err(Error::store_unavailable(format!("{:?} failed at {}", op, at)))
    }

    fn get_sync(&self, collection: &CollectionPath, id: &str) -> Result<Option<Document>> {
        self.check_fault(FaultOp::Read, Some(collection))?;
        Metrics::global().store.reads.inc();
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    fn list_sync(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        self.check_fault(FaultOp::Read, Some(collection))?;
        Metrics::global().store.reads.inc();
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| docs.iter().map(|(id, fields)| Document::new(id.clone(), fields.clone())).collect())
            .unwrap_or_default())
    }

    fn query_sync(&self, collection: &CollectionPath, field: &str, value: &Value) -> Result<Vec<Document>> {
        self.check_fault(FaultOp::Read, Some(collection))?;
        Metrics::global().store.reads.inc();
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|docs| filter_equals(docs.iter(), field, value))
            .unwrap_or_default())
    }

    fn set_sync(&self, collection: &CollectionPath, id: &str, fields: Fields) -> Result<()> {
        self.check_fault(FaultOp::Write, Some(collection))?;
        Metrics::global().store.writes.inc();
        self.collections
            .write()
            .entry(collection.clone())
            .or_default()
            .insert(id.to_string(), fields);
        Ok(())
    }

    fn update_sync(&self, collection: &CollectionPath, id: &str, patch: Fields) -> Result<()> {
        self.check_fault(FaultOp::Write, Some(collection))?;
        Metrics::global().store.writes.inc();
        let mut collections = self.collections.write();
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| Error::not_found(format!("{}/{}", collection, id)))?;
        existing.extend(patch);
        Ok(())
    }

    fn delete_sync(&self, collection: &CollectionPath, id: &str) -> Result<()> {
        self.check_fault(FaultOp::Write, Some(collection))?;
        Metrics::global().store.writes.inc();
        if let Some(docs) = self.collections.write().get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    fn batch_delete_sync(&self, refs: &[DocumentRef]) -> Result<()> {
        // Every reference is checked before the lock is taken, so a failure
        // leaves all documents in place.
        for doc_ref in refs {
            self.check_fault(FaultOp::Batch, Some(&doc_ref.collection))?;
        }

        Metrics::global().store.writes.inc();
        let mut collections = self.collections.write();
        for doc_ref in refs {
            if let Some(docs) = collections.get_mut(&doc_ref.collection) {
                docs.remove(&doc_ref.id);
            }
        }
        Ok(())
    }

    fn transaction_sync(&self, body: &mut TransactionBody<'_>) -> Result<()> {
        self.check_fault(FaultOp::Transaction, None)?;
        Metrics::global().store.transactions.inc();

        let mut collections = self.collections.write();
        let staged = {
            let mut tx = MemoryTransaction { committed: &*collections, staged: HashMap::new() };
            body(&mut tx)?;
            tx.staged
        };

        for ((collection, id), fields) in staged {
            match fields {
                Some(fields) => {
                    collections.entry(collection).or_default().insert(id, fields);
                }
                None => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }
        Ok(())
    }
}

fn filter_equals<'a>(
    docs: impl Iterator<Item = (&'a String, &'a Fields)>,
    field: &str,
    value: &Value,
) -> Vec<Document> {
    docs.filter(|(_, fields)| fields.get(field) == Some(value))
        .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
        .collect()
}

/// Transaction view over the locked collections plus staged writes;
/// a staged `None` is a delete
struct MemoryTransaction<'a> {
    committed: &'a Collections,
    staged: HashMap<(CollectionPath, String), Option<Fields>>,
}

impl MemoryTransaction<'_> {
    fn current(&self, collection: &CollectionPath, id: &str) -> Option<Fields> {
        match self.staged.get(&(collection.clone(), id.to_string())) {
            Some(staged) => staged.clone(),
            None => self.committed.get(collection).and_then(|docs| docs.get(id)).cloned(),
        }
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&mut self, collection: &CollectionPath, id: &str) -> Result<Option<Document>> {
        Ok(self.current(collection, id).map(|fields| Document::new(id, fields)))
    }

    fn query_equals(&mut self, collection: &CollectionPath, field: &str, value: &Value) -> Result<Vec<Document>> {
        let mut view: Collection = self.committed.get(collection).cloned().unwrap_or_default();
        for ((path, id), fields) in &self.staged {
            if path != collection {
                continue;
            }
            match fields {
                Some(fields) => view.insert(id.clone(), fields.clone()),
                None => view.remove(id),
            };
        }
        Ok(filter_equals(view.iter(), field, value))
    }

    fn set(&mut self, collection: &CollectionPath, id: &str, fields: Fields) {
        self.staged.insert((collection.clone(), id.to_string()), Some(fields));
    }

    fn update(&mut self, collection: &CollectionPath, id: &str, patch: Fields) -> Result<()> {
        let mut fields = self
            .current(collection, id)
            .ok_or_else(|| Error::not_found(format!("{}/{}", collection, id)))?;
        fields.extend(patch);
        self.staged.insert((collection.clone(), id.to_string()), Some(fields));
        Ok(())
    }

    fn delete(&mut self, collection: &CollectionPath, id: &str) {
        self.staged.insert((collection.clone(), id.to_string()), None);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(&self, collection: &CollectionPath, id: &str) -> Result<Option<Document>> {
        self.get_sync(collection, id)
    }

    async fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        self.list_sync(collection)
    }

    async fn query_equals(&self, collection: &CollectionPath, field: &str, value: &Value) -> Result<Vec<Document>> {
        self.query_sync(collection, field, value)
    }

    async fn add_document(&self, collection: &CollectionPath, fields: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.set_sync(collection, &id, fields)?;
        Ok(id)
    }

    async fn set_document(&self, collection: &CollectionPath, id: &str, fields: Fields) -> Result<()> {
        self.set_sync(collection, id, fields)
    }

    async fn update_document(&self, collection: &CollectionPath, id: &str, patch: Fields) -> Result<()> {
        self.update_sync(collection, id, patch)
    }

    async fn delete_document(&self, collection: &CollectionPath, id: &str) -> Result<()> {
        self.delete_sync(collection, id)
    }

    async fn batch_delete(&self, refs: Vec<DocumentRef>) -> Result<()> {
        self.batch_delete_sync(&refs)
    }

    async fn run_transaction(&self, body: &mut TransactionBody<'_>) -> Result<()> {
        self.transaction_sync(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ModuleCollection;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn users() -> CollectionPath {
        CollectionPath::root("users")
    }

    #[tokio::test]
    async fn set_get_update_delete() {
        let store = MemoryDocumentStore::new();
        store.set_document(&users(), "u1", fields(json!({"email": "a@x.io", "name": "A"}))).await.unwrap();

        store.update_document(&users(), "u1", fields(json!({"name": "B"}))).await.unwrap();
        let doc = store.get_document(&users(), "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], "B");
        assert_eq!(doc.fields["email"], "a@x.io");

        store.delete_document(&users(), "u1").await.unwrap();
        assert!(store.get_document(&users(), "u1").await.unwrap().is_none());
        // Deleting again is not an error
        store.delete_document(&users(), "u1").await.unwrap();
    }

    #[tokio::test]
    async fn update_of_missing_document_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store.update_document(&users(), "ghost", Fields::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn query_equals_filters_on_field() {
        let store = MemoryDocumentStore::new();
        let lessons = CollectionPath::root("lessons");
        store.set_document(&lessons, "l1", fields(json!({"moduleId": "m1"}))).await.unwrap();
        store.set_document(&lessons, "l2", fields(json!({"moduleId": "m2"}))).await.unwrap();

        let hits = store.query_equals(&lessons, "moduleId", &json!("m1")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "l1");
    }

    #[tokio::test]
    async fn batch_delete_is_all_or_nothing() {
        let store = MemoryDocumentStore::new();
        let a = CollectionPath::root("a");
        let b = CollectionPath::root("b");
        store.set_document(&a, "1", Fields::new()).await.unwrap();
        store.set_document(&b, "2", Fields::new()).await.unwrap();

        store.inject_fault(Fault::new(FaultOp::Batch, "b"));
        let refs = vec![DocumentRef::new(a.clone(), "1"), DocumentRef::new(b.clone(), "2")];
        assert!(store.batch_delete(refs.clone()).await.is_err());
        assert_eq!(store.document_count(), 2);

        store.clear_faults();
        store.batch_delete(refs).await.unwrap();
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn failed_transaction_discards_staged_writes() {
        let store = MemoryDocumentStore::new();
        store.set_document(&users(), "u1", fields(json!({"n": 1}))).await.unwrap();

        let result = store
            .run_transaction(&mut |tx: &mut dyn Transaction| {
                tx.update(&users(), "u1", fields(json!({"n": 2})))?;
                let seen = tx.get(&users(), "u1")?.unwrap();
                assert_eq!(seen.fields["n"], 2);
                Err(Error::conflict("abort"))
            })
            .await;

        assert!(result.unwrap_err().is_conflict());
        let doc = store.get_document(&users(), "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields["n"], 1);
    }

    #[tokio::test]
    async fn committed_transaction_applies_deletes() {
        let store = MemoryDocumentStore::new();
        store.set_document(&users(), "u1", fields(json!({"n": 1}))).await.unwrap();
        store.set_document(&users(), "u2", fields(json!({"n": 1}))).await.unwrap();

        store
            .run_transaction(&mut |tx: &mut dyn Transaction| {
                tx.delete(&users(), "u1");
                assert!(tx.get(&users(), "u1")?.is_none());
                assert_eq!(tx.query_equals(&users(), "n", &json!(1))?.len(), 1);
                Ok(())
            })
            .await
            .unwrap();

        assert!(store.get_document(&users(), "u1").await.unwrap().is_none());
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn limited_fault_expires() {
        let store = MemoryDocumentStore::new();
        store.inject_fault(Fault::new(FaultOp::Read, "users").times(1));
        assert!(store.list_documents(&users()).await.is_err());
        assert!(store.list_documents(&users()).await.is_ok());
    }

    #[tokio::test]
    async fn fault_prefix_matches_whole_segments() {
        let store = MemoryDocumentStore::new();
        store.inject_fault(Fault::new(FaultOp::Read, "courses/c1"));
        let sibling = CollectionPath::modules("c10", ModuleCollection::Modules);
        let nested = CollectionPath::modules("c1", ModuleCollection::Modules);
        assert!(store.list_documents(&sibling).await.is_ok());
        assert!(store.list_documents(&nested).await.is_err());

        store.clear_faults();
        store.inject_fault(Fault::new(FaultOp::Transaction, "users"));
        assert!(store.run_transaction(&mut |_tx: &mut dyn Transaction| Ok(())).await.is_ok());
    }

    #[test]
    fn snapshot_round_trips_through_load() {
        let mut snapshot = Snapshot::new();
        snapshot
            .entry("courses/c1/module".to_string())
            .or_default()
            .insert("m1".to_string(), fields(json!({"title": "Intro"})));

        let store = MemoryDocumentStore::from_snapshot(snapshot.clone());
        assert_eq!(store.snapshot(), snapshot);
    }
}
