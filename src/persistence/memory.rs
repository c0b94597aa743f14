use super::{
    document_id, Document, DocumentStore, PersistenceError, StoreFuture, ID_FIELD,
};
use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Collections {
    collections: AHashMap<String, Vec<Document>>,
    next_id: u64,
}

/// In-memory document store for unit tests and deterministic simulation.
///
/// Clones share the same collections, so a test can keep a handle to
/// inspect what the registry persisted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection (for testing)
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Check if a collection is empty or missing (for testing)
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Check if a document id is stored (for testing)
    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.inner
            .read()
            .collections
            .get(collection)
            .is_some_and(|docs| docs.iter().any(|d| document_id(d).as_deref() == Some(id)))
    }

    /// Ids of all documents in insertion order (for testing)
    pub fn ids(&self, collection: &str) -> Vec<String> {
        self.inner
            .read()
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter_map(document_id).collect())
            .unwrap_or_default()
    }

    /// Store a document exactly as given, bypassing id assignment (for testing)
    pub fn seed(&self, collection: &str, document: Document) {
        self.inner
            .write()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn create_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.inner
                .write()
                .collections
                .entry(name.to_string())
                .or_default();
            Ok(())
        })
    }

    fn fetch_all<'a>(&'a self, collection: &'a str) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            self.inner
                .read()
                .collections
                .get(collection)
                .cloned()
                .ok_or_else(|| PersistenceError::MissingCollection(collection.to_string()))
        })
    }

    fn insert<'a>(
        &'a self,
        mut document: Document,
        collection: &'a str,
        return_document: bool,
    ) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            let mut inner = self.inner.write();

            let id = match document_id(&document) {
                Some(id) => id,
                None => {
                    inner.next_id += 1;
                    format!("{:024x}", inner.next_id)
                }
            };

            let docs = inner.collections.entry(collection.to_string()).or_default();
            if docs.iter().any(|d| document_id(d).as_deref() == Some(id.as_str())) {
                return Err(PersistenceError::DuplicateId(id));
            }

            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            docs.push(document.clone());

            if return_document {
                Ok(document)
            } else {
                let mut only_id = Document::new();
                only_id.insert(ID_FIELD.to_string(), Value::String(id));
                Ok(only_id)
            }
        })
    }

    fn delete_by_id<'a>(&'a self, id: &'a str, collection: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.write();
            let docs = inner
                .collections
                .get_mut(collection)
                .ok_or_else(|| PersistenceError::MissingCollection(collection.to_string()))?;
            docs.retain(|d| document_id(d).as_deref() != Some(id));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_insert_assigns_unique_ids() {
        let store = InMemoryDocumentStore::new();
        store.create_collection("drops").await.unwrap();

        let a = store.insert(doc(json!({"n": 1})), "drops", true).await.unwrap();
        let b = store.insert(doc(json!({"n": 2})), "drops", true).await.unwrap();

        let id_a = document_id(&a).unwrap();
        let id_b = document_id(&b).unwrap();
        assert_ne!(id_a, id_b);
        assert_eq!(a.get("n"), Some(&json!(1)));
        assert_eq!(store.ids("drops"), vec![id_a, id_b]);
    }

    #[tokio::test]
    async fn test_insert_without_return_document() {
        let store = InMemoryDocumentStore::new();
        let returned = store.insert(doc(json!({"n": 1})), "drops", false).await.unwrap();

        assert_eq!(returned.len(), 1);
        assert!(returned.contains_key(ID_FIELD));
        assert_eq!(store.len("drops"), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = InMemoryDocumentStore::new();
        store.insert(doc(json!({"_id": "x"})), "drops", true).await.unwrap();

        let result = store.insert(doc(json!({"_id": "x"})), "drops", true).await;
        assert!(matches!(result, Err(PersistenceError::DuplicateId(id)) if id == "x"));
        assert_eq!(store.len("drops"), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_collection() {
        let store = InMemoryDocumentStore::new();
        let result = store.fetch_all("drops").await;
        assert!(matches!(result, Err(PersistenceError::MissingCollection(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(doc(json!({"n": 1})), "drops", true).await.unwrap();
        let id = document_id(&stored).unwrap();

        store.delete_by_id(&id, "drops").await.unwrap();
        store.delete_by_id(&id, "drops").await.unwrap();
        assert!(store.is_empty("drops"));
        assert!(!store.contains("drops", &id));
    }
}
