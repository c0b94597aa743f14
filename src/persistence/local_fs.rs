use super::{document_id, Document, DocumentStore, PersistenceError, StoreFuture, ID_FIELD};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Local filesystem document store
///
/// Layout: `<base>/<collection>/<id>.json`. Generated ids start with the
/// insert time in hex, so sorting file names gives insertion order.
#[derive(Debug, Clone)]
pub struct LocalFsDocumentStore {
    base_path: PathBuf,
    instance_tag: u32,
    sequence: Arc<AtomicU64>,
}

impl LocalFsDocumentStore {
    pub fn new(base_path: PathBuf) -> Self {
        LocalFsDocumentStore {
            base_path,
            instance_tag: rand::random::<u32>(),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(collection)
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_path(collection).join(format!("{}.json", id))
    }

    fn next_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        format!("{:012x}{:08x}{:04x}", millis, self.instance_tag, seq & 0xffff)
    }
}

/// Ids become file names, so path separators and dot segments are refused.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

impl DocumentStore for LocalFsDocumentStore {
    fn create_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            tokio::fs::create_dir_all(self.collection_path(name)).await?;
            Ok(())
        })
    }

    fn fetch_all<'a>(&'a self, collection: &'a str) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            let dir = self.collection_path(collection);
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(PersistenceError::MissingCollection(collection.to_string()))
                }
                Err(e) => return Err(e.into()),
            };

            let mut paths = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    paths.push(path);
                }
            }
            paths.sort();

            let mut documents = Vec::with_capacity(paths.len());
            for path in paths {
                let bytes = tokio::fs::read(&path).await?;
                let document: Document = serde_json::from_slice(&bytes)?;
                documents.push(document);
            }
            Ok(documents)
        })
    }

    fn insert<'a>(
        &'a self,
        mut document: Document,
        collection: &'a str,
        return_document: bool,
    ) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            let id = match document_id(&document) {
                Some(id) => id,
                None => self.next_id(),
            };
            if !is_safe_id(&id) {
                return Err(PersistenceError::Unavailable(format!(
                    "id {:?} cannot be stored as a file name",
                    id
                )));
            }

            let path = self.document_path(collection, &id);
            if tokio::fs::try_exists(&path).await? {
                return Err(PersistenceError::DuplicateId(id));
            }
            tokio::fs::create_dir_all(self.collection_path(collection)).await?;

            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            let bytes = serde_json::to_vec_pretty(&document)?;

            // Write-then-rename so a crash never leaves a truncated document.
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;

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
            if !is_safe_id(id) {
                return Ok(());
            }
            match tokio::fs::remove_file(self.document_path(collection, id)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()), // Already deleted
                Err(e) => Err(e.into()),
            }
        })
    }
}
