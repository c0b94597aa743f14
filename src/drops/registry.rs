use super::record::{DropContents, DropId, DropRecord, PendingDrop, Position, RecordError, StoredItem};
use super::store::DropStore;
use crate::catalog::ItemCatalog;
use crate::clock::Clock;
use crate::persistence::{DocumentStore, PersistenceError};
use crate::presentation::PresentationSink;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifetime of a drop whose catalog entry has no timeout (5 minutes)
pub const DEFAULT_EXPIRATION: Duration = Duration::from_millis(300_000);

const UNINITIALIZED: u8 = 0;
const LOADING: u8 = 1;
const READY: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum DropError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("store assigned id {0} which is already live")]
    DuplicateId(DropId),
    #[error("drop registry already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Document collection holding the drops
    pub collection: String,
    pub default_expiration: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            collection: "drops".to_string(),
            default_expiration: DEFAULT_EXPIRATION,
        }
    }
}

/// Item drops lying in the world, kept in memory and mirrored to a
/// document store.
///
/// `initialize` must run once before serving; until then the registry
/// behaves as empty. Share it between tasks behind an `Arc`.
pub struct DropRegistry<S: DocumentStore, C: Clock> {
    store: DropStore,
    persistence: S,
    catalog: Arc<dyn ItemCatalog>,
    sink: Arc<dyn PresentationSink>,
    clock: C,
    config: RegistryConfig,
    state: AtomicU8,
}

impl<S: DocumentStore, C: Clock> DropRegistry<S, C> {
    pub fn new(
        persistence: S,
        catalog: Arc<dyn ItemCatalog>,
        sink: Arc<dyn PresentationSink>,
        clock: C,
        config: RegistryConfig,
    ) -> Self {
        DropRegistry {
            store: DropStore::new(),
            persistence,
            catalog,
            sink,
            clock,
            config,
            state: AtomicU8::new(UNINITIALIZED),
        }
    }

    /// Create the collection and load every persisted drop.
    ///
    /// Drops that expired while the process was down are deleted from the
    /// store instead of loaded. Loaded drops are announced to the sink.
    /// Returns the number of drops loaded.
    pub async fn initialize(&self) -> Result<usize, DropError> {
        if self
            .state
            .compare_exchange(UNINITIALIZED, LOADING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DropError::AlreadyInitialized);
        }

        match self.load_persisted().await {
            Ok(loaded) => {
                self.state.store(READY, Ordering::SeqCst);
                Ok(loaded)
            }
            Err(e) => {
                self.state.store(UNINITIALIZED, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn load_persisted(&self) -> Result<usize, DropError> {
        let collection = self.config.collection.as_str();
        self.persistence.create_collection(collection).await?;
        let documents = self.persistence.fetch_all(collection).await?;

        let now = self.clock.now();
        let mut live = Vec::with_capacity(documents.len());
        let mut stale = Vec::new();
        for document in documents {
            match DropRecord::from_document(document) {
                Ok(record) if record.is_expired(now) => stale.push(record),
                Ok(record) => live.push(record),
                Err(e) => warn!(collection, error = %e, "Skipping unreadable drop document"),
            }
        }

        let loaded = self.store.load(live);
        let count = loaded.len();
        for record in loaded {
            self.sink.append(record);
        }

        let purged = self.purge(&stale).await;
        info!(
            collection,
            loaded = count,
            expired = stale.len(),
            purged,
            "Drop registry initialized"
        );
        Ok(count)
    }

    /// Drop `item` at `position`.
    ///
    /// Returns `Ok(None)` when the catalog does not know the item; nothing
    /// is persisted or announced in that case. The sink only hears about
    /// the drop once it is persisted and cached.
    pub async fn add(
        &self,
        item: &StoredItem,
        position: Position,
    ) -> Result<Option<DropId>, DropError> {
        let Some(base) = self.catalog.base_item(&item.db_name) else {
            debug!(db_name = %item.db_name, "Ignoring drop of unknown item");
            return Ok(None);
        };

        let timeout = base
            .ms_timeout
            .map(Duration::from_millis)
            .unwrap_or(self.config.default_expiration);
        let pending = PendingDrop {
            contents: DropContents {
                item: item.clone(),
                name: base.name.clone(),
                model: base.model.clone(),
                expiration: self.clock.now() + timeout,
            },
            position,
        };

        let document = pending.to_document().map_err(RecordError::from)?;
        let stored = self
            .persistence
            .insert(document, &self.config.collection, true)
            .await?;
        let record = DropRecord::from_document(stored)?;
        let id = record.id.clone();

        if !self.store.insert(record.clone()) {
            // A concurrent initialize may already have loaded this document
            if self.store.get(&id).as_ref() == Some(&record) {
                debug!(id = %id, "Drop already loaded by initialize");
                return Ok(Some(id));
            }
            return Err(DropError::DuplicateId(id));
        }
        self.sink.append(record);

        debug!(
            id = %id,
            db_name = %item.db_name,
            quantity = item.quantity,
            expiration = pending.contents.expiration.as_millis(),
            "Drop added"
        );
        Ok(Some(id))
    }

    /// Pick up the drop `id`.
    ///
    /// Returns the dropped contents without id or position, or `Ok(None)`
    /// when no live drop has that id. Every expired drop in memory is
    /// swept during the lookup and deleted from the store.
    ///
    /// The drop leaves memory before the store delete is awaited; if that
    /// delete fails the error is returned and the document survives until
    /// the next `initialize`.
    pub async fn sub(&self, id: &str) -> Result<Option<DropContents>, DropError> {
        let target = DropId::from(id);
        let scan = self.store.take(&target, self.clock.now());

        for record in &scan.evicted {
            self.sink.remove(&record.id);
        }

        let picked = match scan.found {
            Some(record) => {
                self.sink.remove(&record.id);
                match self
                    .persistence
                    .delete_by_id(record.id.as_str(), &self.config.collection)
                    .await
                {
                    Ok(()) => Ok(Some(record.into_contents())),
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "Picked-up drop left in store");
                        Err(DropError::from(e))
                    }
                }
            }
            None => Ok(None),
        };

        if !scan.evicted.is_empty() {
            let purged = self.purge(&scan.evicted).await;
            debug!(evicted = scan.evicted.len(), purged, "Expired drops swept");
        }

        picked
    }

    /// Best-effort delete of expired drops; failures are logged and the
    /// documents are retried by the next `initialize`.
    async fn purge(&self, records: &[DropRecord]) -> usize {
        let deletes = records.iter().map(|record| {
            self.persistence
                .delete_by_id(record.id.as_str(), &self.config.collection)
        });
        let results = futures::future::join_all(deletes).await;

        let mut purged = 0;
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(()) => purged += 1,
                Err(e) => warn!(id = %record.id, error = %e, "Failed to delete expired drop"),
            }
        }
        purged
    }

    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::SeqCst) == READY
    }

    /// Number of drops in memory, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains(&self, id: &DropId) -> bool {
        self.store.contains(id)
    }

    /// Copy of the in-memory drops, oldest first
    pub fn snapshot(&self) -> Vec<DropRecord> {
        self.store.snapshot()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
