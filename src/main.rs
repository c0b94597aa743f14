//! Item drop registry demo
//!
//! Loads configuration (see `item_drops::config`), restores persisted
//! drops, then drops and picks up a sample item.
//!
//! ```text
//! DROPS_STORE_TYPE=local_fs DROPS_DATA_PATH=/tmp/drops cargo run
//! ```

use item_drops::catalog::{BaseItem, ItemCatalog, StaticItemCatalog};
use item_drops::config::{DropsConfig, StoreType};
use item_drops::drops::{DropRegistry, Position, StoredItem};
use item_drops::observability::init_tracing;
use item_drops::persistence::{DocumentStore, InMemoryDocumentStore, LocalFsDocumentStore};
use item_drops::presentation::{DropMarkers, MarkerBackend, MarkerSpec, MarkerStyle};
use item_drops::ProductionClock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Marker backend that logs instead of rendering
#[derive(Default)]
struct LogMarkers {
    next_handle: AtomicU64,
}

impl MarkerBackend for LogMarkers {
    type Handle = u64;

    fn create(&self, spec: &MarkerSpec) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        info!(
            handle,
            uid = spec.uid.as_deref().unwrap_or("-"),
            text = %spec.text,
            x = spec.position.x,
            y = spec.position.y,
            z = spec.position.z,
            "Show marker"
        );
        handle
    }

    fn release(&self, handle: u64) {
        info!(handle, "Hide marker");
    }
}

fn demo_catalog() -> StaticItemCatalog {
    StaticItemCatalog::new()
        .with_item(
            BaseItem::new("water_bottle", "Water Bottle", "prop_ld_flow_bottle")
                .with_timeout_ms(60_000),
        )
        .with_item(BaseItem::new("burger", "Burger", "prop_cs_burger_01"))
}

async fn run<S: DocumentStore>(
    store: S,
    catalog: Arc<dyn ItemCatalog>,
    config: &DropsConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = DropRegistry::new(
        store,
        catalog,
        Arc::new(DropMarkers::new(LogMarkers::default(), MarkerStyle::default())),
        ProductionClock::new(),
        config.registry_config(),
    );

    let restored = registry.initialize().await?;
    info!(restored, "Registry ready");

    let item = StoredItem::new("water_bottle", 1);
    let position = Position::new(-1041.2, -2744.6, 21.4);
    let Some(id) = registry.add(&item, position).await? else {
        info!(db_name = %item.db_name, "Item type unknown to the catalog");
        return Ok(());
    };

    match registry.sub(id.as_str()).await? {
        Some(contents) => info!(
            id = %id,
            name = %contents.name,
            quantity = contents.item.quantity,
            "Picked up drop"
        ),
        None => info!(id = %id, "Drop already gone"),
    }

    let unknown = registry
        .add(&StoredItem::new("nonexistent_item", 1), position)
        .await?;
    info!(accepted = unknown.is_some(), "Tried to drop an unknown item");
    info!(live = registry.len(), "Done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DropsConfig::load()?;
    init_tracing(&config.logging).map_err(|e| e as Box<dyn std::error::Error>)?;

    let catalog: Arc<dyn ItemCatalog> = match &config.catalog_path {
        Some(path) => Arc::new(StaticItemCatalog::from_file(path)?),
        None => Arc::new(demo_catalog()),
    };

    info!(
        collection = %config.collection,
        store = ?config.store.store_type,
        default_expiration_ms = config.default_expiration.as_millis() as u64,
        "Starting item drop registry"
    );

    match config.store.store_type {
        StoreType::InMemory => run(InMemoryDocumentStore::new(), catalog, &config).await,
        StoreType::LocalFs => {
            run(LocalFsDocumentStore::new(config.store.path.clone()), catalog, &config).await
        }
    }
}
