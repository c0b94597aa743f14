//! Deterministic Simulation Testing for the drop registry
//!
//! Shadow-state harness: a seeded workload of adds, pickups, clock jumps
//! and restarts runs against a registry backed by a fault-injecting
//! document store, while a plain model tracks what every call must return.
//!
//! ```text
//! for seed in 0..1000 {
//!     let mut harness = DropsDSTHarness::new(DropsDSTConfig::moderate(seed)).await;
//!     harness.run(500).await;
//!     harness.check_invariants().await;
//! }
//! ```

use crate::catalog::{BaseItem, ItemCatalog, StaticItemCatalog};
use crate::clock::{Clock, SimulatedClock, Timestamp};
use crate::drops::{
    DropContents, DropError, DropId, DropRecord, DropRegistry, Position, RegistryConfig,
    StoredItem,
};
use crate::persistence::{
    DocumentStore, InMemoryDocumentStore, SimulatedDocumentStore, SimulatedStoreConfig,
    SimulatedStoreStats,
};
use crate::presentation::NullSink;
use crate::rng::DeterministicRng;
use ahash::AHashSet;
use std::sync::Arc;
use std::time::Duration;

const INITIALIZE_ATTEMPTS_MAX: usize = 100;
const START_TIME_MS: u64 = 1_000_000;

/// Configuration for drop registry DST
#[derive(Debug, Clone)]
pub struct DropsDSTConfig {
    pub seed: u64,
    pub store_config: SimulatedStoreConfig,
    /// Lifetime of catalog items without their own timeout
    pub default_expiration: Duration,
    /// Probability of an add (vs a pickup)
    pub add_probability: f64,
    /// Probability that an add uses an item missing from the catalog
    pub unknown_item_probability: f64,
    /// Probability of moving the clock forward
    pub advance_probability: f64,
    /// Largest single clock jump
    pub max_advance_ms: u64,
    /// Probability of a restart (fresh registry over the same store)
    pub restart_probability: f64,
}

impl Default for DropsDSTConfig {
    fn default() -> Self {
        DropsDSTConfig {
            seed: 0,
            store_config: SimulatedStoreConfig::default(),
            default_expiration: Duration::from_millis(5_000),
            add_probability: 0.5,
            unknown_item_probability: 0.1,
            advance_probability: 0.15,
            max_advance_ms: 800,
            restart_probability: 0.02,
        }
    }
}

impl DropsDSTConfig {
    pub fn new(seed: u64) -> Self {
        DropsDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// No store faults
    pub fn calm(seed: u64) -> Self {
        DropsDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::no_faults(),
            ..Default::default()
        }
    }

    /// Default store faults
    pub fn moderate(seed: u64) -> Self {
        DropsDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::default(),
            ..Default::default()
        }
    }

    /// High fault rates and frequent restarts
    pub fn chaos(seed: u64) -> Self {
        DropsDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::high_chaos(),
            restart_probability: 0.05,
            ..Default::default()
        }
    }
}

/// Workload operation
#[derive(Debug, Clone)]
pub enum DropOperation {
    Add { db_name: String, quantity: u32 },
    Sub { id: DropId },
    Advance { ms: u64 },
    Restart,
}

/// Result of a DST run
#[derive(Debug, Clone)]
pub struct DropsDSTResult {
    pub seed: u64,
    pub total_operations: u64,
    /// Operations whose store calls all succeeded
    pub successful_operations: u64,
    /// Operations that surfaced a store error (expected under faults)
    pub failed_operations: u64,
    pub adds: u64,
    pub pickups: u64,
    pub empty_pickups: u64,
    pub restarts: u64,
    pub store_stats: SimulatedStoreStats,
    pub invariant_violations: Vec<String>,
}

impl DropsDSTResult {
    pub fn new(seed: u64) -> Self {
        DropsDSTResult {
            seed,
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            adds: 0,
            pickups: 0,
            empty_pickups: 0,
            restarts: 0,
            store_stats: SimulatedStoreStats::default(),
            invariant_violations: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} ok, {} failed), {} adds, {} pickups ({} empty), {} restarts, {} violations",
            self.seed,
            self.total_operations,
            self.successful_operations,
            self.failed_operations,
            self.adds,
            self.pickups,
            self.empty_pickups,
            self.restarts,
            self.invariant_violations.len()
        )
    }
}

/// Ground truth for one drop
#[derive(Debug, Clone)]
struct ModelDrop {
    id: DropId,
    contents: DropContents,
}

type DSTStore = SimulatedDocumentStore<InMemoryDocumentStore>;

/// Main DST harness for the drop registry
pub struct DropsDSTHarness {
    config: DropsDSTConfig,
    rng: DeterministicRng,
    clock: SimulatedClock,
    catalog: Arc<StaticItemCatalog>,
    store: DSTStore,
    inner_store: InMemoryDocumentStore,
    registry: DropRegistry<DSTStore, SimulatedClock>,
    /// Drops the registry must still hand out
    model: Vec<ModelDrop>,
    /// Picked up, but the store delete failed; they come back on restart
    ghosts: Vec<ModelDrop>,
    /// Ids already handed out or swept
    retired: Vec<DropId>,
    result: DropsDSTResult,
}

impl DropsDSTHarness {
    pub async fn new(config: DropsDSTConfig) -> Self {
        let inner_store = InMemoryDocumentStore::new();
        let store =
            SimulatedDocumentStore::new(inner_store.clone(), config.seed, config.store_config.clone());
        let clock = SimulatedClock::new(START_TIME_MS);
        let catalog = Arc::new(
            StaticItemCatalog::new()
                .with_item(
                    BaseItem::new("water_bottle", "Water Bottle", "prop_ld_flow_bottle")
                        .with_timeout_ms(1_000),
                )
                .with_item(BaseItem::new("bandage", "Bandage", "prop_ld_health_pack").with_timeout_ms(250))
                .with_item(BaseItem::new("burger", "Burger", "prop_cs_burger_01")),
        );

        let registry = Self::build_registry(&config, &store, &catalog, &clock);
        let mut harness = DropsDSTHarness {
            rng: DeterministicRng::new(config.seed ^ 0x5eed),
            result: DropsDSTResult::new(config.seed),
            config,
            clock,
            catalog,
            store,
            inner_store,
            registry,
            model: Vec::new(),
            ghosts: Vec::new(),
            retired: Vec::new(),
        };
        harness.initialize_registry().await;
        harness
    }

    fn build_registry(
        config: &DropsDSTConfig,
        store: &DSTStore,
        catalog: &Arc<StaticItemCatalog>,
        clock: &SimulatedClock,
    ) -> DropRegistry<DSTStore, SimulatedClock> {
        let catalog: Arc<dyn ItemCatalog> = catalog.clone();
        DropRegistry::new(
            store.clone(),
            catalog,
            Arc::new(NullSink),
            clock.clone(),
            RegistryConfig {
                collection: "drops".to_string(),
                default_expiration: config.default_expiration,
            },
        )
    }

    async fn initialize_registry(&mut self) {
        for _ in 0..INITIALIZE_ATTEMPTS_MAX {
            match self.registry.initialize().await {
                Ok(_) => return,
                Err(DropError::Persistence(_)) => continue,
                Err(e) => {
                    self.violation(format!("initialize failed: {}", e));
                    return;
                }
            }
        }
        self.violation("initialize never succeeded".to_string());
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    fn violation(&mut self, message: String) {
        self.result.invariant_violations.push(format!(
            "[op {} @ {}ms] {}",
            self.result.total_operations,
            self.clock.current_ms(),
            message
        ));
    }

    /// Generate the next operation
    pub fn next_operation(&mut self) -> DropOperation {
        let roll = self.rng.next_u64() as f64 / u64::MAX as f64;
        let restart = self.config.restart_probability;
        let advance = restart + self.config.advance_probability;

        if roll < restart {
            DropOperation::Restart
        } else if roll < advance {
            DropOperation::Advance {
                ms: self.rng.gen_range(1, self.config.max_advance_ms + 1),
            }
        } else if self.rng.gen_bool(self.config.add_probability) {
            let db_name = if self.rng.gen_bool(self.config.unknown_item_probability) {
                "nonexistent_item".to_string()
            } else {
                let names = ["water_bottle", "bandage", "burger"];
                self.rng.choose(&names).copied().unwrap_or("burger").to_string()
            };
            DropOperation::Add {
                db_name,
                quantity: self.rng.gen_range(1, 10) as u32,
            }
        } else {
            DropOperation::Sub { id: self.pick_target() }
        }
    }

    fn pick_target(&mut self) -> DropId {
        if !self.model.is_empty() && self.rng.gen_bool(0.8) {
            let idx = self.rng.gen_range(0, self.model.len() as u64) as usize;
            return self.model[idx].id.clone();
        }
        if let Some(id) = self.rng.choose(&self.retired).cloned() {
            return id;
        }
        DropId::new(format!("missing-{}", self.rng.next_u64()))
    }

    /// Run `count` operations, checking invariants after each
    pub async fn run(&mut self, count: usize) {
        for _ in 0..count {
            let op = self.next_operation();
            self.execute(op).await;
            self.result.total_operations += 1;
            self.check_invariants().await;
        }
        self.result.store_stats = self.store.stats();
    }

    pub async fn execute(&mut self, op: DropOperation) {
        match op {
            DropOperation::Add { db_name, quantity } => self.do_add(&db_name, quantity).await,
            DropOperation::Sub { id } => self.do_sub(id).await,
            DropOperation::Advance { ms } => {
                self.clock.advance_ms(ms);
                self.result.successful_operations += 1;
            }
            DropOperation::Restart => self.do_restart().await,
        }
    }

    async fn do_add(&mut self, db_name: &str, quantity: u32) {
        let item = StoredItem::new(db_name, quantity);
        let position = Position::new(
            self.rng.gen_range(0, 1000) as f32,
            self.rng.gen_range(0, 1000) as f32,
            0.0,
        );
        let persisted_before = self.inner_store.len("drops");
        let cached_before = self.registry.len();
        let expected_expiration = self.catalog.base_item(db_name).map(|base| {
            self.now()
                + base
                    .ms_timeout
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.default_expiration)
        });

        match self.registry.add(&item, position).await {
            Ok(Some(id)) => {
                self.result.adds += 1;
                self.result.successful_operations += 1;
                let Some(base) = self.catalog.base_item(db_name).cloned() else {
                    self.violation(format!("unknown item {} was accepted as {}", db_name, id));
                    return;
                };
                if self.model.iter().any(|m| m.id == id) {
                    self.violation(format!("add returned duplicate id {}", id));
                }
                let contents = DropContents {
                    item,
                    name: base.name,
                    model: base.model,
                    expiration: expected_expiration.unwrap_or_default(),
                };
                self.model.push(ModelDrop { id, contents });
            }
            Ok(None) => {
                self.result.successful_operations += 1;
                if self.catalog.base_item(db_name).is_some() {
                    self.violation(format!("known item {} was rejected", db_name));
                }
                if self.inner_store.len("drops") != persisted_before {
                    self.violation(format!("unknown item {} touched the store", db_name));
                }
                if self.registry.len() != cached_before {
                    self.violation(format!("unknown item {} touched the cache", db_name));
                }
            }
            Err(DropError::Persistence(_)) => {
                self.result.failed_operations += 1;
                if self.inner_store.len("drops") != persisted_before {
                    self.violation("failed add left a document behind".to_string());
                }
                if self.registry.len() != cached_before {
                    self.violation("failed add left a cached drop behind".to_string());
                }
            }
            Err(e) => self.violation(format!("add failed unexpectedly: {}", e)),
        }
    }

    async fn do_sub(&mut self, id: DropId) {
        let now = self.now();
        let expected = self
            .model
            .iter()
            .position(|m| m.id == id)
            .map(|idx| self.model.remove(idx));
        let live = expected.filter(|m| !m.contents.expiration.has_passed(now));

        match self.registry.sub(id.as_str()).await {
            Ok(Some(contents)) => {
                self.result.pickups += 1;
                self.result.successful_operations += 1;
                match &live {
                    Some(model) if model.contents == contents => {}
                    Some(model) => self.violation(format!(
                        "sub({}) returned {:?}, expected {:?}",
                        id, contents, model.contents
                    )),
                    None => self.violation(format!("sub({}) returned a dead drop", id)),
                }
            }
            Ok(None) => {
                self.result.empty_pickups += 1;
                self.result.successful_operations += 1;
                if live.is_some() {
                    self.violation(format!("sub({}) lost a live drop", id));
                }
            }
            Err(DropError::Persistence(_)) => {
                self.result.failed_operations += 1;
                match live {
                    Some(model) => self.ghosts.push(model),
                    None => self.violation(format!("sub({}) failed without a live target", id)),
                }
            }
            Err(e) => self.violation(format!("sub({}) failed unexpectedly: {}", id, e)),
        }
        self.retired.push(id);
    }

    async fn do_restart(&mut self) {
        self.result.restarts += 1;
        self.registry =
            Self::build_registry(&self.config, &self.store, &self.catalog, &self.clock);
        self.initialize_registry().await;

        // Failed pickups are still persisted and come back
        let now = self.now();
        for ghost in self.ghosts.drain(..) {
            if !ghost.contents.expiration.has_passed(now) {
                self.retired.retain(|id| *id != ghost.id);
                self.model.push(ghost);
            }
        }
        self.model.retain(|m| !m.contents.expiration.has_passed(now));
        self.result.successful_operations += 1;
    }

    /// Check registry, store and model against each other
    pub async fn check_invariants(&mut self) {
        let now = self.now();
        let snapshot = self.registry.snapshot();

        let mut seen = AHashSet::new();
        for record in &snapshot {
            if !seen.insert(record.id.clone()) {
                self.violation(format!("duplicate id {} in memory", record.id));
            }
        }

        let live_memory: Vec<&DropRecord> =
            snapshot.iter().filter(|r| !r.is_expired(now)).collect();

        for record in &live_memory {
            if !self.inner_store.contains("drops", record.id.as_str()) {
                self.violation(format!("live drop {} is not persisted", record.id));
            }
            let matches_model = self
                .model
                .iter()
                .find(|m| m.id == record.id)
                .map(|m| m.contents == record.contents);
            match matches_model {
                Some(true) => {}
                Some(false) => self.violation(format!("drop {} differs from model", record.id)),
                None => self.violation(format!("drop {} is live but not in model", record.id)),
            }
        }

        let live_model: Vec<DropId> = self
            .model
            .iter()
            .filter(|m| !m.contents.expiration.has_passed(now))
            .map(|m| m.id.clone())
            .collect();
        for id in live_model {
            if !live_memory.iter().any(|r| r.id == id) {
                self.violation(format!("model drop {} missing from memory", id));
            }
        }

        let persisted = match self.inner_store.fetch_all("drops").await {
            Ok(documents) => documents,
            Err(_) => Vec::new(),
        };
        for document in persisted {
            let Ok(record) = DropRecord::from_document(document) else {
                self.violation("undecodable document in store".to_string());
                continue;
            };
            if record.is_expired(now) {
                continue;
            }
            let in_memory = live_memory.iter().any(|r| r.id == record.id);
            let is_ghost = self.ghosts.iter().any(|g| g.id == record.id);
            if !in_memory && !is_ghost {
                self.violation(format!("persisted drop {} unknown to memory", record.id));
            }
        }
    }

    pub fn result(&self) -> &DropsDSTResult {
        &self.result
    }

    pub fn into_result(mut self) -> DropsDSTResult {
        self.result.store_stats = self.store.stats();
        self.result
    }
}

/// Run DST across a range of seeds
pub async fn run_dst_batch<F>(
    start_seed: u64,
    count: usize,
    ops_per_run: usize,
    config_fn: F,
) -> Vec<DropsDSTResult>
where
    F: Fn(u64) -> DropsDSTConfig,
{
    let mut results = Vec::with_capacity(count);
    for i in 0..count {
        let seed = start_seed + i as u64;
        let mut harness = DropsDSTHarness::new(config_fn(seed)).await;
        harness.run(ops_per_run).await;
        results.push(harness.into_result());
    }
    results
}

/// Summary of batch results
pub fn summarize_batch(results: &[DropsDSTResult]) -> String {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();

    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let total_pickups: u64 = results.iter().map(|r| r.pickups).sum();
    let total_restarts: u64 = results.iter().map(|r| r.restarts).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} total ops, {} pickups, {} restarts",
        passed, total, total_ops, total_pickups, total_restarts
    );

    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dst_harness_calm() {
        let mut harness = DropsDSTHarness::new(DropsDSTConfig::calm(42)).await;
        harness.run(300).await;

        let result = harness.result();
        assert!(
            result.is_success(),
            "Calm mode should not have invariant violations: {:?}",
            result.invariant_violations
        );
        assert_eq!(result.failed_operations, 0);
        assert!(result.adds > 0);
        assert!(result.pickups > 0);
    }

    #[tokio::test]
    async fn test_dst_harness_with_faults() {
        let mut harness = DropsDSTHarness::new(DropsDSTConfig::chaos(123)).await;
        harness.run(500).await;

        let result = harness.result();
        assert!(
            result.is_success(),
            "Invariants must hold under faults: {:?}",
            result.invariant_violations
        );
        println!("{}", result.summary());
    }

    #[tokio::test]
    async fn test_dst_deterministic() {
        let mut a = DropsDSTHarness::new(DropsDSTConfig::moderate(12345)).await;
        a.run(200).await;
        let mut b = DropsDSTHarness::new(DropsDSTConfig::moderate(12345)).await;
        b.run(200).await;

        assert_eq!(a.result().summary(), b.result().summary());
    }

    #[tokio::test]
    async fn test_workload_generator_mix() {
        let mut harness = DropsDSTHarness::new(DropsDSTConfig::new(7)).await;

        let (mut adds, mut subs, mut advances, mut restarts) = (0, 0, 0, 0);
        for _ in 0..2000 {
            match harness.next_operation() {
                DropOperation::Add { .. } => adds += 1,
                DropOperation::Sub { .. } => subs += 1,
                DropOperation::Advance { .. } => advances += 1,
                DropOperation::Restart => restarts += 1,
            }
        }

        assert!(adds > 0 && subs > 0 && advances > 0 && restarts > 0);
    }
}
