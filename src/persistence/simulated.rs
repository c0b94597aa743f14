//! Simulated Document Store with Fault Injection
//!
//! DST wrapper that fails operations with seeded probabilities before they
//! reach the inner store. A failed operation never touches the inner
//! store, so "error returned" always means "nothing was written".

use super::{Document, DocumentStore, PersistenceError, StoreFuture};
use crate::rng::DeterministicRng;
use parking_lot::Mutex;
use std::sync::Arc;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of INSERT failure
    pub insert_fail_prob: f64,
    /// Probability of FETCH_ALL failure
    pub fetch_fail_prob: f64,
    /// Probability of DELETE failure
    pub delete_fail_prob: f64,
    /// Probability of any operation timing out
    pub timeout_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            insert_fail_prob: 0.01,
            fetch_fail_prob: 0.01,
            delete_fail_prob: 0.01,
            timeout_prob: 0.005,
            latency_range_us: (0, 0),
        }
    }
}

impl SimulatedStoreConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            insert_fail_prob: 0.05,
            fetch_fail_prob: 0.05,
            delete_fail_prob: 0.05,
            timeout_prob: 0.02,
            latency_range_us: (0, 0),
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            insert_fail_prob: 0.0,
            fetch_fail_prob: 0.0,
            delete_fail_prob: 0.0,
            timeout_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreStats {
    pub insert_attempts: u64,
    pub insert_failures: u64,
    pub fetch_attempts: u64,
    pub fetch_failures: u64,
    pub delete_attempts: u64,
    pub delete_failures: u64,
    pub timeouts: u64,
}

struct SimulatedStoreInner {
    rng: DeterministicRng,
    stats: SimulatedStoreStats,
}

#[derive(Clone, Copy)]
enum Op {
    Create,
    Fetch,
    Insert,
    Delete,
}

/// Document store wrapper that injects faults
#[derive(Clone)]
pub struct SimulatedDocumentStore<S: DocumentStore + Clone> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: Arc<Mutex<SimulatedStoreInner>>,
}

impl<S: DocumentStore + Clone> SimulatedDocumentStore<S> {
    pub fn new(inner_store: S, seed: u64, config: SimulatedStoreConfig) -> Self {
        SimulatedDocumentStore {
            inner_store,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng: DeterministicRng::new(seed),
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedStoreStats::default();
    }

    pub fn inner(&self) -> &S {
        &self.inner_store
    }

    /// Roll the dice for one operation; returns the injected error, if any,
    /// and the latency to apply first.
    fn roll(&self, op: Op) -> (Option<PersistenceError>, u64) {
        let mut s = self.state.lock();
        let fail_prob = match op {
            Op::Create => 0.0,
            Op::Fetch => {
                s.stats.fetch_attempts += 1;
                self.config.fetch_fail_prob
            }
            Op::Insert => {
                s.stats.insert_attempts += 1;
                self.config.insert_fail_prob
            }
            Op::Delete => {
                s.stats.delete_attempts += 1;
                self.config.delete_fail_prob
            }
        };

        let (min, max) = self.config.latency_range_us;
        let latency_us = if max > min {
            s.rng.gen_range(min, max)
        } else {
            min
        };

        if s.rng.gen_bool(self.config.timeout_prob) {
            s.stats.timeouts += 1;
            return (
                Some(PersistenceError::TimedOut("simulated timeout".to_string())),
                latency_us,
            );
        }

        if s.rng.gen_bool(fail_prob) {
            let what = match op {
                Op::Create => "create",
                Op::Fetch => {
                    s.stats.fetch_failures += 1;
                    "fetch"
                }
                Op::Insert => {
                    s.stats.insert_failures += 1;
                    "insert"
                }
                Op::Delete => {
                    s.stats.delete_failures += 1;
                    "delete"
                }
            };
            return (
                Some(PersistenceError::Unavailable(format!("simulated {} failure", what))),
                latency_us,
            );
        }

        (None, latency_us)
    }
}

async fn simulate_latency(latency_us: u64) {
    if latency_us > 0 {
        tokio::time::sleep(std::time::Duration::from_micros(latency_us)).await;
    }
}

impl<S: DocumentStore + Clone> DocumentStore for SimulatedDocumentStore<S> {
    fn create_collection<'a>(&'a self, name: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let (fault, latency_us) = self.roll(Op::Create);
            simulate_latency(latency_us).await;
            if let Some(err) = fault {
                return Err(err);
            }
            self.inner_store.create_collection(name).await
        })
    }

    fn fetch_all<'a>(&'a self, collection: &'a str) -> StoreFuture<'a, Vec<Document>> {
        Box::pin(async move {
            let (fault, latency_us) = self.roll(Op::Fetch);
            simulate_latency(latency_us).await;
            if let Some(err) = fault {
                return Err(err);
            }
            self.inner_store.fetch_all(collection).await
        })
    }

    fn insert<'a>(
        &'a self,
        document: Document,
        collection: &'a str,
        return_document: bool,
    ) -> StoreFuture<'a, Document> {
        Box::pin(async move {
            let (fault, latency_us) = self.roll(Op::Insert);
            simulate_latency(latency_us).await;
            if let Some(err) = fault {
                return Err(err);
            }
            self.inner_store
                .insert(document, collection, return_document)
                .await
        })
    }

    fn delete_by_id<'a>(&'a self, id: &'a str, collection: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let (fault, latency_us) = self.roll(Op::Delete);
            simulate_latency(latency_us).await;
            if let Some(err) = fault {
                return Err(err);
            }
            self.inner_store.delete_by_id(id, collection).await
        })
    }
}
