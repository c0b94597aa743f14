pub mod catalog;
pub mod clock;
pub mod config;
pub mod drops;
pub mod dst;
pub mod observability;
pub mod persistence;
pub mod presentation;
pub mod rng;

pub use catalog::{BaseItem, ItemCatalog, StaticItemCatalog};
pub use clock::{Clock, ProductionClock, SimulatedClock, Timestamp};
pub use config::DropsConfig;
pub use drops::{DropContents, DropError, DropId, DropRecord, DropRegistry, Position, StoredItem};
pub use persistence::{DocumentStore, InMemoryDocumentStore, LocalFsDocumentStore};
pub use presentation::{NullSink, PresentationSink};
