//! Item Drop Registry
//!
//! Items dropped in the world are persisted so they survive restarts and
//! cached in memory for pickup. Drops expire after a catalog-defined
//! timeout; expired drops are swept lazily while looking up others, so no
//! timer task is needed.
//!
//! ## Flow
//!
//! ```text
//! add:  catalog lookup → expiration → DocumentStore::insert → DropStore → sink.append
//! sub:  DropStore::take (newest first, sweep expired) → DocumentStore::delete → contents
//! ```

mod record;
mod registry;
mod store;

pub use record::{
    DropContents, DropId, DropRecord, PendingDrop, Position, RecordError, StoredItem,
};
pub use registry::{DropError, DropRegistry, RegistryConfig, DEFAULT_EXPIRATION};
pub use store::{DropStore, Scan};
