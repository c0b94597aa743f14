//! Presentation of drops in the world.
//!
//! The registry announces drops to a `PresentationSink` after they are
//! durably recorded, and withdraws them once picked up or expired. Sinks
//! receive owned values and never see the live collection.

mod markers;

pub use markers::{DropMarkers, MarkerBackend, MarkerLayer, MarkerSpec, MarkerStyle, TrackedMarker};

use crate::drops::{DropId, DropRecord};

/// Receiver of drop announcements. Fire-and-forget: nothing it does can
/// fail an `add` or `sub`.
pub trait PresentationSink: Send + Sync {
    fn append(&self, record: DropRecord);

    /// The drop is gone from the registry
    fn remove(&self, _id: &DropId) {}
}

/// Sink that discards every announcement
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn append(&self, _record: DropRecord) {}
}
