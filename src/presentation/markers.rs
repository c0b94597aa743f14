use super::PresentationSink;
use crate::drops::{DropId, DropRecord, Position};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Everything needed to render one marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    /// Identity used to replace or withdraw the marker later
    pub uid: Option<String>,
    pub position: Position,
    pub text: String,
    #[serde(flatten)]
    pub style: MarkerStyle,
}

/// Visual parameters shared by all markers of a kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub sprite: u32,
    pub color: u32,
    pub scale: f32,
    pub short_range: bool,
    #[serde(default)]
    pub category: Option<u32>,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        MarkerStyle {
            sprite: 1,
            color: 2,
            scale: 0.5,
            short_range: true,
            category: None,
        }
    }
}

/// Rendering engine behind the marker layer
pub trait MarkerBackend: Send + Sync {
    type Handle: Send;

    fn create(&self, spec: &MarkerSpec) -> Self::Handle;

    /// Best-effort release. Releasing a handle the engine has already
    /// invalidated is a no-op, not an error.
    fn release(&self, handle: Self::Handle);
}

/// An engine handle paired with the uid it was created for. The uid lives
/// here, never on the engine object.
#[derive(Debug)]
pub struct TrackedMarker<H> {
    pub handle: H,
    pub uid: Option<String>,
}

/// Tracks the markers currently rendered through a backend
pub struct MarkerLayer<B: MarkerBackend> {
    backend: B,
    markers: Mutex<Vec<TrackedMarker<B::Handle>>>,
}

impl<B: MarkerBackend> MarkerLayer<B> {
    pub fn new(backend: B) -> Self {
        MarkerLayer {
            backend,
            markers: Mutex::new(Vec::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Render a marker. A marker already tracked under the same uid is
    /// released first, so each uid is shown at most once.
    pub fn append(&self, spec: MarkerSpec) {
        let mut markers = self.markers.lock();
        let replaced = spec
            .uid
            .as_deref()
            .and_then(|uid| markers.iter().position(|m| m.uid.as_deref() == Some(uid)))
            .map(|index| markers.remove(index));
        if let Some(old) = replaced {
            self.backend.release(old.handle);
        }

        let handle = self.backend.create(&spec);
        markers.push(TrackedMarker {
            handle,
            uid: spec.uid,
        });
    }

    pub fn populate(&self, specs: impl IntoIterator<Item = MarkerSpec>) {
        for spec in specs {
            self.append(spec);
        }
    }

    /// Withdraw the marker tracked under `uid`
    pub fn remove(&self, uid: &str) -> bool {
        match self.detach(uid) {
            Some(marker) => {
                self.backend.release(marker.handle);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let markers = std::mem::take(&mut *self.markers.lock());
        for marker in markers {
            self.backend.release(marker.handle);
        }
    }

    pub fn len(&self) -> usize {
        self.markers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.lock().is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.markers
            .lock()
            .iter()
            .any(|m| m.uid.as_deref() == Some(uid))
    }

    fn detach(&self, uid: &str) -> Option<TrackedMarker<B::Handle>> {
        let mut markers = self.markers.lock();
        let index = markers.iter().position(|m| m.uid.as_deref() == Some(uid))?;
        Some(markers.remove(index))
    }
}

/// Presents drops as world markers, one per drop id
pub struct DropMarkers<B: MarkerBackend> {
    layer: MarkerLayer<B>,
    style: MarkerStyle,
}

impl<B: MarkerBackend> DropMarkers<B> {
    pub fn new(backend: B, style: MarkerStyle) -> Self {
        DropMarkers {
            layer: MarkerLayer::new(backend),
            style,
        }
    }

    pub fn layer(&self) -> &MarkerLayer<B> {
        &self.layer
    }

    fn spec_for(&self, record: &DropRecord) -> MarkerSpec {
        MarkerSpec {
            uid: Some(record.id.to_string()),
            position: record.position,
            text: record.contents.name.clone(),
            style: self.style.clone(),
        }
    }
}

impl<B: MarkerBackend> PresentationSink for DropMarkers<B> {
    fn append(&self, record: DropRecord) {
        let spec = self.spec_for(&record);
        self.layer.append(spec);
    }

    fn remove(&self, id: &DropId) {
        self.layer.remove(id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Timestamp;
    use crate::drops::{DropContents, StoredItem};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Backend that hands out numbered handles and remembers releases
    #[derive(Default)]
    struct CountingBackend {
        next: AtomicU64,
        released: Mutex<Vec<u64>>,
    }

    impl MarkerBackend for CountingBackend {
        type Handle = u64;

        fn create(&self, _spec: &MarkerSpec) -> u64 {
            self.next.fetch_add(1, Ordering::SeqCst)
        }

        fn release(&self, handle: u64) {
            self.released.lock().push(handle);
        }
    }

    fn spec(uid: Option<&str>) -> MarkerSpec {
        MarkerSpec {
            uid: uid.map(str::to_string),
            position: Position::default(),
            text: "Burger".to_string(),
            style: MarkerStyle::default(),
        }
    }

    #[test]
    fn test_append_replaces_same_uid() {
        let layer = MarkerLayer::new(CountingBackend::default());
        layer.append(spec(Some("a")));
        layer.append(spec(Some("b")));
        layer.append(spec(Some("a")));

        assert_eq!(layer.len(), 2);
        assert_eq!(*layer.backend().released.lock(), vec![0]);
    }

    #[test]
    fn test_concurrent_appends_keep_one_marker_per_uid() {
        use std::sync::Arc;

        let layer = Arc::new(MarkerLayer::new(CountingBackend::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let layer = layer.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        layer.append(spec(Some("same")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(layer.len(), 1);
        assert_eq!(layer.backend().released.lock().len(), 399);
    }

    #[test]
    fn test_markers_without_uid_accumulate() {
        let layer = MarkerLayer::new(CountingBackend::default());
        layer.populate(vec![spec(None), spec(None)]);
        assert_eq!(layer.len(), 2);
        assert!(layer.backend().released.lock().is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let layer = MarkerLayer::new(CountingBackend::default());
        layer.populate(vec![spec(Some("a")), spec(Some("b")), spec(None)]);

        assert!(layer.remove("a"));
        assert!(!layer.remove("a"));
        assert!(!layer.contains("a"));

        layer.clear();
        assert!(layer.is_empty());
        assert_eq!(layer.backend().released.lock().len(), 3);
    }

    #[test]
    fn test_drop_markers_follow_records() {
        let markers = DropMarkers::new(CountingBackend::default(), MarkerStyle::default());
        let record = DropRecord {
            id: DropId::from("d1"),
            contents: DropContents {
                item: StoredItem::new("burger", 1),
                name: "Burger".to_string(),
                model: "prop_burger".to_string(),
                expiration: Timestamp(100),
            },
            position: Position::new(1.0, 2.0, 3.0),
        };

        markers.append(record.clone());
        assert!(markers.layer().contains("d1"));

        markers.remove(&record.id);
        assert!(markers.layer().is_empty());
    }
}
