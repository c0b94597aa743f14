use super::record::{DropId, DropRecord};
use crate::clock::Timestamp;
use ahash::AHashSet;
use parking_lot::Mutex;

/// Result of a lookup scan
#[derive(Debug, Default)]
pub struct Scan {
    /// The live target, removed from the store
    pub found: Option<DropRecord>,
    /// Expired records removed during the pass (may include the target)
    pub evicted: Vec<DropRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Oldest first; scans walk it from the back
    records: Vec<DropRecord>,
    ids: AHashSet<DropId>,
}

impl Inner {
    #[cfg(debug_assertions)]
    fn check_invariants(&self) {
        debug_assert_eq!(
            self.records.len(),
            self.ids.len(),
            "Invariant: id index must mirror the record list"
        );
        debug_assert!(
            self.records.iter().all(|r| !r.id.as_str().is_empty()),
            "Invariant: every live record has an id"
        );
    }
}

/// The live set of drops.
///
/// Owns the only copy of the collection; every mutation goes through one
/// mutex and the lock is never held across an await.
#[derive(Debug, Default)]
pub struct DropStore {
    inner: Mutex<Inner>,
}

impl DropStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Returns false, leaving the store unchanged, when
    /// the id is already present.
    pub fn insert(&self, record: DropRecord) -> bool {
        let mut inner = self.inner.lock();
        if !inner.ids.insert(record.id.clone()) {
            return false;
        }
        inner.records.push(record);

        #[cfg(debug_assertions)]
        inner.check_invariants();
        true
    }

    /// Bulk-load records at startup, skipping ids already present.
    /// Returns the records actually inserted.
    pub fn load(&self, records: Vec<DropRecord>) -> Vec<DropRecord> {
        let mut inner = self.inner.lock();
        let mut loaded = Vec::with_capacity(records.len());
        for record in records {
            if inner.ids.insert(record.id.clone()) {
                inner.records.push(record.clone());
                loaded.push(record);
            }
        }

        #[cfg(debug_assertions)]
        inner.check_invariants();
        loaded
    }

    /// Find and remove `target`, evicting every expired record in the
    /// store. Walks newest first and visits every record once.
    ///
    /// An expired target is evicted rather than returned. `evicted` is
    /// ordered newest first.
    pub fn take(&self, target: &DropId, now: Timestamp) -> Scan {
        let mut inner = self.inner.lock();
        let mut scan = Scan::default();

        #[cfg(debug_assertions)]
        let pre_len = inner.records.len();

        let records = std::mem::take(&mut inner.records);
        let mut kept = Vec::with_capacity(records.len());
        for record in records.into_iter().rev() {
            let is_target = record.id == *target;
            let expired = record.is_expired(now);

            if !is_target && !expired {
                kept.push(record);
                continue;
            }

            inner.ids.remove(&record.id);
            if is_target && !expired {
                scan.found = Some(record);
            } else {
                scan.evicted.push(record);
            }
        }
        kept.reverse();
        inner.records = kept;

        #[cfg(debug_assertions)]
        {
            inner.check_invariants();
            let removed = scan.evicted.len() + usize::from(scan.found.is_some());
            debug_assert_eq!(
                inner.records.len() + removed,
                pre_len,
                "Postcondition: store shrinks by exactly the removed records"
            );
            debug_assert!(
                !inner.ids.contains(target),
                "Postcondition: target is gone after a scan"
            );
            debug_assert!(
                inner.records.iter().all(|r| !r.is_expired(now)),
                "Postcondition: no expired record survives a scan"
            );
        }

        scan
    }

    /// Copy of the record with `id`, if present
    pub fn get(&self, id: &DropId) -> Option<DropRecord> {
        let inner = self.inner.lock();
        if !inner.ids.contains(id) {
            return None;
        }
        inner.records.iter().find(|r| r.id == *id).cloned()
    }

    pub fn contains(&self, id: &DropId) -> bool {
        self.inner.lock().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    /// Copy of the live records, oldest first
    pub fn snapshot(&self) -> Vec<DropRecord> {
        self.inner.lock().records.clone()
    }
}
