//! Snapshot-based change detection for tracked entities.

use std::collections::HashMap;
use std::time::Instant;

use tempcopy_core::Value;

use crate::identity_map::ObjectKey;

/// Serialized state of an entity at a point in time.
#[derive(Debug)]
pub struct ObjectSnapshot {
    data: Vec<u8>,
    taken_at: Instant,
}

impl ObjectSnapshot {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            taken_at: Instant::now(),
        }
    }

    /// JSON bytes of the snapshotted row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn taken_at(&self) -> Instant {
        self.taken_at
    }
}

/// Tracks the last saved state of each entity.
///
/// A row is compared as the JSON encoding of its `(column, value)` pairs.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    snapshots: HashMap<ObjectKey, ObjectSnapshot>,
}

fn encode(row: &[(&'static str, Value)]) -> Vec<u8> {
    match serde_json::to_vec(row) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize row snapshot");
            Vec::new()
        }
    }
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `row` as the baseline for `key`.
    #[tracing::instrument(level = "trace", skip(self, row), fields(table = key.table()))]
    pub fn snapshot(&mut self, key: ObjectKey, row: &[(&'static str, Value)]) {
        let data = encode(row);
        tracing::trace!(snapshot_bytes = data.len(), "Taking snapshot");
        self.snapshots.insert(key, ObjectSnapshot::new(data));
    }

    /// Whether `row` differs from the baseline. No baseline counts as dirty.
    pub fn is_dirty(&self, key: &ObjectKey, row: &[(&'static str, Value)]) -> bool {
        let Some(snapshot) = self.snapshots.get(key) else {
            return true;
        };
        encode(row) != snapshot.data
    }

    /// Columns of `row` whose value differs from the baseline.
    pub fn changed_columns(
        &self,
        key: &ObjectKey,
        row: &[(&'static str, Value)],
    ) -> Vec<&'static str> {
        let Some(snapshot) = self.snapshots.get(key) else {
            return row.iter().map(|(name, _)| *name).collect();
        };

        let original: Vec<(String, Value)> =
            serde_json::from_slice(&snapshot.data).unwrap_or_default();
        let changed: Vec<&'static str> = row
            .iter()
            .filter(|(name, value)| {
                original
                    .iter()
                    .find(|(orig, _)| orig.as_str() == *name)
                    .is_none_or(|(_, orig_value)| orig_value != value)
            })
            .map(|(name, _)| *name)
            .collect();

        tracing::debug!(table = key.table(), changed = ?changed, "Detected changed columns");
        changed
    }

    pub fn has_snapshot(&self, key: &ObjectKey) -> bool {
        self.snapshots.contains_key(key)
    }

    pub fn get_snapshot(&self, key: &ObjectKey) -> Option<&ObjectSnapshot> {
        self.snapshots.get(key)
    }

    /// Forget the baseline for `key`.
    pub fn clear(&mut self, key: &ObjectKey) {
        self.snapshots.remove(key);
    }

    pub fn clear_all(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempcopy_core::Identifier;
    use tempcopy_macros::Model;

    #[derive(Debug, Clone, Model)]
    #[tempcopy(table = "Person")]
    struct Person {
        id: i64,
    }

    fn key(id: i64) -> ObjectKey {
        ObjectKey::of::<Person>(Identifier::Int(id))
    }

    fn row(name: &str) -> Vec<(&'static str, Value)> {
        vec![("Id", Value::BigInt(1)), ("Name", Value::from(name))]
    }

    #[test]
    fn test_no_snapshot_is_dirty() {
        let tracker = ChangeTracker::new();
        assert!(tracker.is_dirty(&key(1), &row("a")));
        assert_eq!(tracker.changed_columns(&key(1), &row("a")), ["Id", "Name"]);
    }

    #[test]
    fn test_detects_changed_columns() {
        let mut tracker = ChangeTracker::new();
        tracker.snapshot(key(1), &row("John Doe"));

        assert!(!tracker.is_dirty(&key(1), &row("John Doe")));
        assert!(tracker.is_dirty(&key(1), &row("Jane Doe")));
        assert_eq!(tracker.changed_columns(&key(1), &row("Jane Doe")), ["Name"]);
        assert!(tracker.get_snapshot(&key(1)).is_some_and(|s| !s.data().is_empty()));
    }

    #[test]
    fn test_clear() {
        let mut tracker = ChangeTracker::new();
        tracker.snapshot(key(1), &row("a"));
        tracker.snapshot(key(2), &row("b"));
        tracker.clear(&key(1));
        assert!(!tracker.has_snapshot(&key(1)));
        assert_eq!(tracker.len(), 1);
        tracker.clear_all();
        assert!(tracker.is_empty());
    }
}
