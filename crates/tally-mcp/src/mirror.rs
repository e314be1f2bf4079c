//! In-memory mirror of the most recent store records.
//!
//! The mirror is the only state the protocol facade reads. It holds an
//! immutable [`Snapshot`] behind a lock; readers clone the `Arc` and never
//! block a refresh for longer than the pointer copy. Entries are kept in
//! insertion order, which after a refresh is most-recent-first.

use std::sync::{Arc, PoisonError, RwLock};
use tally_core::Record;

/// An immutable view of the mirror contents.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<Record>,
}

impl Snapshot {
    /// Build a snapshot, keeping the last occurrence of a duplicated id in
    /// the position of its first occurrence.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut snapshot = Snapshot::default();
        for record in records {
            snapshot.upsert(record);
        }
        snapshot
    }

    fn upsert(&mut self, record: Record) {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

/// The shared mirror cache.
#[derive(Debug, Default)]
pub struct MirrorCache {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl MirrorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all entries.
    pub fn clear(&self) {
        *self.write() = Arc::new(Snapshot::default());
    }

    /// Insert or overwrite the entry for `record.id`.
    pub fn put(&self, record: Record) {
        let mut guard = self.write();
        Arc::make_mut(&mut *guard).upsert(record);
    }

    /// Replace the whole contents in one step.
    pub fn replace(&self, snapshot: Snapshot) {
        *self.write() = Arc::new(snapshot);
    }

    /// The current contents.
    pub fn all(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.read())
    }

    /// Look up one record.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers only ever store whole snapshots; poisoning is ignored.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Arc<Snapshot>> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Arc<Snapshot>> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Entry, RecordKind};

    fn record(id: &str, text: &str, created: i64) -> Record {
        Record {
            id: id.to_string(),
            created,
            updated: None,
            kind: RecordKind::Primary(Entry {
                text: text.to_string(),
                done: false,
            }),
        }
    }

    #[test]
    fn put_and_get() {
        let mirror = MirrorCache::new();
        assert!(mirror.is_empty());

        mirror.put(record("a", "Buy milk", 1));
        assert_eq!(mirror.get("a").unwrap().display_text(), "Buy milk");
        assert!(mirror.get("b").is_none());
    }

    #[test]
    fn put_overwrites_in_place() {
        let mirror = MirrorCache::new();
        mirror.put(record("a", "one", 2));
        mirror.put(record("b", "two", 1));
        mirror.put(record("a", "three", 2));

        let snapshot = mirror.all();
        let ids: Vec<_> = snapshot.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(snapshot.get("a").unwrap().display_text(), "three");
    }

    #[test]
    fn clear_empties() {
        let mirror = MirrorCache::new();
        mirror.put(record("a", "x", 1));
        mirror.clear();
        assert!(mirror.is_empty());
        assert!(mirror.get("a").is_none());
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let mirror = MirrorCache::new();
        mirror.put(record("a", "x", 1));
        let before = mirror.all();

        mirror.put(record("b", "y", 2));
        mirror.clear();

        assert_eq!(before.len(), 1);
        assert!(mirror.is_empty());
    }

    #[test]
    fn replace_swaps_contents() {
        let mirror = MirrorCache::new();
        mirror.put(record("old", "x", 1));
        mirror.replace(Snapshot::from_records(vec![
            record("n1", "a", 3),
            record("n2", "b", 2),
            record("n1", "c", 3),
        ]));

        assert_eq!(mirror.len(), 2);
        assert!(mirror.get("old").is_none());
        assert_eq!(mirror.get("n1").unwrap().display_text(), "c");
        assert_eq!(mirror.all().records()[0].id, "n1");
    }
}
