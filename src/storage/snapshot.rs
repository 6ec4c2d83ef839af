//! Scoped snapshot handles

use super::traits::{
    DocFilter, DocumentStore, Snapshot, SnapshotBasis, StorageResult, StoredDocument,
};
use chrono::{DateTime, Utc};
use tracing::warn;

/// A snapshot that is closed when the guard goes out of scope
///
/// Use `close` to observe close errors; a guard dropped without it closes
/// the snapshot and logs any failure.
pub struct SnapshotGuard<'a> {
    store: &'a dyn DocumentStore,
    snapshot: Snapshot,
    closed: bool,
}

impl<'a> SnapshotGuard<'a> {
    pub fn open(store: &'a dyn DocumentStore, basis: SnapshotBasis) -> StorageResult<Self> {
        let snapshot = store.open_snapshot(basis)?;
        Ok(Self {
            store,
            snapshot,
            closed: false,
        })
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.snapshot.as_of
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<StoredDocument>> {
        self.store.get_document(&self.snapshot, key)
    }

    pub fn query(&self, filter: &DocFilter) -> StorageResult<Vec<StoredDocument>> {
        self.store.query(&self.snapshot, filter)
    }

    pub fn history(
        &self,
        key: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<StoredDocument>> {
        self.store.history(&self.snapshot, key, from, to)
    }

    /// Close the snapshot and report the result
    pub fn close(mut self) -> StorageResult<()> {
        self.closed = true;
        self.store.close_snapshot(&self.snapshot)
    }
}

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.store.close_snapshot(&self.snapshot) {
            warn!(snapshot = self.snapshot.id, error = %e, "failed to close snapshot");
        }
    }
}
