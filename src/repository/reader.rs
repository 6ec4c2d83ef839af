//! Typed reads through one snapshot

use crate::graph::{Entity, Guid, Relationship};
use crate::mapping::{MappedInstance, RELATIONSHIP_PREFIX};
use crate::query::InstanceSource;
use crate::storage::{
    DocFilter, DocumentStore, SnapshotBasis, SnapshotGuard, StorageError, StorageResult,
};
use chrono::{DateTime, Utc};

/// Order of versions returned by a history call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryOrder {
    /// Oldest version first
    #[default]
    Forward,
    /// Newest version first
    Backward,
}

/// Graph objects as they stood at one point in time
///
/// Every read of a single connector operation goes through one reader, so
/// the operation sees one consistent state. The snapshot is released when
/// the reader is closed or dropped.
pub struct SnapshotReader<'a> {
    guard: SnapshotGuard<'a>,
}

impl<'a> SnapshotReader<'a> {
    pub fn open(store: &'a dyn DocumentStore, as_of: Option<DateTime<Utc>>) -> StorageResult<Self> {
        Ok(Self {
            guard: SnapshotGuard::open(store, SnapshotBasis::as_of(as_of))?,
        })
    }

    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.guard.as_of()
    }

    /// Effective version of one instance, whatever its status
    pub fn instance<T: MappedInstance>(&self, guid: &Guid) -> StorageResult<Option<T>> {
        self.guard
            .get(&T::key_for(guid))?
            .map(|stored| T::from_document(&stored.document))
            .transpose()
    }

    pub fn relationship(&self, guid: &Guid) -> StorageResult<Option<Relationship>> {
        self.instance(guid)
    }

    /// Every instance of one kind matching the store-level filter
    pub fn all<T: MappedInstance>(&self, filter: &DocFilter) -> StorageResult<Vec<T>> {
        self.guard
            .query(filter)?
            .iter()
            .map(|stored| T::from_document(&stored.document))
            .collect()
    }

    /// Versions recorded in `[from, to)`
    pub fn history<T: MappedInstance>(
        &self,
        guid: &Guid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        order: HistoryOrder,
    ) -> StorageResult<Vec<T>> {
        let mut versions = self
            .guard
            .history(&T::key_for(guid), from, to)?
            .iter()
            .map(|stored| T::from_document(&stored.document))
            .collect::<StorageResult<Vec<T>>>()?;
        if order == HistoryOrder::Backward {
            versions.reverse();
        }
        Ok(versions)
    }

    pub fn close(self) -> StorageResult<()> {
        self.guard.close()
    }
}

impl InstanceSource for SnapshotReader<'_> {
    type Error = StorageError;

    fn entity(&self, guid: &Guid) -> StorageResult<Option<Entity>> {
        self.instance(guid)
    }

    fn relationships_for(&self, guid: &Guid) -> StorageResult<Vec<Relationship>> {
        let filter = DocFilter::new()
            .with_prefix(RELATIONSHIP_PREFIX)
            .referencing(guid.as_str());
        self.all(&filter)
    }
}
