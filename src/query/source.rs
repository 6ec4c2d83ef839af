//! Read access the traversal algorithms run against

use crate::graph::{Entity, Guid, InstanceGraph, Relationship};
use std::convert::Infallible;

/// Instances visible at one point in time
///
/// The repository implements this over an open snapshot; tests use an
/// `InstanceGraph` held in memory.
pub trait InstanceSource {
    type Error;

    /// Current version of an entity, proxies included
    fn entity(&self, guid: &Guid) -> Result<Option<Entity>, Self::Error>;

    /// Every relationship with the entity at either end, whatever its status
    fn relationships_for(&self, guid: &Guid) -> Result<Vec<Relationship>, Self::Error>;
}

impl InstanceSource for InstanceGraph {
    type Error = Infallible;

    fn entity(&self, guid: &Guid) -> Result<Option<Entity>, Infallible> {
        Ok(self.entities.iter().find(|e| e.guid() == guid).cloned())
    }

    fn relationships_for(&self, guid: &Guid) -> Result<Vec<Relationship>, Infallible> {
        Ok(self
            .relationships
            .iter()
            .filter(|r| r.connects(guid))
            .cloned()
            .collect())
    }
}
