//! InstanceGraph: a set of entities and the relationships between them

use super::entity::Entity;
use super::instance::Guid;
use super::relationship::Relationship;
use serde::{Deserialize, Serialize};

/// Result of traversal operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceGraph {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

impl InstanceGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// GUIDs of the entities in the graph, in result order
    pub fn entity_guids(&self) -> Vec<&Guid> {
        self.entities.iter().map(|e| e.guid()).collect()
    }

    /// GUIDs of the relationships in the graph, in result order
    pub fn relationship_guids(&self) -> Vec<&Guid> {
        self.relationships.iter().map(|r| r.guid()).collect()
    }

    pub fn contains_entity(&self, guid: &Guid) -> bool {
        self.entities.iter().any(|e| e.guid() == guid)
    }
}
