//! Core instance model: entities, relationships, classifications

mod classification;
mod entity;
mod instance;
mod instance_graph;
mod property;
mod relationship;

#[cfg(test)]
mod tests;

pub use classification::{Classification, ClassificationOrigin};
pub use entity::Entity;
pub use instance::{
    now_micros, Guid, InstanceHeader, InstanceProvenance, InstanceStatus, InstanceType,
    ProvenanceKind, TypeCategory,
};
pub use instance_graph::InstanceGraph;
pub use property::{Properties, PropertyValue};
pub use relationship::{Relationship, RelationshipEnd};
