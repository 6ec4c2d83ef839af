//! Relationship representation: a typed edge between two entity endpoints

use super::instance::{Guid, InstanceHeader, InstanceProvenance, InstanceType};
use super::property::{Properties, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One endpoint of a relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEnd {
    /// GUID of the entity (full or proxy) at this end
    pub guid: Guid,
    /// Type name of that entity when the relationship was written
    pub type_name: String,
}

impl RelationshipEnd {
    pub fn new(guid: Guid, type_name: impl Into<String>) -> Self {
        Self {
            guid,
            type_name: type_name.into(),
        }
    }
}

/// A relationship between exactly two entities, labelled end 1 and end 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(flatten)]
    pub header: InstanceHeader,
    /// Type-specific properties
    pub properties: Properties,
    pub end1: RelationshipEnd,
    pub end2: RelationshipEnd,
}

impl Relationship {
    /// Create a new active relationship with a fresh GUID
    pub fn new(
        instance_type: InstanceType,
        provenance: InstanceProvenance,
        end1: RelationshipEnd,
        end2: RelationshipEnd,
        created_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            header: InstanceHeader::new(Guid::new(), instance_type, provenance, created_by, at),
            properties: HashMap::new(),
            end1,
            end2,
        }
    }

    /// Add a property to the relationship
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn guid(&self) -> &Guid {
        &self.header.guid
    }

    pub fn type_name(&self) -> &str {
        &self.header.instance_type.type_name
    }

    pub fn version(&self) -> u64 {
        self.header.version
    }

    /// True if either end is the given entity
    pub fn connects(&self, entity: &Guid) -> bool {
        &self.end1.guid == entity || &self.end2.guid == entity
    }

    /// The end opposite to `entity`, if `entity` is one of the ends
    pub fn other_end(&self, entity: &Guid) -> Option<&Guid> {
        if &self.end1.guid == entity {
            Some(&self.end2.guid)
        } else if &self.end2.guid == entity {
            Some(&self.end1.guid)
        } else {
            None
        }
    }
}
