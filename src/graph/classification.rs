//! Classifications: named, optionally propertied tags attached to entities

use super::instance::{Guid, InstanceStatus};
use super::property::{Properties, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a classification came to be on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationOrigin {
    /// Assigned directly to the entity
    Assigned,
    /// Propagated from a related entity
    Propagated,
}

/// A classification attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Classification type name (unique per entity)
    pub name: String,
    pub type_guid: String,
    pub origin: ClassificationOrigin,
    /// Entity the classification propagated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_guid: Option<Guid>,
    pub properties: Properties,
    pub status: InstanceStatus,
    pub version: u64,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Home collection of this classification, which can differ from the
    /// entity's home for federated reference copies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_collection_id: Option<String>,
}

impl Classification {
    /// Create an assigned classification at version 1
    pub fn new(
        name: impl Into<String>,
        type_guid: impl Into<String>,
        created_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            type_guid: type_guid.into(),
            origin: ClassificationOrigin::Assigned,
            origin_guid: None,
            properties: HashMap::new(),
            status: InstanceStatus::Active,
            version: 1,
            created_by: created_by.into(),
            updated_by: None,
            create_time: at,
            update_time: at,
            metadata_collection_id: None,
        }
    }

    /// Add a property to the classification
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Set the home metadata collection
    pub fn homed_in(mut self, collection_id: impl Into<String>) -> Self {
        self.metadata_collection_id = Some(collection_id.into());
        self
    }
}
