//! Entity representation: a typed node in the metadata graph

use super::classification::Classification;
use super::instance::{Guid, InstanceHeader, InstanceProvenance, InstanceStatus, InstanceType};
use super::property::{Properties, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An entity in the metadata graph
///
/// A proxy entity (`proxy == true`) is a stub holding only its type, GUID and
/// classifications; its property bag is always empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(flatten)]
    pub header: InstanceHeader,
    /// Type-specific properties
    pub properties: Properties,
    #[serde(default)]
    pub classifications: Vec<Classification>,
    #[serde(default)]
    pub proxy: bool,
}

impl Entity {
    /// Create a new active entity with a fresh GUID
    pub fn new(
        instance_type: InstanceType,
        provenance: InstanceProvenance,
        created_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            header: InstanceHeader::new(Guid::new(), instance_type, provenance, created_by, at),
            properties: HashMap::new(),
            classifications: Vec::new(),
            proxy: false,
        }
    }

    /// Create a proxy stub for an entity homed elsewhere
    pub fn new_proxy(
        guid: Guid,
        instance_type: InstanceType,
        provenance: InstanceProvenance,
        created_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            header: InstanceHeader::new(guid, instance_type, provenance, created_by, at),
            properties: HashMap::new(),
            classifications: Vec::new(),
            proxy: true,
        }
    }

    /// Add a property to the entity
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Replace the whole property bag
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Attach a classification
    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classifications.push(classification);
        self
    }

    /// Set the initial status
    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.header.status = status;
        self
    }

    /// Use a specific GUID instead of the generated one
    pub fn with_guid(mut self, guid: Guid) -> Self {
        self.header.guid = guid;
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

    pub fn status(&self) -> InstanceStatus {
        self.header.status
    }

    /// Find a classification by name
    pub fn classification(&self, name: &str) -> Option<&Classification> {
        self.classifications.iter().find(|c| c.name == name)
    }

    pub fn has_classification(&self, name: &str) -> bool {
        self.classification(name).is_some()
    }

    /// Stub form of this entity: same header and classifications, no properties
    pub fn to_proxy(&self) -> Entity {
        Entity {
            header: self.header.clone(),
            properties: HashMap::new(),
            classifications: self.classifications.clone(),
            proxy: true,
        }
    }
}
