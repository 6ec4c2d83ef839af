//! Identity, status, type and provenance shared by every stored instance

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of an entity or relationship
///
/// Serializes as a plain string. Freshly minted GUIDs are UUID v4, but any
/// non-empty string received from another repository is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Create a new random Guid
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a Guid from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Guid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Guid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Current wall-clock time truncated to the store's microsecond resolution
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Lifecycle status of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Draft,
    Active,
    Deleted,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Draft => "draft",
            InstanceStatus::Active => "active",
            InstanceStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(InstanceStatus::Draft),
            "active" => Ok(InstanceStatus::Active),
            "deleted" => Ok(InstanceStatus::Deleted),
            other => Err(format!("unknown instance status '{}'", other)),
        }
    }
}

/// Category of a type definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCategory {
    Entity,
    Relationship,
    Classification,
}

impl std::fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeCategory::Entity => "entity",
            TypeCategory::Relationship => "relationship",
            TypeCategory::Classification => "classification",
        };
        f.write_str(name)
    }
}

/// Type reference stamped on each instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceType {
    /// GUID of the type definition
    pub type_guid: String,
    /// Name of the type definition
    pub type_name: String,
    pub category: TypeCategory,
    /// Super-type names, nearest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub super_types: Vec<String>,
}

impl InstanceType {
    /// True if this type is `name` or inherits from it
    pub fn is_type_of(&self, name: &str) -> bool {
        self.type_name == name || self.super_types.iter().any(|s| s == name)
    }
}

/// Where an instance was originally created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    /// Created by a member of the metadata cohort
    LocalCohort,
    /// Mastered by a technology outside the cohort
    ExternalSource,
}

/// Home metadata collection of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProvenance {
    pub kind: ProvenanceKind,
    /// Id of the home (authoritative) metadata collection
    pub metadata_collection_id: String,
    pub metadata_collection_name: Option<String>,
    /// Collection that replicates an external-source instance, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated_by: Option<String>,
}

impl InstanceProvenance {
    /// Provenance for an instance homed in the given collection
    pub fn local(collection_id: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            kind: ProvenanceKind::LocalCohort,
            metadata_collection_id: collection_id.into(),
            metadata_collection_name: Some(collection_name.into()),
            replicated_by: None,
        }
    }

    /// Provenance for an instance mastered by an external source
    pub fn external(
        collection_id: impl Into<String>,
        collection_name: Option<String>,
        replicated_by: impl Into<String>,
    ) -> Self {
        Self {
            kind: ProvenanceKind::ExternalSource,
            metadata_collection_id: collection_id.into(),
            metadata_collection_name: collection_name,
            replicated_by: Some(replicated_by.into()),
        }
    }

    pub fn is_external_source(&self) -> bool {
        self.kind == ProvenanceKind::ExternalSource
    }
}

/// Audit header common to entities and relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceHeader {
    pub guid: Guid,
    #[serde(rename = "type")]
    pub instance_type: InstanceType,
    pub status: InstanceStatus,
    /// Status to return to when a deleted instance is restored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_on_delete: Option<InstanceStatus>,
    /// Starts at 1, incremented by every mutating transaction
    pub version: u64,
    pub provenance: InstanceProvenance,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    /// Previous GUID if the instance was re-identified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_identified_from: Option<Guid>,
    /// Set on the final version kept under a GUID that was replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub re_identified_to: Option<Guid>,
}

impl InstanceHeader {
    /// Header for a brand new instance at version 1
    pub fn new(
        guid: Guid,
        instance_type: InstanceType,
        provenance: InstanceProvenance,
        created_by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            guid,
            instance_type,
            status: InstanceStatus::Active,
            status_on_delete: None,
            version: 1,
            provenance,
            created_by: created_by.into(),
            updated_by: None,
            create_time: at,
            update_time: at,
            re_identified_from: None,
            re_identified_to: None,
        }
    }

    /// True if the given metadata collection is this instance's home
    pub fn is_homed_in(&self, collection_id: &str) -> bool {
        self.provenance.metadata_collection_id == collection_id
    }

    /// Record a new version produced by `user` at `at`
    pub fn advance(&mut self, user: &str, at: DateTime<Utc>) {
        self.version += 1;
        self.updated_by = Some(user.to_string());
        self.update_time = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_serializes_as_plain_string() {
        let guid = Guid::from_string("abc-123");
        assert_eq!(serde_json::to_string(&guid).unwrap(), "\"abc-123\"");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("ACTIVE".parse::<InstanceStatus>(), Ok(InstanceStatus::Active));
        assert!("archived".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn advance_bumps_version_and_audit_fields() {
        let at = now_micros();
        let mut header = InstanceHeader::new(
            Guid::new(),
            InstanceType {
                type_guid: "t1".into(),
                type_name: "Asset".into(),
                category: TypeCategory::Entity,
                super_types: vec![],
            },
            InstanceProvenance::local("coll-1", "local"),
            "alice",
            at,
        );
        header.advance("bob", at + chrono::Duration::seconds(1));
        assert_eq!(header.version, 2);
        assert_eq!(header.updated_by.as_deref(), Some("bob"));
        assert!(header.update_time > header.create_time);
    }

    #[test]
    fn is_type_of_follows_super_types() {
        let t = InstanceType {
            type_guid: "t2".into(),
            type_name: "Database".into(),
            category: TypeCategory::Entity,
            super_types: vec!["DataStore".into(), "Asset".into()],
        };
        assert!(t.is_type_of("Database"));
        assert!(t.is_type_of("Asset"));
        assert!(!t.is_type_of("Process"));
    }
}
