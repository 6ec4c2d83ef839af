//! Type definitions for entities, relationships and classifications

use crate::graph::{PropertyValue, TypeCategory};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised by type lookups and validation
#[derive(Debug, Error)]
pub enum TypeDefError {
    #[error("Type not known: {0}")]
    Unknown(String),

    #[error("Type conflict for '{name}': {reason}")]
    Conflict { name: String, reason: String },

    #[error("Type '{type_name}' has no attribute '{property}'")]
    UndeclaredProperty { type_name: String, property: String },

    #[error("Property '{property}' of type '{type_name}' expects {expected}, got {actual}")]
    WrongPropertyKind {
        type_name: String,
        property: String,
        expected: AttributeKind,
        actual: &'static str,
    },

    #[error("Type '{type_name}' requires property '{property}'")]
    MissingProperty { type_name: String, property: String },

    #[error("Type '{type_name}' is a {actual} type, expected {expected}")]
    WrongCategory {
        type_name: String,
        expected: TypeCategory,
        actual: TypeCategory,
    },

    #[error("Malformed type definition: {0}")]
    Malformed(String),

    #[error("Type '{type_name}' is not valid here: {reason}")]
    NotValid { type_name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Primitive kind of a declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Int,
    Float,
    Bool,
    /// RFC 3339 timestamp held as a string
    Date,
    Array,
    Map,
}

impl AttributeKind {
    /// True if a value of this shape can be stored in the attribute
    pub fn accepts(&self, value: &PropertyValue) -> bool {
        match (self, value) {
            (AttributeKind::String, PropertyValue::String(_)) => true,
            (AttributeKind::Int, PropertyValue::Int(_)) => true,
            (AttributeKind::Float, PropertyValue::Float(_) | PropertyValue::Int(_)) => true,
            (AttributeKind::Bool, PropertyValue::Bool(_)) => true,
            (AttributeKind::Date, PropertyValue::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            (AttributeKind::Array, PropertyValue::Array(_)) => true,
            (AttributeKind::Map, PropertyValue::Map(_)) => true,
            _ => false,
        }
    }

    /// True for kinds searched by free-text queries
    pub fn is_textual(&self) -> bool {
        matches!(self, AttributeKind::String)
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttributeKind::String => "string",
            AttributeKind::Int => "int",
            AttributeKind::Float => "float",
            AttributeKind::Bool => "bool",
            AttributeKind::Date => "date",
            AttributeKind::Array => "array",
            AttributeKind::Map => "map",
        };
        f.write_str(name)
    }
}

/// A declared property of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub kind: AttributeKind,
    #[serde(default)]
    pub required: bool,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One end of a relationship type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEndDef {
    /// Entity type allowed at this end (subtypes are accepted)
    pub entity_type: String,
    /// Name under which the other end sees this end
    pub attribute_name: String,
}

/// Immutable schema for one type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub guid: String,
    pub name: String,
    pub category: TypeCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Relationship types only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end1: Option<RelationshipEndDef>,
    /// Relationship types only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end2: Option<RelationshipEndDef>,
    /// Classification types only; empty means any entity type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub valid_entity_types: Vec<String>,
}

fn default_version() -> u64 {
    1
}

impl TypeDef {
    /// Create a definition with no attributes
    pub fn new(guid: impl Into<String>, name: impl Into<String>, category: TypeCategory) -> Self {
        Self {
            guid: guid.into(),
            name: name.into(),
            category,
            super_type: None,
            description: None,
            version: 1,
            attributes: Vec::new(),
            end1: None,
            end2: None,
            valid_entity_types: Vec::new(),
        }
    }

    pub fn with_super_type(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set both relationship ends
    pub fn with_ends(mut self, end1: RelationshipEndDef, end2: RelationshipEndDef) -> Self {
        self.end1 = Some(end1);
        self.end2 = Some(end2);
        self
    }

    pub fn with_valid_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.valid_entity_types.push(entity_type.into());
        self
    }

    /// Find an attribute declared directly on this type
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A set of type definitions loaded together, e.g. from a YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDefBundle {
    pub types: Vec<TypeDef>,
}

impl TypeDefBundle {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TypeDefError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, TypeDefError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}
