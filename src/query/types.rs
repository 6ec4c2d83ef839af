//! Query types: match expressions, sequencing, paging and find requests

use crate::graph::{InstanceStatus, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while preparing or running a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid search pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Invalid paging: {0}")]
    Paging(String),

    #[error("Invalid condition on '{property}': {reason}")]
    Condition { property: String, reason: String },
}

/// How a list of conditions combines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCriteria {
    /// Every condition must hold
    #[default]
    All,
    /// At least one condition must hold
    Any,
    /// No condition may hold
    None,
}

impl MatchCriteria {
    /// Combine the outcomes of each condition
    pub fn combine(&self, outcomes: impl IntoIterator<Item = bool>) -> bool {
        let mut outcomes = outcomes.into_iter();
        match self {
            MatchCriteria::All => outcomes.all(|o| o),
            MatchCriteria::Any => outcomes.any(|o| o),
            MatchCriteria::None => !outcomes.any(|o| o),
        }
    }
}

/// Comparison applied to a single property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyOperator {
    Eq,
    Neq,
    /// Full-match regular expression on string values
    Like,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Value is one of an array of candidates
    In,
    IsNull,
    NotNull,
}

/// One condition on a named property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCondition {
    pub property: String,
    pub operator: PropertyOperator,
    /// Unused by `IsNull` and `NotNull`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PropertyValue>,
}

impl PropertyCondition {
    pub fn new(property: impl Into<String>, operator: PropertyOperator, value: PropertyValue) -> Self {
        Self {
            property: property.into(),
            operator,
            value: Some(value),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self::new(property, PropertyOperator::Eq, value.into())
    }

    /// Full-match pattern condition
    pub fn like(property: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(property, PropertyOperator::Like, PropertyValue::String(pattern.into()))
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            operator: PropertyOperator::IsNull,
            value: None,
        }
    }

    pub fn not_null(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            operator: PropertyOperator::NotNull,
            value: None,
        }
    }
}

/// Property conditions and nested groups joined by one criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchProperties {
    #[serde(default)]
    pub conditions: Vec<PropertyCondition>,
    #[serde(default)]
    pub nested: Vec<SearchProperties>,
    #[serde(default)]
    pub match_criteria: MatchCriteria,
}

impl SearchProperties {
    pub fn new(match_criteria: MatchCriteria) -> Self {
        Self {
            conditions: Vec::new(),
            nested: Vec::new(),
            match_criteria,
        }
    }

    pub fn with_condition(mut self, condition: PropertyCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_nested(mut self, nested: SearchProperties) -> Self {
        self.nested.push(nested);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.nested.iter().all(SearchProperties::is_empty)
    }
}

/// A classification that must be present, optionally with property conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationCondition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SearchProperties>,
}

impl ClassificationCondition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: SearchProperties) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Classification conditions joined by one criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchClassifications {
    #[serde(default)]
    pub conditions: Vec<ClassificationCondition>,
    #[serde(default)]
    pub match_criteria: MatchCriteria,
}

impl SearchClassifications {
    pub fn new(match_criteria: MatchCriteria) -> Self {
        Self {
            conditions: Vec::new(),
            match_criteria,
        }
    }

    pub fn with_condition(mut self, condition: ClassificationCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingOrder {
    /// Store order
    #[default]
    Any,
    Guid,
    CreationDateRecent,
    CreationDateOldest,
    LastUpdateRecent,
    LastUpdateOldest,
    PropertyAscending,
    PropertyDescending,
}

/// Ordering plus the property it needs, if any
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequencing {
    pub order: SequencingOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

impl Sequencing {
    pub fn by(order: SequencingOrder) -> Self {
        Self {
            order,
            property: None,
        }
    }

    pub fn by_property(property: impl Into<String>, ascending: bool) -> Self {
        Self {
            order: if ascending {
                SequencingOrder::PropertyAscending
            } else {
                SequencingOrder::PropertyDescending
            },
            property: Some(property.into()),
        }
    }
}

/// Result window
///
/// Signed so that callers' negative values can be reported rather than
/// silently wrapped. A page size of 0 means "up to the maximum".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub from_element: i64,
    pub page_size: i64,
}

impl Paging {
    pub fn new(from_element: i64, page_size: i64) -> Self {
        Self {
            from_element,
            page_size,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// A find-entities or find-relationships request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRequest {
    /// Restrict to this type and its subtypes
    pub type_guid: Option<String>,
    /// Restrict to any of these types and their subtypes
    pub subtype_guids: Vec<String>,
    pub match_properties: Option<SearchProperties>,
    pub match_classifications: Option<SearchClassifications>,
    /// Free-text pattern matched against every string attribute
    pub search_text: Option<String>,
    /// Classification names every result must carry
    pub limit_by_classification: Vec<String>,
    /// Empty means every status except deleted
    pub statuses: Vec<InstanceStatus>,
    pub as_of: Option<DateTime<Utc>>,
    pub sequencing: Sequencing,
    pub paging: Paging,
}

impl FindRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, type_guid: impl Into<String>) -> Self {
        self.type_guid = Some(type_guid.into());
        self
    }

    pub fn with_subtypes(mut self, subtype_guids: impl IntoIterator<Item = String>) -> Self {
        self.subtype_guids.extend(subtype_guids);
        self
    }

    pub fn matching(mut self, properties: SearchProperties) -> Self {
        self.match_properties = Some(properties);
        self
    }

    pub fn classified(mut self, classifications: SearchClassifications) -> Self {
        self.match_classifications = Some(classifications);
        self
    }

    pub fn containing_text(mut self, pattern: impl Into<String>) -> Self {
        self.search_text = Some(pattern.into());
        self
    }

    pub fn limited_by_classification(mut self, name: impl Into<String>) -> Self {
        self.limit_by_classification.push(name.into());
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn sequenced(mut self, sequencing: Sequencing) -> Self {
        self.sequencing = sequencing;
        self
    }

    pub fn page(mut self, from_element: i64, page_size: i64) -> Self {
        self.paging = Paging::new(from_element, page_size);
        self
    }

    /// Requested statuses, defaulting to everything except deleted
    pub fn effective_statuses(&self) -> Vec<InstanceStatus> {
        if self.statuses.is_empty() {
            vec![InstanceStatus::Draft, InstanceStatus::Active]
        } else {
            self.statuses.clone()
        }
    }
}

/// Filters shared by the traversal operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversalFilter {
    /// Entity type names (already expanded to subtypes); empty means any
    pub entity_types: Vec<String>,
    /// Relationship type names; empty means any
    pub relationship_types: Vec<String>,
    /// Empty means every status except deleted
    pub statuses: Vec<InstanceStatus>,
    /// Classification names every entity must carry
    pub classifications: Vec<String>,
}

impl TraversalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_types(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.entity_types.extend(names);
        self
    }

    pub fn with_relationship_types(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.relationship_types.extend(names);
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = InstanceStatus>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    pub fn with_classification(mut self, name: impl Into<String>) -> Self {
        self.classifications.push(name.into());
        self
    }

    /// True if instances with this status may be visited
    pub fn admits_status(&self, status: InstanceStatus) -> bool {
        if self.statuses.is_empty() {
            status != InstanceStatus::Deleted
        } else {
            self.statuses.contains(&status)
        }
    }

    /// True if the entity may appear in (and extend) a traversal
    pub fn admits_entity(&self, entity: &crate::graph::Entity) -> bool {
        (self.entity_types.is_empty()
            || self.entity_types.iter().any(|t| t == entity.type_name()))
            && self.admits_status(entity.status())
            && self
                .classifications
                .iter()
                .all(|c| entity.has_classification(c))
    }

    /// True if the relationship may be followed
    pub fn admits_relationship(&self, relationship: &crate::graph::Relationship) -> bool {
        (self.relationship_types.is_empty()
            || self
                .relationship_types
                .iter()
                .any(|t| t == relationship.type_name()))
            && self.admits_status(relationship.header.status)
    }
}
