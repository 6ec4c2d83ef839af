//! Evaluation of property and classification conditions
//!
//! Conditions are compiled once per query so that `Like` patterns are parsed
//! a single time and invalid patterns surface before any instance is read.

use super::text::full_match_regex;
use super::types::{
    MatchCriteria, PropertyCondition, PropertyOperator, QueryError, SearchClassifications,
    SearchProperties,
};
use crate::graph::{Entity, Properties, PropertyValue};
use regex_lite::Regex;
use std::cmp::Ordering;

#[derive(Debug)]
enum Test {
    Compare(PropertyOperator, PropertyValue),
    Like(Regex),
    IsNull,
    NotNull,
}

#[derive(Debug)]
struct CompiledCondition {
    property: String,
    test: Test,
}

impl CompiledCondition {
    fn compile(condition: &PropertyCondition) -> Result<Self, QueryError> {
        let missing_value = || QueryError::Condition {
            property: condition.property.clone(),
            reason: "operator requires a value".into(),
        };
        let test = match condition.operator {
            PropertyOperator::IsNull => Test::IsNull,
            PropertyOperator::NotNull => Test::NotNull,
            PropertyOperator::Like => {
                let pattern = condition
                    .value
                    .as_ref()
                    .and_then(PropertyValue::as_str)
                    .ok_or_else(|| QueryError::Condition {
                        property: condition.property.clone(),
                        reason: "like requires a string pattern".into(),
                    })?;
                Test::Like(full_match_regex(pattern)?)
            }
            PropertyOperator::In => match &condition.value {
                Some(value @ PropertyValue::Array(_)) => {
                    Test::Compare(PropertyOperator::In, value.clone())
                }
                Some(_) => {
                    return Err(QueryError::Condition {
                        property: condition.property.clone(),
                        reason: "in requires an array of candidates".into(),
                    })
                }
                None => return Err(missing_value()),
            },
            op => Test::Compare(op, condition.value.clone().ok_or_else(missing_value)?),
        };
        Ok(Self {
            property: condition.property.clone(),
            test,
        })
    }

    fn matches(&self, properties: &Properties) -> bool {
        let actual = properties.get(&self.property);
        match (&self.test, actual) {
            (Test::IsNull, actual) => actual.is_none(),
            (Test::NotNull, actual) => actual.is_some(),
            (Test::Like(re), Some(PropertyValue::String(s))) => re.is_match(s),
            (Test::Like(_), _) => false,
            (Test::Compare(PropertyOperator::Neq, expected), actual) => {
                actual.map_or(true, |a| !a.loosely_equals(expected))
            }
            (Test::Compare(_, _), None) => false,
            (Test::Compare(op, expected), Some(actual)) => compare(*op, actual, expected),
        }
    }
}

fn compare(op: PropertyOperator, actual: &PropertyValue, expected: &PropertyValue) -> bool {
    match op {
        PropertyOperator::Eq => actual.loosely_equals(expected),
        PropertyOperator::In => match expected {
            PropertyValue::Array(candidates) => candidates.iter().any(|c| actual.loosely_equals(c)),
            _ => false,
        },
        PropertyOperator::Lt => actual.compare(expected) == Some(Ordering::Less),
        PropertyOperator::Lte => matches!(
            actual.compare(expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        PropertyOperator::Gt => actual.compare(expected) == Some(Ordering::Greater),
        PropertyOperator::Gte => matches!(
            actual.compare(expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        _ => false,
    }
}

/// A compiled `SearchProperties` tree
#[derive(Debug)]
pub struct PropertyMatcher {
    conditions: Vec<CompiledCondition>,
    nested: Vec<PropertyMatcher>,
    criteria: MatchCriteria,
}

impl PropertyMatcher {
    pub fn compile(search: &SearchProperties) -> Result<Self, QueryError> {
        Ok(Self {
            conditions: search
                .conditions
                .iter()
                .map(CompiledCondition::compile)
                .collect::<Result<_, _>>()?,
            nested: search
                .nested
                .iter()
                .map(PropertyMatcher::compile)
                .collect::<Result<_, _>>()?,
            criteria: search.match_criteria,
        })
    }

    pub fn matches(&self, properties: &Properties) -> bool {
        self.criteria.combine(
            self.conditions
                .iter()
                .map(|c| c.matches(properties))
                .chain(self.nested.iter().map(|n| n.matches(properties))),
        )
    }
}

#[derive(Debug)]
struct CompiledClassification {
    name: String,
    properties: Option<PropertyMatcher>,
}

/// A compiled `SearchClassifications`
#[derive(Debug)]
pub struct ClassificationMatcher {
    conditions: Vec<CompiledClassification>,
    criteria: MatchCriteria,
}

impl ClassificationMatcher {
    pub fn compile(search: &SearchClassifications) -> Result<Self, QueryError> {
        let conditions = search
            .conditions
            .iter()
            .map(|c| {
                Ok(CompiledClassification {
                    name: c.name.clone(),
                    properties: c.properties.as_ref().map(PropertyMatcher::compile).transpose()?,
                })
            })
            .collect::<Result<_, QueryError>>()?;
        Ok(Self {
            conditions,
            criteria: search.match_criteria,
        })
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        self.criteria.combine(self.conditions.iter().map(|c| {
            entity.classification(&c.name).is_some_and(|found| {
                c.properties
                    .as_ref()
                    .map_or(true, |m| m.matches(&found.properties))
            })
        }))
    }
}

/// True if any string attribute fully matches `pattern`.
///
/// `attributes` names the attributes to search; `None` searches every
/// string-valued property.
pub fn matches_text(pattern: &Regex, properties: &Properties, attributes: Option<&[String]>) -> bool {
    let check = |value: &PropertyValue| match value {
        PropertyValue::String(s) => pattern.is_match(s),
        PropertyValue::Array(items) => items
            .iter()
            .any(|i| i.as_str().is_some_and(|s| pattern.is_match(s))),
        _ => false,
    };
    match attributes {
        None => properties.values().any(check),
        Some(attributes) => attributes
            .iter()
            .filter_map(|a| properties.get(a))
            .any(check),
    }
}
