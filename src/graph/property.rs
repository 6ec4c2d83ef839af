//! Typed property values carried by entities, relationships and classifications

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Map(HashMap<String, PropertyValue>),
}

/// Property bag keyed by attribute name
pub type Properties = HashMap<String, PropertyValue>;

impl PropertyValue {
    /// Borrow the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the value's shape, used in validation messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Array(_) => "array",
            PropertyValue::Map(_) => "map",
        }
    }

    /// Order two scalar values of compatible kinds.
    ///
    /// Ints and floats compare numerically with each other. Values of
    /// unrelated kinds (or collections) have no ordering.
    pub fn compare(&self, other: &PropertyValue) -> Option<Ordering> {
        match (self, other) {
            (PropertyValue::String(a), PropertyValue::String(b)) => Some(a.cmp(b)),
            (PropertyValue::Int(a), PropertyValue::Int(b)) => Some(a.cmp(b)),
            (PropertyValue::Int(a), PropertyValue::Float(b)) => (*a as f64).partial_cmp(b),
            (PropertyValue::Float(a), PropertyValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (PropertyValue::Float(a), PropertyValue::Float(b)) => a.partial_cmp(b),
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Value equality that treats `Int(1)` and `Float(1.0)` as equal
    pub fn loosely_equals(&self, other: &PropertyValue) -> bool {
        match self.compare(other) {
            Some(ordering) => ordering == Ordering::Equal,
            None => self == other,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_compare_across_kinds() {
        let int = PropertyValue::Int(3);
        let float = PropertyValue::Float(3.5);
        assert_eq!(int.compare(&float), Some(Ordering::Less));
        assert!(PropertyValue::Int(2).loosely_equals(&PropertyValue::Float(2.0)));
    }

    #[test]
    fn unrelated_kinds_have_no_ordering() {
        let s = PropertyValue::from("a");
        assert_eq!(s.compare(&PropertyValue::Bool(true)), None);
        assert!(!s.loosely_equals(&PropertyValue::Int(1)));
    }

    #[test]
    fn untagged_deserialization_picks_natural_kind() {
        let props: Properties =
            serde_json::from_str(r#"{"a":"x","b":7,"c":1.5,"d":false,"e":[1,"y"]}"#).unwrap();
        assert_eq!(props["a"], PropertyValue::String("x".into()));
        assert_eq!(props["b"], PropertyValue::Int(7));
        assert_eq!(props["c"], PropertyValue::Float(1.5));
        assert_eq!(props["d"], PropertyValue::Bool(false));
        assert_eq!(
            props["e"],
            PropertyValue::Array(vec![PropertyValue::Int(1), PropertyValue::from("y")])
        );
    }
}
