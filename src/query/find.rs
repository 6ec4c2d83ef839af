//! Find requests compiled for evaluation against stored instances

use super::matching::{matches_text, ClassificationMatcher, PropertyMatcher};
use super::text::full_match_regex;
use super::types::{FindRequest, QueryError};
use crate::graph::{Entity, InstanceHeader, InstanceStatus, Properties, Relationship};
use regex_lite::Regex;
use std::collections::HashMap;

/// A `FindRequest` with its patterns compiled and its types resolved to names
#[derive(Debug)]
pub struct FindQuery {
    type_names: Vec<String>,
    statuses: Vec<InstanceStatus>,
    properties: Option<PropertyMatcher>,
    classifications: Option<ClassificationMatcher>,
    required_classifications: Vec<String>,
    text: Option<Regex>,
    /// String attributes searched per type name; types missing from the map
    /// search every string property
    text_attributes: HashMap<String, Vec<String>>,
}

impl FindQuery {
    /// `type_names` is the already expanded set of acceptable type names;
    /// empty accepts any type.
    pub fn compile(request: &FindRequest, type_names: Vec<String>) -> Result<Self, QueryError> {
        Ok(Self {
            type_names,
            statuses: request.effective_statuses(),
            properties: request
                .match_properties
                .as_ref()
                .map(PropertyMatcher::compile)
                .transpose()?,
            classifications: request
                .match_classifications
                .as_ref()
                .map(ClassificationMatcher::compile)
                .transpose()?,
            required_classifications: request.limit_by_classification.clone(),
            text: request
                .search_text
                .as_deref()
                .map(full_match_regex)
                .transpose()?,
            text_attributes: HashMap::new(),
        })
    }

    pub fn with_text_attributes(mut self, text_attributes: HashMap<String, Vec<String>>) -> Self {
        self.text_attributes = text_attributes;
        self
    }

    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    pub fn statuses(&self) -> &[InstanceStatus] {
        &self.statuses
    }

    fn matches_common(&self, header: &InstanceHeader, properties: &Properties) -> bool {
        let type_name = &header.instance_type.type_name;
        if !self.type_names.is_empty() && !self.type_names.contains(type_name) {
            return false;
        }
        if !self.statuses.contains(&header.status) {
            return false;
        }
        if let Some(matcher) = &self.properties {
            if !matcher.matches(properties) {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let attributes = self.text_attributes.get(type_name).map(Vec::as_slice);
            if !matches_text(text, properties, attributes) {
                return false;
            }
        }
        true
    }

    /// Proxies are never returned by a find
    pub fn matches_entity(&self, entity: &Entity) -> bool {
        !entity.proxy
            && self.matches_common(&entity.header, &entity.properties)
            && self
                .required_classifications
                .iter()
                .all(|c| entity.has_classification(c))
            && self
                .classifications
                .as_ref()
                .map_or(true, |m| m.matches(entity))
    }

    /// Classification conditions do not apply to relationships
    pub fn matches_relationship(&self, relationship: &Relationship) -> bool {
        self.matches_common(&relationship.header, &relationship.properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Guid, PropertyValue};
    use crate::query::fixture::{classified, entity, link};
    use crate::query::types::{MatchCriteria, PropertyCondition, SearchProperties};

    #[test]
    fn type_and_status_restrict_results() {
        let query = FindQuery::compile(&FindRequest::new(), vec!["Table".into()]).unwrap();
        assert!(query.matches_entity(&entity("t", "Table")));
        assert!(!query.matches_entity(&entity("c", "Column")));
        assert!(!query.matches_entity(&entity("t", "Table").with_status(InstanceStatus::Deleted)));

        let deleted = FindRequest::new().with_status(InstanceStatus::Deleted);
        let query = FindQuery::compile(&deleted, vec![]).unwrap();
        assert!(query.matches_entity(&entity("t", "Table").with_status(InstanceStatus::Deleted)));
    }

    #[test]
    fn proxies_never_match() {
        let query = FindQuery::compile(&FindRequest::new(), vec![]).unwrap();
        let proxy = entity("p", "Table").to_proxy();
        assert!(!query.matches_entity(&proxy));
    }

    #[test]
    fn free_text_uses_string_attributes_of_the_type() {
        let request = FindRequest::new().containing_text(".*sales.*");
        let query = FindQuery::compile(&request, vec![])
            .unwrap()
            .with_text_attributes(HashMap::from([("Table".to_string(), vec!["name".to_string()])]));
        let named = entity("t", "Table").with_property("name", PropertyValue::from("sales_2024"));
        let described =
            entity("u", "Table").with_property("description", PropertyValue::from("sales data"));
        assert!(query.matches_entity(&named));
        assert!(!query.matches_entity(&described));
    }

    #[test]
    fn classification_limits_and_property_conditions() {
        let request = FindRequest::new()
            .limited_by_classification("Confidential")
            .matching(
                SearchProperties::new(MatchCriteria::All)
                    .with_condition(PropertyCondition::eq("owner", "ops")),
            );
        let query = FindQuery::compile(&request, vec![]).unwrap();
        let hit = classified("a", "Table", "Confidential")
            .with_property("owner", PropertyValue::from("ops"));
        let unclassified = entity("b", "Table").with_property("owner", PropertyValue::from("ops"));
        assert!(query.matches_entity(&hit));
        assert!(!query.matches_entity(&unclassified));
    }

    #[test]
    fn relationships_ignore_classification_conditions() {
        let request = FindRequest::new().limited_by_classification("Confidential");
        let query = FindQuery::compile(&request, vec!["Link".into()]).unwrap();
        let mut rel = link("r", "Link", "a", "b");
        rel.header.guid = Guid::from("r");
        assert!(query.matches_relationship(&rel));
    }

    #[test]
    fn bad_pattern_fails_compilation() {
        let request = FindRequest::new().containing_text("[oops");
        assert!(FindQuery::compile(&request, vec![]).is_err());
    }
}
