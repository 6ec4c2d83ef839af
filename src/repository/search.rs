//! Find operations over entities and relationships

use super::connector::RepositoryConnector;
use super::error::{RepositoryResult, StorageContext};
use super::validate;
use crate::graph::{Entity, Relationship, TypeCategory};
use crate::mapping::MappedInstance;
use crate::query::{
    exact_match, page, sequence, validate_paging, ClassificationCondition, FindQuery,
    FindRequest, MatchCriteria, SearchClassifications, SearchProperties, Sequenced,
};
use crate::storage::DocFilter;
use crate::types::TypeDefError;
use std::collections::HashMap;
use tracing::debug;

impl RepositoryConnector {
    /// Entities matching every condition of the request
    pub fn find_entities(
        &self,
        user_id: &str,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Entity>> {
        validate::user_id(user_id)?;
        self.run_find("find_entities", request, TypeCategory::Entity)
    }

    /// Entities with any string attribute fully matching `search_text`.
    ///
    /// `search_text` is a regex; wrap literals with `query::exact_match`.
    pub fn find_entities_by_property_value(
        &self,
        user_id: &str,
        search_text: &str,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Entity>> {
        validate::user_id(user_id)?;
        validate::text("search text", search_text)?;
        let request = request.clone().containing_text(search_text);
        self.run_find(
            "find_entities_by_property_value",
            &request,
            TypeCategory::Entity,
        )
    }

    /// Entities carrying classification `name` whose classification
    /// properties satisfy `properties`
    pub fn find_entities_by_classification(
        &self,
        user_id: &str,
        name: &str,
        properties: Option<SearchProperties>,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Entity>> {
        validate::user_id(user_id)?;
        validate::text("classification name", name)?;
        let typedef = self.registry.resolve_name(name)?;
        if typedef.category != TypeCategory::Classification {
            return Err(TypeDefError::WrongCategory {
                type_name: name.to_string(),
                expected: TypeCategory::Classification,
                actual: typedef.category,
            }
            .into());
        }

        let mut condition = ClassificationCondition::named(name);
        if let Some(properties) = properties {
            condition = condition.with_properties(properties);
        }
        let request = request
            .clone()
            .classified(SearchClassifications::new(MatchCriteria::All).with_condition(condition));
        self.run_find(
            "find_entities_by_classification",
            &request,
            TypeCategory::Entity,
        )
    }

    pub fn find_relationships(
        &self,
        user_id: &str,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Relationship>> {
        validate::user_id(user_id)?;
        self.run_find("find_relationships", request, TypeCategory::Relationship)
    }

    pub fn find_relationships_by_property_value(
        &self,
        user_id: &str,
        search_text: &str,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Relationship>> {
        validate::user_id(user_id)?;
        validate::text("search text", search_text)?;
        let request = request.clone().containing_text(search_text);
        self.run_find(
            "find_relationships_by_property_value",
            &request,
            TypeCategory::Relationship,
        )
    }

    /// Entities whose string attributes contain `literal` verbatim
    pub fn find_entities_containing(
        &self,
        user_id: &str,
        literal: &str,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Entity>> {
        let pattern = format!(".*{}.*", exact_match(literal));
        self.find_entities_by_property_value(user_id, &pattern, request)
    }

    /// Type names a request accepts, with subtypes expanded; empty means any.
    ///
    /// A subtype list narrows the request to those subtypes, each of which
    /// must descend from the requested type.
    pub(super) fn resolve_type_names(
        &self,
        request: &FindRequest,
        category: TypeCategory,
    ) -> RepositoryResult<Vec<String>> {
        let base = request
            .type_guid
            .as_deref()
            .map(|guid| self.registry.resolve_category(guid, category))
            .transpose()?;
        if request.subtype_guids.is_empty() {
            return Ok(base
                .map(|typedef| self.registry.subtype_names(&typedef.name))
                .unwrap_or_default());
        }

        let mut names = Vec::new();
        for guid in &request.subtype_guids {
            let subtype = self.registry.resolve_category(guid, category)?;
            if let Some(base) = &base {
                if !self.registry.is_type_of(&subtype.name, &base.name) {
                    return Err(TypeDefError::NotValid {
                        type_name: subtype.name.clone(),
                        reason: format!("not a subtype of '{}'", base.name),
                    }
                    .into());
                }
            }
            for name in self.registry.subtype_names(&subtype.name) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn run_find<T>(
        &self,
        operation: &'static str,
        request: &FindRequest,
        category: TypeCategory,
    ) -> RepositoryResult<Vec<T>>
    where
        T: MappedInstance + Sequenced + FoundBy,
    {
        let max_page_size = self.config.max_page_size;
        validate_paging(&request.sequencing, &request.paging, max_page_size)?;
        let type_names = self.resolve_type_names(request, category)?;

        let mut text_attributes = HashMap::new();
        if request.search_text.is_some() {
            let candidates: Vec<String> = if type_names.is_empty() {
                self.registry
                    .type_defs()
                    .iter()
                    .filter(|t| t.category == category)
                    .map(|t| t.name.clone())
                    .collect()
            } else {
                type_names.clone()
            };
            for name in candidates {
                let attributes = self.registry.string_attributes(&name);
                text_attributes.insert(name, attributes);
            }
        }
        let query = FindQuery::compile(request, type_names)?.with_text_attributes(text_attributes);

        let filter = DocFilter::new()
            .with_prefix(T::KIND.prefix())
            .with_types(query.type_names().to_vec())
            .with_statuses(query.statuses().iter().map(|s| s.as_str().to_string()));

        self.with_snapshot(operation, None, request.as_of, |reader| {
            let mut found: Vec<T> = reader
                .all::<T>(&filter)
                .context(operation, None, request.as_of)?
                .into_iter()
                .filter(|instance| instance.is_found_by(&query))
                .collect();
            debug!(operation, candidates = found.len(), "find matched");
            sequence(&mut found, &request.sequencing);
            Ok(page(found, &request.paging, max_page_size))
        })
    }
}

trait FoundBy {
    fn is_found_by(&self, query: &FindQuery) -> bool;
}

impl FoundBy for Entity {
    fn is_found_by(&self, query: &FindQuery) -> bool {
        query.matches_entity(self)
    }
}

impl FoundBy for Relationship {
    fn is_found_by(&self, query: &FindQuery) -> bool {
        query.matches_relationship(self)
    }
}
