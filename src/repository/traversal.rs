//! Graph traversal operations

use super::connector::RepositoryConnector;
use super::error::{RepositoryError, RepositoryResult, StorageContext};
use super::validate;
use crate::graph::{Entity, Guid, InstanceGraph, InstanceStatus, TypeCategory};
use crate::query::{
    page, sequence, validate_paging, InstanceSource, LinkingQuery, NeighborhoodQuery, Paging,
    RelatedQuery, Sequencing, TraversalFilter,
};
use crate::types::TypeDefError;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Options shared by the traversal operations.
///
/// Type filters name type GUIDs and include their subtypes. Sequencing and
/// paging only apply to `get_related_entities`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversalRequest {
    pub entity_type_guids: Vec<String>,
    pub relationship_type_guids: Vec<String>,
    /// Empty means every status except deleted
    pub statuses: Vec<InstanceStatus>,
    /// Classification names every returned entity must carry
    pub classifications: Vec<String>,
    pub as_of: Option<DateTime<Utc>>,
    pub sequencing: Sequencing,
    pub paging: Paging,
}

impl TraversalRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, type_guid: impl Into<String>) -> Self {
        self.entity_type_guids.push(type_guid.into());
        self
    }

    pub fn with_relationship_type(mut self, type_guid: impl Into<String>) -> Self {
        self.relationship_type_guids.push(type_guid.into());
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_classification(mut self, name: impl Into<String>) -> Self {
        self.classifications.push(name.into());
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
}

impl RepositoryConnector {
    /// Entities within `level` hops of `guid` and the relationships among them
    pub fn get_entity_neighborhood(
        &self,
        user_id: &str,
        guid: &Guid,
        level: usize,
        request: &TraversalRequest,
    ) -> RepositoryResult<InstanceGraph> {
        const OPERATION: &str = "get_entity_neighborhood";
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let filter = self.traversal_filter(request)?;
        let query = NeighborhoodQuery::around(guid.clone()).level(level).filter(filter);

        self.with_snapshot(OPERATION, Some(guid), request.as_of, |reader| {
            require_live(reader.entity(guid).context(OPERATION, Some(guid), request.as_of)?, guid)?;
            let graph = query
                .execute(reader)
                .context(OPERATION, Some(guid), request.as_of)?;
            debug!(
                entities = graph.entities.len(),
                relationships = graph.relationships.len(),
                level,
                "neighborhood collected"
            );
            Ok(graph)
        })
    }

    /// Entities and relationships on the shortest paths between two entities.
    ///
    /// An empty graph means the two are not connected under the filters.
    pub fn get_linking_entities(
        &self,
        user_id: &str,
        start: &Guid,
        end: &Guid,
        request: &TraversalRequest,
    ) -> RepositoryResult<InstanceGraph> {
        const OPERATION: &str = "get_linking_entities";
        validate::user_id(user_id)?;
        validate::guid("start entity guid", start)?;
        validate::guid("end entity guid", end)?;
        let filter = self.traversal_filter(request)?;
        let query = LinkingQuery::between(start.clone(), end.clone()).filter(filter);

        self.with_snapshot(OPERATION, Some(start), request.as_of, |reader| {
            for guid in [start, end] {
                require_live(reader.entity(guid).context(OPERATION, Some(guid), request.as_of)?, guid)?;
            }
            query.execute(reader).context(OPERATION, Some(start), request.as_of)
        })
    }

    /// Every entity reachable from `guid`, sequenced and paged
    pub fn get_related_entities(
        &self,
        user_id: &str,
        guid: &Guid,
        request: &TraversalRequest,
    ) -> RepositoryResult<Vec<Entity>> {
        const OPERATION: &str = "get_related_entities";
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let max_page_size = self.config.max_page_size;
        validate_paging(&request.sequencing, &request.paging, max_page_size)?;
        let filter = self.traversal_filter(request)?;
        let query = RelatedQuery::from(guid.clone()).filter(filter);

        self.with_snapshot(OPERATION, Some(guid), request.as_of, |reader| {
            require_live(reader.entity(guid).context(OPERATION, Some(guid), request.as_of)?, guid)?;
            let mut related = query
                .execute(reader)
                .context(OPERATION, Some(guid), request.as_of)?;
            sequence(&mut related, &request.sequencing);
            Ok(page(related, &request.paging, max_page_size))
        })
    }

    fn traversal_filter(&self, request: &TraversalRequest) -> RepositoryResult<TraversalFilter> {
        let mut filter = TraversalFilter::new().with_statuses(request.statuses.iter().copied());
        for guid in &request.entity_type_guids {
            let typedef = self.registry.resolve_category(guid, TypeCategory::Entity)?;
            filter = filter.with_entity_types(self.registry.subtype_names(&typedef.name));
        }
        for guid in &request.relationship_type_guids {
            let typedef = self
                .registry
                .resolve_category(guid, TypeCategory::Relationship)?;
            filter = filter.with_relationship_types(self.registry.subtype_names(&typedef.name));
        }
        for name in &request.classifications {
            let typedef = self.registry.resolve_name(name)?;
            if typedef.category != TypeCategory::Classification {
                return Err(TypeDefError::WrongCategory {
                    type_name: name.clone(),
                    expected: TypeCategory::Classification,
                    actual: typedef.category,
                }
                .into());
            }
            filter = filter.with_classification(name.clone());
        }
        Ok(filter)
    }
}

fn require_live(entity: Option<Entity>, guid: &Guid) -> RepositoryResult<Entity> {
    match entity {
        Some(entity) if entity.status() != InstanceStatus::Deleted => Ok(entity),
        _ => Err(RepositoryError::NotKnown(format!("entity {}", guid))),
    }
}
