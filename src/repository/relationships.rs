//! Relationship reads and writes

use super::connector::RepositoryConnector;
use super::entities::history_window;
use super::error::{RepositoryError, RepositoryResult, StorageContext};
use super::reader::HistoryOrder;
use super::validate;
use crate::graph::{
    now_micros, Entity, Guid, InstanceStatus, Properties, PropertyValue, Relationship,
    RelationshipEnd, TypeCategory,
};
use crate::query::{page, sequence, validate_paging, FindQuery, FindRequest, InstanceSource};
use crate::txn::{Expect, Mutation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Arguments of `add_relationship`
#[derive(Debug, Clone)]
pub struct NewRelationship {
    pub type_guid: String,
    pub end1: Guid,
    pub end2: Guid,
    pub properties: Properties,
    pub status: InstanceStatus,
}

impl NewRelationship {
    pub fn of_type(type_guid: impl Into<String>, end1: Guid, end2: Guid) -> Self {
        Self {
            type_guid: type_guid.into(),
            end1,
            end2,
            properties: HashMap::new(),
            status: InstanceStatus::Active,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }
}

impl RepositoryConnector {
    // === Reads ===

    /// The relationship if it is held and not deleted
    pub fn is_relationship_known(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        self.with_snapshot("is_relationship_known", Some(guid), None, |reader| {
            let relationship = reader
                .relationship(guid)
                .context("is_relationship_known", Some(guid), None)?;
            Ok(relationship.filter(|r| r.header.status != InstanceStatus::Deleted))
        })
    }

    pub fn get_relationship(
        &self,
        user_id: &str,
        guid: &Guid,
        as_of: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Relationship> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        let relationship = self.with_snapshot("get_relationship", Some(guid), as_of, |reader| {
            reader
                .relationship(guid)
                .context("get_relationship", Some(guid), reader.as_of())?
                .ok_or_else(|| RepositoryError::NotKnown(format!("relationship {}", guid)))
        })?;
        if relationship.header.status == InstanceStatus::Deleted {
            return Err(RepositoryError::NotKnown(format!(
                "relationship {} (deleted)",
                guid
            )));
        }
        Ok(relationship)
    }

    pub fn get_relationship_history(
        &self,
        user_id: &str,
        guid: &Guid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        order: HistoryOrder,
    ) -> RepositoryResult<Vec<Relationship>> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        history_window(from, to)?;
        self.with_snapshot("get_relationship_history", Some(guid), None, |reader| {
            let versions = reader
                .history::<Relationship>(guid, from, to, order)
                .context("get_relationship_history", Some(guid), None)?;
            if versions.is_empty()
                && reader
                    .history::<Relationship>(guid, None, None, order)
                    .context("get_relationship_history", Some(guid), None)?
                    .is_empty()
            {
                return Err(RepositoryError::NotKnown(format!("relationship {}", guid)));
            }
            Ok(versions)
        })
    }

    /// Relationships with the entity at either end.
    ///
    /// The request's type, status, property, sequencing, paging and as-of
    /// options apply; classification options do not.
    pub fn get_relationships_for_entity(
        &self,
        user_id: &str,
        entity_guid: &Guid,
        request: &FindRequest,
    ) -> RepositoryResult<Vec<Relationship>> {
        const OPERATION: &str = "get_relationships_for_entity";
        validate::user_id(user_id)?;
        validate::guid("entity guid", entity_guid)?;
        let max_page_size = self.config.max_page_size;
        validate_paging(&request.sequencing, &request.paging, max_page_size)?;
        let type_names = self.resolve_type_names(request, TypeCategory::Relationship)?;
        let query = FindQuery::compile(request, type_names)?;

        self.with_snapshot(OPERATION, Some(entity_guid), request.as_of, |reader| {
            match reader.entity(entity_guid).context(OPERATION, Some(entity_guid), request.as_of)? {
                Some(entity) if entity.status() != InstanceStatus::Deleted => {}
                _ => return Err(RepositoryError::NotKnown(format!("entity {}", entity_guid))),
            }
            let mut relationships: Vec<Relationship> = reader
                .relationships_for(entity_guid)
                .context(OPERATION, Some(entity_guid), request.as_of)?
                .into_iter()
                .filter(|r| query.matches_relationship(r))
                .collect();
            sequence(&mut relationships, &request.sequencing);
            Ok(page(relationships, &request.paging, max_page_size))
        })
    }

    // === Writes ===

    /// Connect two held entities; proxies are valid ends
    pub async fn add_relationship(
        &self,
        user_id: &str,
        request: NewRelationship,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::user_id(user_id)?;
        validate::guid("end1 guid", &request.end1)?;
        validate::guid("end2 guid", &request.end2)?;
        validate::initial_status(request.status)?;
        let typedef = self
            .registry
            .resolve_category(&request.type_guid, TypeCategory::Relationship)?;
        self.registry
            .validate_properties(&typedef.name, &request.properties, true)?;

        let end1 = self.relationship_end("add_relationship", &request.end1)?;
        let end2 = self.relationship_end("add_relationship", &request.end2)?;
        self.registry
            .validate_relationship_ends(&typedef.name, &end1.type_name, &end2.type_name)?;

        let mut relationship = Relationship::new(
            self.registry.instance_type(&typedef.name)?,
            self.local_provenance(),
            end1,
            end2,
            user_id,
            now_micros(),
        );
        relationship.properties = request.properties;
        relationship.header.status = request.status;

        let guid = relationship.guid().clone();
        self.apply("add_relationship", Some(&guid), Mutation::AddRelationship(relationship))
            .await
    }

    pub async fn update_relationship_status(
        &self,
        user_id: &str,
        guid: &Guid,
        status: InstanceStatus,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::status_update(status)?;
        self.mutate_relationship("update_relationship_status", user_id, guid, |_, expect| {
            Ok(Mutation::UpdateRelationshipStatus { expect, status })
        })
        .await
    }

    pub async fn update_relationship_properties(
        &self,
        user_id: &str,
        guid: &Guid,
        properties: Properties,
    ) -> RepositoryResult<Option<Relationship>> {
        self.mutate_relationship(
            "update_relationship_properties",
            user_id,
            guid,
            move |current, expect| {
                self.registry
                    .validate_properties(current.type_name(), &properties, true)?;
                Ok(Mutation::UpdateRelationshipProperties { expect, properties })
            },
        )
        .await
    }

    pub async fn undo_relationship_update(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Relationship>> {
        self.mutate_relationship("undo_relationship_update", user_id, guid, |current, expect| {
            if current.version() <= 1 {
                return Err(RepositoryError::InvalidParameter(format!(
                    "relationship {} has no earlier version",
                    current.guid()
                )));
            }
            Ok(Mutation::UndoRelationshipUpdate { expect })
        })
        .await
    }

    pub async fn delete_relationship(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Relationship>> {
        self.mutate_relationship("delete_relationship", user_id, guid, |_, expect| {
            Ok(Mutation::DeleteRelationship { expect })
        })
        .await
    }

    pub async fn restore_relationship(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        let current = self.stored_relationship("restore_relationship", guid)?;
        if current.header.status != InstanceStatus::Deleted {
            return Err(RepositoryError::InvalidParameter(format!(
                "relationship {} is not deleted",
                guid
            )));
        }
        validate::locally_homed(&current.header, "relationship", self.metadata_collection_id())?;
        let expect = Expect::new(guid.clone(), current.version(), user_id);
        self.apply(
            "restore_relationship",
            Some(guid),
            Mutation::RestoreRelationship { expect },
        )
        .await
    }

    /// Always waits for the outcome, whatever the commit mode
    pub async fn purge_relationship(&self, user_id: &str, guid: &Guid) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        let current = self.stored_relationship("purge_relationship", guid)?;
        if current.header.status != InstanceStatus::Deleted {
            return Err(RepositoryError::InvalidParameter(format!(
                "relationship {} must be deleted before it is purged",
                guid
            )));
        }
        validate::locally_homed(&current.header, "relationship", self.metadata_collection_id())?;
        self.apply_and_confirm(
            "purge_relationship",
            guid,
            Mutation::PurgeRelationship {
                guid: guid.clone(),
                version: current.version(),
            },
        )
        .await
    }

    pub async fn re_identify_relationship(
        &self,
        user_id: &str,
        guid: &Guid,
        new_guid: Guid,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::guid("new relationship guid", &new_guid)?;
        if &new_guid == guid {
            return Err(RepositoryError::InvalidParameter(
                "new guid must differ from the current one".into(),
            ));
        }
        self.mutate_relationship("re_identify_relationship", user_id, guid, move |_, expect| {
            Ok(Mutation::ReIdentifyRelationship { expect, new_guid })
        })
        .await
    }

    /// Change the relationship's type; its ends and properties must suit it
    pub async fn re_type_relationship(
        &self,
        user_id: &str,
        guid: &Guid,
        new_type_guid: &str,
    ) -> RepositoryResult<Option<Relationship>> {
        self.mutate_relationship("re_type_relationship", user_id, guid, |current, expect| {
            let typedef = self
                .registry
                .resolve_category(new_type_guid, TypeCategory::Relationship)?;
            self.registry
                .validate_properties(&typedef.name, &current.properties, true)?;
            self.registry.validate_relationship_ends(
                &typedef.name,
                &current.end1.type_name,
                &current.end2.type_name,
            )?;
            let new_type = self.registry.instance_type(&typedef.name)?;
            Ok(Mutation::ReTypeRelationship { expect, new_type })
        })
        .await
    }

    pub async fn re_home_relationship(
        &self,
        user_id: &str,
        guid: &Guid,
        new_collection_id: &str,
        new_collection_name: &str,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        validate::text("new metadata collection id", new_collection_id)?;
        let current = self.live_relationship("re_home_relationship", guid)?;
        let provenance =
            self.provenance_for(&current.header.provenance, new_collection_id, new_collection_name);
        let expect = Expect::new(guid.clone(), current.version(), user_id);
        self.apply(
            "re_home_relationship",
            Some(guid),
            Mutation::ReHomeRelationship { expect, provenance },
        )
        .await
    }

    /// Cache a copy of a relationship homed in another collection.
    ///
    /// Ends the collection does not hold yet are stored as proxies homed with
    /// the relationship.
    pub async fn save_relationship_reference_copy(
        &self,
        user_id: &str,
        relationship: Relationship,
    ) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", relationship.guid())?;
        validate::homed_elsewhere(&relationship.header, "relationship", self.metadata_collection_id())?;
        let typedef = self.registry.resolve_category(
            &relationship.header.instance_type.type_guid,
            TypeCategory::Relationship,
        )?;
        self.registry
            .validate_properties(&typedef.name, &relationship.properties, false)?;

        let now = now_micros();
        let end1_proxy = self.end_proxy(user_id, &relationship, &relationship.end1, now)?;
        let end2_proxy = self.end_proxy(user_id, &relationship, &relationship.end2, now)?;
        let guid = relationship.guid().clone();
        self.apply::<Relationship>(
            "save_relationship_reference_copy",
            Some(&guid),
            Mutation::SaveRelationshipReferenceCopy {
                relationship,
                end1_proxy,
                end2_proxy,
            },
        )
        .await?;
        Ok(())
    }

    /// Drop a cached reference copy; the outcome is not awaited
    pub async fn purge_relationship_reference_copy(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        match self.stored_relationship("purge_relationship_reference_copy", guid) {
            Ok(current) => validate::homed_elsewhere(
                &current.header,
                "relationship",
                self.metadata_collection_id(),
            )?,
            Err(RepositoryError::NotKnown(_)) => return Ok(()),
            Err(e) => return Err(e),
        }
        self.apply_in_background(
            "purge_relationship_reference_copy",
            guid,
            Mutation::PurgeRelationshipReferenceCopy { guid: guid.clone() },
        )
    }

    // === Helpers ===

    async fn mutate_relationship(
        &self,
        operation: &'static str,
        user_id: &str,
        guid: &Guid,
        build: impl FnOnce(&Relationship, Expect) -> RepositoryResult<Mutation>,
    ) -> RepositoryResult<Option<Relationship>> {
        validate::user_id(user_id)?;
        validate::guid("relationship guid", guid)?;
        let current = self.live_relationship(operation, guid)?;
        validate::locally_homed(&current.header, "relationship", self.metadata_collection_id())?;
        let expect = Expect::new(guid.clone(), current.version(), user_id);
        let mutation = build(&current, expect)?;
        self.apply(operation, Some(guid), mutation).await
    }

    /// End reference for a held, live entity
    fn relationship_end(
        &self,
        operation: &'static str,
        guid: &Guid,
    ) -> RepositoryResult<RelationshipEnd> {
        let entity = self.stored_entity(operation, guid)?;
        if entity.status() == InstanceStatus::Deleted {
            return Err(RepositoryError::NotKnown(format!("entity {} (deleted)", guid)));
        }
        Ok(RelationshipEnd::new(guid.clone(), entity.type_name()))
    }

    fn end_proxy(
        &self,
        user_id: &str,
        relationship: &Relationship,
        end: &RelationshipEnd,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Entity> {
        Ok(Entity::new_proxy(
            end.guid.clone(),
            self.registry.instance_type(&end.type_name)?,
            relationship.header.provenance.clone(),
            user_id,
            at,
        ))
    }
}
