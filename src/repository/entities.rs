//! Entity reads and writes

use super::connector::RepositoryConnector;
use super::error::{RepositoryError, RepositoryResult, StorageContext};
use super::reader::HistoryOrder;
use super::validate;
use crate::graph::{
    now_micros, Classification, Entity, Guid, InstanceProvenance, InstanceStatus, Properties,
    PropertyValue, TypeCategory,
};
use crate::txn::{Expect, Mutation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Arguments of `add_entity`
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub type_guid: String,
    pub properties: Properties,
    /// Classification names with their properties
    pub classifications: Vec<(String, Properties)>,
    pub status: InstanceStatus,
}

impl NewEntity {
    pub fn of_type(type_guid: impl Into<String>) -> Self {
        Self {
            type_guid: type_guid.into(),
            properties: HashMap::new(),
            classifications: Vec::new(),
            status: InstanceStatus::Active,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_classification(mut self, name: impl Into<String>, properties: Properties) -> Self {
        self.classifications.push((name.into(), properties));
        self
    }

    pub fn with_status(mut self, status: InstanceStatus) -> Self {
        self.status = status;
        self
    }
}

impl RepositoryConnector {
    // === Reads ===

    /// The entity if it is held and not deleted, proxies included.
    ///
    /// Unlike the other reads this reports absence as `None`.
    pub fn is_entity_known(&self, user_id: &str, guid: &Guid) -> RepositoryResult<Option<Entity>> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        self.with_snapshot("is_entity_known", Some(guid), None, |reader| {
            let entity = reader
                .instance::<Entity>(guid)
                .context("is_entity_known", Some(guid), None)?;
            Ok(entity.filter(|e| e.status() != InstanceStatus::Deleted))
        })
    }

    /// Full entity as it stood at `as_of`, or now
    pub fn get_entity_detail(
        &self,
        user_id: &str,
        guid: &Guid,
        as_of: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Entity> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let entity = self.with_snapshot("get_entity_detail", Some(guid), as_of, |reader| {
            reader
                .instance::<Entity>(guid)
                .context("get_entity_detail", Some(guid), reader.as_of())?
                .ok_or_else(|| RepositoryError::NotKnown(format!("entity {}", guid)))
        })?;
        validate::full_entity(entity)
    }

    /// Header and classifications only; also answers for proxies
    pub fn get_entity_summary(
        &self,
        user_id: &str,
        guid: &Guid,
        as_of: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Entity> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let mut entity = self.with_snapshot("get_entity_summary", Some(guid), as_of, |reader| {
            reader
                .instance::<Entity>(guid)
                .context("get_entity_summary", Some(guid), reader.as_of())?
                .ok_or_else(|| RepositoryError::NotKnown(format!("entity {}", guid)))
        })?;
        if entity.status() == InstanceStatus::Deleted {
            return Err(RepositoryError::NotKnown(format!("entity {} (deleted)", guid)));
        }
        entity.properties.clear();
        Ok(entity)
    }

    /// Versions recorded in `[from, to)`; both bounds optional
    pub fn get_entity_detail_history(
        &self,
        user_id: &str,
        guid: &Guid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        order: HistoryOrder,
    ) -> RepositoryResult<Vec<Entity>> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        history_window(from, to)?;
        self.with_snapshot("get_entity_detail_history", Some(guid), None, |reader| {
            let versions = reader
                .history::<Entity>(guid, from, to, order)
                .context("get_entity_detail_history", Some(guid), None)?;
            if versions.is_empty() {
                // An empty window on a held entity is a valid empty answer
                let all = reader
                    .history::<Entity>(guid, None, None, order)
                    .context("get_entity_detail_history", Some(guid), None)?;
                if all.is_empty() {
                    return Err(RepositoryError::NotKnown(format!("entity {}", guid)));
                }
            }
            Ok(versions)
        })
    }

    // === Writes ===

    pub async fn add_entity(
        &self,
        user_id: &str,
        request: NewEntity,
    ) -> RepositoryResult<Option<Entity>> {
        validate::user_id(user_id)?;
        validate::initial_status(request.status)?;
        let typedef = self
            .registry
            .resolve_category(&request.type_guid, TypeCategory::Entity)?;
        self.registry
            .validate_properties(&typedef.name, &request.properties, true)?;

        let now = now_micros();
        let mut classifications = Vec::with_capacity(request.classifications.len());
        for (name, properties) in request.classifications {
            classifications.push(self.new_classification(
                user_id,
                &typedef.name,
                &name,
                properties,
                now,
            )?);
        }

        let mut entity = Entity::new(
            self.registry.instance_type(&typedef.name)?,
            self.local_provenance(),
            user_id,
            now,
        )
        .with_properties(request.properties)
        .with_status(request.status);
        entity.classifications = classifications;

        let guid = entity.guid().clone();
        self.apply("add_entity", Some(&guid), Mutation::AddEntity(entity))
            .await
    }

    /// Store a stub for an entity homed in another collection
    pub async fn add_entity_proxy(&self, user_id: &str, proxy: Entity) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("proxy guid", proxy.guid())?;
        self.registry
            .resolve_category(&proxy.header.instance_type.type_guid, TypeCategory::Entity)?;
        validate::homed_elsewhere(&proxy.header, "entity proxy", self.metadata_collection_id())?;
        let guid = proxy.guid().clone();
        self.apply::<Entity>(
            "add_entity_proxy",
            Some(&guid),
            Mutation::AddEntityProxy(proxy.to_proxy()),
        )
        .await?;
        Ok(())
    }

    pub async fn update_entity_status(
        &self,
        user_id: &str,
        guid: &Guid,
        status: InstanceStatus,
    ) -> RepositoryResult<Option<Entity>> {
        validate::status_update(status)?;
        self.mutate_entity("update_entity_status", user_id, guid, |_, expect| {
            Ok(Mutation::UpdateEntityStatus { expect, status })
        })
        .await
    }

    /// Replace the whole property bag
    pub async fn update_entity_properties(
        &self,
        user_id: &str,
        guid: &Guid,
        properties: Properties,
    ) -> RepositoryResult<Option<Entity>> {
        self.mutate_entity("update_entity_properties", user_id, guid, move |current, expect| {
            self.registry.validate_properties(current.type_name(), &properties, true)?;
            Ok(Mutation::UpdateEntityProperties { expect, properties })
        })
        .await
    }

    /// Make the previous version's content current again as a new version
    pub async fn undo_entity_update(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Entity>> {
        self.mutate_entity("undo_entity_update", user_id, guid, |current, expect| {
            if current.version() <= 1 {
                return Err(RepositoryError::InvalidParameter(format!(
                    "entity {} has no earlier version",
                    current.guid()
                )));
            }
            Ok(Mutation::UndoEntityUpdate { expect })
        })
        .await
    }

    /// Soft delete; the entity's relationships are deleted with it
    pub async fn delete_entity(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Entity>> {
        self.mutate_entity("delete_entity", user_id, guid, |_, expect| {
            Ok(Mutation::DeleteEntity { expect })
        })
        .await
    }

    /// Bring a deleted entity back to the status it had before deletion
    pub async fn restore_entity(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<Option<Entity>> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let current = self.stored_entity("restore_entity", guid)?;
        if current.status() != InstanceStatus::Deleted {
            return Err(RepositoryError::InvalidParameter(format!(
                "entity {} is not deleted",
                guid
            )));
        }
        validate::locally_homed(&current.header, "entity", self.metadata_collection_id())?;
        let expect = Expect::new(guid.clone(), current.version(), user_id);
        self.apply("restore_entity", Some(guid), Mutation::RestoreEntity { expect })
            .await
    }

    /// Remove a deleted entity, its history and its relationships for good.
    ///
    /// Always waits for the outcome, whatever the commit mode.
    pub async fn purge_entity(&self, user_id: &str, guid: &Guid) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let current = self.stored_entity("purge_entity", guid)?;
        if current.status() != InstanceStatus::Deleted {
            return Err(RepositoryError::InvalidParameter(format!(
                "entity {} must be deleted before it is purged",
                guid
            )));
        }
        validate::locally_homed(&current.header, "entity", self.metadata_collection_id())?;
        self.apply_and_confirm(
            "purge_entity",
            guid,
            Mutation::PurgeEntity {
                guid: guid.clone(),
                version: current.version(),
            },
        )
        .await
    }

    pub async fn classify_entity(
        &self,
        user_id: &str,
        guid: &Guid,
        classification_name: &str,
        properties: Properties,
    ) -> RepositoryResult<Option<Entity>> {
        validate::text("classification name", classification_name)?;
        let classification_name = classification_name.to_string();
        self.mutate_entity("classify_entity", user_id, guid, move |current, expect| {
            if current.has_classification(&classification_name) {
                return Err(RepositoryError::InvalidParameter(format!(
                    "entity {} is already classified as {}",
                    current.guid(),
                    classification_name
                )));
            }
            let classification = self.new_classification(
                &expect.user,
                current.type_name(),
                &classification_name,
                properties,
                now_micros(),
            )?;
            Ok(Mutation::ClassifyEntity {
                expect,
                classification,
            })
        })
        .await
    }

    pub async fn declassify_entity(
        &self,
        user_id: &str,
        guid: &Guid,
        classification_name: &str,
    ) -> RepositoryResult<Option<Entity>> {
        validate::text("classification name", classification_name)?;
        let name = classification_name.to_string();
        self.mutate_entity("declassify_entity", user_id, guid, move |current, expect| {
            require_classification(current, &name)?;
            Ok(Mutation::DeclassifyEntity { expect, name })
        })
        .await
    }

    /// Replace the properties of one classification
    pub async fn update_entity_classification(
        &self,
        user_id: &str,
        guid: &Guid,
        classification_name: &str,
        properties: Properties,
    ) -> RepositoryResult<Option<Entity>> {
        validate::text("classification name", classification_name)?;
        let name = classification_name.to_string();
        self.mutate_entity("update_entity_classification", user_id, guid, move |current, expect| {
            require_classification(current, &name)?;
            self.registry.validate_properties(&name, &properties, true)?;
            Ok(Mutation::UpdateEntityClassification {
                expect,
                name,
                properties,
            })
        })
        .await
    }

    /// Give an entity a new GUID; relationships follow it
    pub async fn re_identify_entity(
        &self,
        user_id: &str,
        guid: &Guid,
        new_guid: Guid,
    ) -> RepositoryResult<Option<Entity>> {
        validate::guid("new entity guid", &new_guid)?;
        if &new_guid == guid {
            return Err(RepositoryError::InvalidParameter(
                "new guid must differ from the current one".into(),
            ));
        }
        self.mutate_entity("re_identify_entity", user_id, guid, move |_, expect| {
            Ok(Mutation::ReIdentifyEntity { expect, new_guid })
        })
        .await
    }

    /// Change the entity's type; its properties must suit the new type
    pub async fn re_type_entity(
        &self,
        user_id: &str,
        guid: &Guid,
        new_type_guid: &str,
    ) -> RepositoryResult<Option<Entity>> {
        self.mutate_entity("re_type_entity", user_id, guid, |current, expect| {
            let typedef = self
                .registry
                .resolve_category(new_type_guid, TypeCategory::Entity)?;
            self.registry
                .validate_properties(&typedef.name, &current.properties, true)?;
            let new_type = self.registry.instance_type(&typedef.name)?;
            Ok(Mutation::ReTypeEntity { expect, new_type })
        })
        .await
    }

    /// Move the entity's home to another metadata collection
    pub async fn re_home_entity(
        &self,
        user_id: &str,
        guid: &Guid,
        new_collection_id: &str,
        new_collection_name: &str,
    ) -> RepositoryResult<Option<Entity>> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        validate::text("new metadata collection id", new_collection_id)?;
        let current = self.live_entity("re_home_entity", guid)?;
        let provenance =
            self.provenance_for(&current.header.provenance, new_collection_id, new_collection_name);
        let expect = Expect::new(guid.clone(), current.version(), user_id);
        self.apply(
            "re_home_entity",
            Some(guid),
            Mutation::ReHomeEntity { expect, provenance },
        )
        .await
    }

    /// Cache a copy of an entity homed in another collection
    pub async fn save_entity_reference_copy(
        &self,
        user_id: &str,
        entity: Entity,
    ) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", entity.guid())?;
        if entity.proxy {
            return Err(RepositoryError::ProxyOnly(entity.guid().clone()));
        }
        validate::homed_elsewhere(&entity.header, "entity", self.metadata_collection_id())?;
        let typedef = self
            .registry
            .resolve_category(&entity.header.instance_type.type_guid, TypeCategory::Entity)?;
        self.registry
            .validate_properties(&typedef.name, &entity.properties, false)?;
        let guid = entity.guid().clone();
        self.apply::<Entity>(
            "save_entity_reference_copy",
            Some(&guid),
            Mutation::SaveEntityReferenceCopy(entity),
        )
        .await?;
        Ok(())
    }

    /// Drop a cached reference copy; the outcome is not awaited
    pub async fn purge_entity_reference_copy(
        &self,
        user_id: &str,
        guid: &Guid,
    ) -> RepositoryResult<()> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        match self.stored_entity("purge_entity_reference_copy", guid) {
            Ok(current) => validate::homed_elsewhere(
                &current.header,
                "entity",
                self.metadata_collection_id(),
            )?,
            Err(RepositoryError::NotKnown(_)) => return Ok(()),
            Err(e) => return Err(e),
        }
        self.apply_in_background(
            "purge_entity_reference_copy",
            guid,
            Mutation::PurgeEntityReferenceCopy { guid: guid.clone() },
        )
    }

    // === Helpers ===

    /// Read the live entity, check it may be changed here and run the
    /// mutation built from it
    async fn mutate_entity(
        &self,
        operation: &'static str,
        user_id: &str,
        guid: &Guid,
        build: impl FnOnce(&Entity, Expect) -> RepositoryResult<Mutation>,
    ) -> RepositoryResult<Option<Entity>> {
        validate::user_id(user_id)?;
        validate::guid("entity guid", guid)?;
        let current = self.live_entity(operation, guid)?;
        validate::locally_homed(&current.header, "entity", self.metadata_collection_id())?;
        let expect = Expect::new(guid.clone(), current.version(), user_id);
        let mutation = build(&current, expect)?;
        self.apply(operation, Some(guid), mutation).await
    }

    fn new_classification(
        &self,
        user_id: &str,
        entity_type: &str,
        name: &str,
        properties: Properties,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Classification> {
        let typedef = self.registry.validate_classification(name, entity_type)?;
        self.registry.validate_properties(name, &properties, true)?;
        let mut classification = Classification::new(name, typedef.guid.clone(), user_id, at)
            .homed_in(self.metadata_collection_id());
        classification.properties = properties;
        Ok(classification)
    }

    pub(super) fn provenance_for(
        &self,
        current: &InstanceProvenance,
        collection_id: &str,
        collection_name: &str,
    ) -> InstanceProvenance {
        if collection_id == self.metadata_collection_id() {
            return self.local_provenance();
        }
        InstanceProvenance {
            metadata_collection_id: collection_id.to_string(),
            metadata_collection_name: Some(collection_name.to_string()),
            ..current.clone()
        }
    }
}

fn require_classification(entity: &Entity, name: &str) -> RepositoryResult<()> {
    if !entity.has_classification(name) {
        return Err(RepositoryError::InvalidParameter(format!(
            "entity {} is not classified as {}",
            entity.guid(),
            name
        )));
    }
    Ok(())
}

pub(super) fn history_window(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> RepositoryResult<()> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(RepositoryError::InvalidParameter(format!(
                "history window starts at {} after it ends at {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
    }
    Ok(())
}
