//! Entity-only transaction functions and entity cascades

use super::args::Args;
use super::instance_functions::{
    advance_and_save, ensure_live, load, load_expected, mark_deleted, save, Versioned,
};
use super::mutation::names;
use crate::graph::{
    Classification, Entity, Guid, InstanceStatus, Properties, Relationship,
};
use crate::mapping::MappedInstance;
use crate::storage::{TransactionFunction, TxAbort, TxContext};
use serde_json::Value;

/// Relationships currently attached to `guid`
fn attached_relationships(
    ctx: &dyn TxContext,
    guid: &Guid,
) -> Result<Vec<Relationship>, TxAbort> {
    ctx.referencing(guid.as_str())?
        .iter()
        .map(|stored| Relationship::from_document(&stored.document).map_err(TxAbort::from))
        .collect()
}

impl Versioned for Entity {
    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    fn is_proxy(&self) -> bool {
        self.proxy
    }

    /// Soft-delete every live relationship of the entity
    fn on_delete(ctx: &mut dyn TxContext, entity: &Self, user: &str) -> Result<(), TxAbort> {
        for mut relationship in attached_relationships(ctx, entity.guid())? {
            if relationship.header.status != InstanceStatus::Deleted {
                mark_deleted(ctx, &mut relationship, user)?;
            }
        }
        Ok(())
    }

    /// Evict every relationship of the entity
    fn on_purge(ctx: &mut dyn TxContext, guid: &Guid) -> Result<(), TxAbort> {
        for relationship in attached_relationships(ctx, guid)? {
            ctx.evict(&relationship.key())?;
        }
        Ok(())
    }

    /// Point relationship ends at the new GUID
    fn on_re_identify(
        ctx: &mut dyn TxContext,
        old: &Guid,
        new: &Guid,
        user: &str,
    ) -> Result<(), TxAbort> {
        for mut relationship in attached_relationships(ctx, old)? {
            if relationship.header.re_identified_to.is_some() {
                continue;
            }
            for end in [&mut relationship.end1, &mut relationship.end2] {
                if &end.guid == old {
                    end.guid = new.clone();
                }
            }
            advance_and_save(ctx, &mut relationship, user)?;
        }
        Ok(())
    }
}

fn stamp_creation(entity: &mut Entity, ctx: &dyn TxContext) {
    let at = ctx.tx_time();
    entity.header.create_time = at;
    entity.header.update_time = at;
}

/// Store a brand new entity
pub struct AddEntity;

impl TransactionFunction for AddEntity {
    fn name(&self) -> &str {
        names::ADD_ENTITY
    }

    fn definition(&self) -> String {
        format!("{}(entity)", names::ADD_ENTITY)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(names::ADD_ENTITY, args);
        let mut entity: Entity = args.get(0, "entity")?;
        if load::<Entity>(ctx, entity.guid())?.is_some() {
            return Err(TxAbort::Conflict(format!("entity {} already exists", entity.guid())));
        }
        entity.header.version = 1;
        stamp_creation(&mut entity, ctx);
        save(ctx, &entity)
    }
}

/// Store a proxy stub unless the entity is already held
pub struct AddEntityProxy;

impl TransactionFunction for AddEntityProxy {
    fn name(&self) -> &str {
        names::ADD_ENTITY_PROXY
    }

    fn definition(&self) -> String {
        format!("{}(proxy)", names::ADD_ENTITY_PROXY)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(names::ADD_ENTITY_PROXY, args);
        let proxy: Entity = args.get(0, "proxy")?;
        if load::<Entity>(ctx, proxy.guid())?.is_some() {
            return Ok(());
        }
        let mut proxy = proxy.to_proxy();
        stamp_creation(&mut proxy, ctx);
        save(ctx, &proxy)
    }
}

/// Attach a new classification
pub struct ClassifyEntity;

impl TransactionFunction for ClassifyEntity {
    fn name(&self) -> &str {
        names::CLASSIFY_ENTITY
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, classification)", names::CLASSIFY_ENTITY)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(names::CLASSIFY_ENTITY, args);
        let (mut entity, user): (Entity, String) = load_expected(ctx, &args)?;
        let mut classification: Classification = args.get(3, "classification")?;
        ensure_live(&entity)?;
        if entity.has_classification(&classification.name) {
            return Err(TxAbort::Invalid(format!(
                "entity {} is already classified as {}",
                entity.guid(),
                classification.name
            )));
        }
        let at = ctx.tx_time();
        classification.create_time = at;
        classification.update_time = at;
        entity.classifications.push(classification);
        advance_and_save(ctx, &mut entity, &user)
    }
}

/// Remove a classification
pub struct DeclassifyEntity;

impl TransactionFunction for DeclassifyEntity {
    fn name(&self) -> &str {
        names::DECLASSIFY_ENTITY
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, name)", names::DECLASSIFY_ENTITY)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(names::DECLASSIFY_ENTITY, args);
        let (mut entity, user): (Entity, String) = load_expected(ctx, &args)?;
        let name: String = args.get(3, "name")?;
        ensure_live(&entity)?;
        let before = entity.classifications.len();
        entity.classifications.retain(|c| c.name != name);
        if entity.classifications.len() == before {
            return Err(TxAbort::Invalid(format!(
                "entity {} is not classified as {}",
                entity.guid(),
                name
            )));
        }
        advance_and_save(ctx, &mut entity, &user)
    }
}

/// Replace the properties of an attached classification
pub struct UpdateEntityClassification;

impl TransactionFunction for UpdateEntityClassification {
    fn name(&self) -> &str {
        names::UPDATE_ENTITY_CLASSIFICATION
    }

    fn definition(&self) -> String {
        format!(
            "{}(guid, expected_version, user, name, properties)",
            names::UPDATE_ENTITY_CLASSIFICATION
        )
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(names::UPDATE_ENTITY_CLASSIFICATION, args);
        let (mut entity, user): (Entity, String) = load_expected(ctx, &args)?;
        let name: String = args.get(3, "name")?;
        let properties: Properties = args.get(4, "properties")?;
        ensure_live(&entity)?;

        let at = ctx.tx_time();
        let guid = entity.guid().clone();
        let classification = entity
            .classifications
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                TxAbort::Invalid(format!("entity {} is not classified as {}", guid, name))
            })?;
        classification.properties = properties;
        classification.version += 1;
        classification.updated_by = Some(user.clone());
        classification.update_time = at;
        advance_and_save(ctx, &mut entity, &user)
    }
}
