//! Typed mutations and their lowering to named function calls

use crate::graph::{
    Classification, Entity, Guid, InstanceProvenance, InstanceStatus, InstanceType, Properties,
    Relationship,
};
use crate::mapping::{entity_key, relationship_key};
use serde::Serialize;
use serde_json::Value;

/// Names of every installed transaction function
pub mod names {
    pub const ADD_ENTITY: &str = "add_entity";
    pub const ADD_ENTITY_PROXY: &str = "add_entity_proxy";
    pub const UPDATE_ENTITY_PROPERTIES: &str = "update_entity_properties";
    pub const UPDATE_ENTITY_STATUS: &str = "update_entity_status";
    pub const UNDO_ENTITY_UPDATE: &str = "undo_entity_update";
    pub const DELETE_ENTITY: &str = "delete_entity";
    pub const RESTORE_ENTITY: &str = "restore_entity";
    pub const PURGE_ENTITY: &str = "purge_entity";
    pub const CLASSIFY_ENTITY: &str = "classify_entity";
    pub const DECLASSIFY_ENTITY: &str = "declassify_entity";
    pub const UPDATE_ENTITY_CLASSIFICATION: &str = "update_entity_classification";
    pub const RE_IDENTIFY_ENTITY: &str = "re_identify_entity";
    pub const RE_TYPE_ENTITY: &str = "re_type_entity";
    pub const RE_HOME_ENTITY: &str = "re_home_entity";
    pub const SAVE_ENTITY_REFERENCE_COPY: &str = "save_entity_reference_copy";
    pub const PURGE_ENTITY_REFERENCE_COPY: &str = "purge_entity_reference_copy";
    pub const ADD_RELATIONSHIP: &str = "add_relationship";
    pub const UPDATE_RELATIONSHIP_PROPERTIES: &str = "update_relationship_properties";
    pub const UPDATE_RELATIONSHIP_STATUS: &str = "update_relationship_status";
    pub const UNDO_RELATIONSHIP_UPDATE: &str = "undo_relationship_update";
    pub const DELETE_RELATIONSHIP: &str = "delete_relationship";
    pub const RESTORE_RELATIONSHIP: &str = "restore_relationship";
    pub const PURGE_RELATIONSHIP: &str = "purge_relationship";
    pub const RE_IDENTIFY_RELATIONSHIP: &str = "re_identify_relationship";
    pub const RE_TYPE_RELATIONSHIP: &str = "re_type_relationship";
    pub const RE_HOME_RELATIONSHIP: &str = "re_home_relationship";
    pub const SAVE_RELATIONSHIP_REFERENCE_COPY: &str = "save_relationship_reference_copy";
    pub const PURGE_RELATIONSHIP_REFERENCE_COPY: &str = "purge_relationship_reference_copy";
}

/// Precondition on an existing object: its guid and the version the caller saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expect {
    pub guid: Guid,
    pub version: u64,
    pub user: String,
}

impl Expect {
    pub fn new(guid: Guid, version: u64, user: impl Into<String>) -> Self {
        Self {
            guid,
            version,
            user: user.into(),
        }
    }
}

/// One logical change to the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddEntity(Entity),
    AddEntityProxy(Entity),
    UpdateEntityProperties { expect: Expect, properties: Properties },
    UpdateEntityStatus { expect: Expect, status: InstanceStatus },
    UndoEntityUpdate { expect: Expect },
    DeleteEntity { expect: Expect },
    RestoreEntity { expect: Expect },
    PurgeEntity { guid: Guid, version: u64 },
    ClassifyEntity { expect: Expect, classification: Classification },
    DeclassifyEntity { expect: Expect, name: String },
    UpdateEntityClassification { expect: Expect, name: String, properties: Properties },
    ReIdentifyEntity { expect: Expect, new_guid: Guid },
    ReTypeEntity { expect: Expect, new_type: InstanceType },
    ReHomeEntity { expect: Expect, provenance: InstanceProvenance },
    SaveEntityReferenceCopy(Entity),
    PurgeEntityReferenceCopy { guid: Guid },
    AddRelationship(Relationship),
    UpdateRelationshipProperties { expect: Expect, properties: Properties },
    UpdateRelationshipStatus { expect: Expect, status: InstanceStatus },
    UndoRelationshipUpdate { expect: Expect },
    DeleteRelationship { expect: Expect },
    RestoreRelationship { expect: Expect },
    PurgeRelationship { guid: Guid, version: u64 },
    ReIdentifyRelationship { expect: Expect, new_guid: Guid },
    ReTypeRelationship { expect: Expect, new_type: InstanceType },
    ReHomeRelationship { expect: Expect, provenance: InstanceProvenance },
    SaveRelationshipReferenceCopy {
        relationship: Relationship,
        end1_proxy: Entity,
        end2_proxy: Entity,
    },
    PurgeRelationshipReferenceCopy { guid: Guid },
}

/// A lowered mutation: function name plus ordinal arguments
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: &'static str,
    pub args: Vec<Value>,
}

fn arg<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value)
}

fn expect_args(expect: &Expect) -> Result<Vec<Value>, serde_json::Error> {
    Ok(vec![arg(&expect.guid)?, arg(&expect.version)?, arg(&expect.user)?])
}

fn with_extra(expect: &Expect, extra: Value) -> Result<Vec<Value>, serde_json::Error> {
    let mut args = expect_args(expect)?;
    args.push(extra);
    Ok(args)
}

impl Mutation {
    pub fn function(&self) -> &'static str {
        use names::*;
        match self {
            Mutation::AddEntity(_) => ADD_ENTITY,
            Mutation::AddEntityProxy(_) => ADD_ENTITY_PROXY,
            Mutation::UpdateEntityProperties { .. } => UPDATE_ENTITY_PROPERTIES,
            Mutation::UpdateEntityStatus { .. } => UPDATE_ENTITY_STATUS,
            Mutation::UndoEntityUpdate { .. } => UNDO_ENTITY_UPDATE,
            Mutation::DeleteEntity { .. } => DELETE_ENTITY,
            Mutation::RestoreEntity { .. } => RESTORE_ENTITY,
            Mutation::PurgeEntity { .. } => PURGE_ENTITY,
            Mutation::ClassifyEntity { .. } => CLASSIFY_ENTITY,
            Mutation::DeclassifyEntity { .. } => DECLASSIFY_ENTITY,
            Mutation::UpdateEntityClassification { .. } => UPDATE_ENTITY_CLASSIFICATION,
            Mutation::ReIdentifyEntity { .. } => RE_IDENTIFY_ENTITY,
            Mutation::ReTypeEntity { .. } => RE_TYPE_ENTITY,
            Mutation::ReHomeEntity { .. } => RE_HOME_ENTITY,
            Mutation::SaveEntityReferenceCopy(_) => SAVE_ENTITY_REFERENCE_COPY,
            Mutation::PurgeEntityReferenceCopy { .. } => PURGE_ENTITY_REFERENCE_COPY,
            Mutation::AddRelationship(_) => ADD_RELATIONSHIP,
            Mutation::UpdateRelationshipProperties { .. } => UPDATE_RELATIONSHIP_PROPERTIES,
            Mutation::UpdateRelationshipStatus { .. } => UPDATE_RELATIONSHIP_STATUS,
            Mutation::UndoRelationshipUpdate { .. } => UNDO_RELATIONSHIP_UPDATE,
            Mutation::DeleteRelationship { .. } => DELETE_RELATIONSHIP,
            Mutation::RestoreRelationship { .. } => RESTORE_RELATIONSHIP,
            Mutation::PurgeRelationship { .. } => PURGE_RELATIONSHIP,
            Mutation::ReIdentifyRelationship { .. } => RE_IDENTIFY_RELATIONSHIP,
            Mutation::ReTypeRelationship { .. } => RE_TYPE_RELATIONSHIP,
            Mutation::ReHomeRelationship { .. } => RE_HOME_RELATIONSHIP,
            Mutation::SaveRelationshipReferenceCopy { .. } => SAVE_RELATIONSHIP_REFERENCE_COPY,
            Mutation::PurgeRelationshipReferenceCopy { .. } => PURGE_RELATIONSHIP_REFERENCE_COPY,
        }
    }

    /// Key of the document to re-read after commit; `None` when the
    /// mutation removes its target
    pub fn result_key(&self) -> Option<String> {
        match self {
            Mutation::PurgeEntity { .. }
            | Mutation::PurgeEntityReferenceCopy { .. }
            | Mutation::PurgeRelationship { .. }
            | Mutation::PurgeRelationshipReferenceCopy { .. } => None,
            Mutation::AddEntity(e)
            | Mutation::AddEntityProxy(e)
            | Mutation::SaveEntityReferenceCopy(e) => Some(entity_key(e.guid())),
            Mutation::ReIdentifyEntity { new_guid, .. } => Some(entity_key(new_guid)),
            Mutation::UpdateEntityProperties { expect, .. }
            | Mutation::UpdateEntityStatus { expect, .. }
            | Mutation::UndoEntityUpdate { expect }
            | Mutation::DeleteEntity { expect }
            | Mutation::RestoreEntity { expect }
            | Mutation::ClassifyEntity { expect, .. }
            | Mutation::DeclassifyEntity { expect, .. }
            | Mutation::UpdateEntityClassification { expect, .. }
            | Mutation::ReTypeEntity { expect, .. }
            | Mutation::ReHomeEntity { expect, .. } => Some(entity_key(&expect.guid)),
            Mutation::AddRelationship(r) => Some(relationship_key(r.guid())),
            Mutation::SaveRelationshipReferenceCopy { relationship, .. } => {
                Some(relationship_key(relationship.guid()))
            }
            Mutation::ReIdentifyRelationship { new_guid, .. } => Some(relationship_key(new_guid)),
            Mutation::UpdateRelationshipProperties { expect, .. }
            | Mutation::UpdateRelationshipStatus { expect, .. }
            | Mutation::UndoRelationshipUpdate { expect }
            | Mutation::DeleteRelationship { expect }
            | Mutation::RestoreRelationship { expect }
            | Mutation::ReTypeRelationship { expect, .. }
            | Mutation::ReHomeRelationship { expect, .. } => Some(relationship_key(&expect.guid)),
        }
    }

    /// Lower to the function name and ordinal arguments submitted to the store
    ///
    /// Every call on an existing object starts with `[guid, version, user]`.
    pub fn lower(&self) -> Result<FunctionCall, serde_json::Error> {
        let args = match self {
            Mutation::AddEntity(entity)
            | Mutation::AddEntityProxy(entity)
            | Mutation::SaveEntityReferenceCopy(entity) => vec![arg(entity)?],
            Mutation::AddRelationship(relationship) => vec![arg(relationship)?],
            Mutation::UpdateEntityProperties { expect, properties }
            | Mutation::UpdateRelationshipProperties { expect, properties } => {
                with_extra(expect, arg(properties)?)?
            }
            Mutation::UpdateEntityStatus { expect, status }
            | Mutation::UpdateRelationshipStatus { expect, status } => {
                with_extra(expect, arg(status)?)?
            }
            Mutation::UndoEntityUpdate { expect }
            | Mutation::DeleteEntity { expect }
            | Mutation::RestoreEntity { expect }
            | Mutation::UndoRelationshipUpdate { expect }
            | Mutation::DeleteRelationship { expect }
            | Mutation::RestoreRelationship { expect } => expect_args(expect)?,
            Mutation::PurgeEntity { guid, version } | Mutation::PurgeRelationship { guid, version } => {
                vec![arg(guid)?, arg(version)?]
            }
            Mutation::ClassifyEntity {
                expect,
                classification,
            } => with_extra(expect, arg(classification)?)?,
            Mutation::DeclassifyEntity { expect, name } => with_extra(expect, arg(name)?)?,
            Mutation::UpdateEntityClassification {
                expect,
                name,
                properties,
            } => {
                let mut args = with_extra(expect, arg(name)?)?;
                args.push(arg(properties)?);
                args
            }
            Mutation::ReIdentifyEntity { expect, new_guid }
            | Mutation::ReIdentifyRelationship { expect, new_guid } => {
                with_extra(expect, arg(new_guid)?)?
            }
            Mutation::ReTypeEntity { expect, new_type }
            | Mutation::ReTypeRelationship { expect, new_type } => {
                with_extra(expect, arg(new_type)?)?
            }
            Mutation::ReHomeEntity { expect, provenance }
            | Mutation::ReHomeRelationship { expect, provenance } => {
                with_extra(expect, arg(provenance)?)?
            }
            Mutation::PurgeEntityReferenceCopy { guid }
            | Mutation::PurgeRelationshipReferenceCopy { guid } => vec![arg(guid)?],
            Mutation::SaveRelationshipReferenceCopy {
                relationship,
                end1_proxy,
                end2_proxy,
            } => vec![arg(relationship)?, arg(end1_proxy)?, arg(end2_proxy)?],
        };
        Ok(FunctionCall {
            function: self.function(),
            args,
        })
    }
}
