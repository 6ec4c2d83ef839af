//! Parameter checks run before any store call

use super::error::{RepositoryError, RepositoryResult};
use crate::graph::{Entity, Guid, InstanceHeader, InstanceStatus};

pub(super) fn user_id(user_id: &str) -> RepositoryResult<()> {
    if user_id.trim().is_empty() {
        return Err(RepositoryError::InvalidParameter(
            "user id must not be empty".into(),
        ));
    }
    Ok(())
}

pub(super) fn guid(name: &str, guid: &Guid) -> RepositoryResult<()> {
    if guid.as_str().trim().is_empty() {
        return Err(RepositoryError::InvalidParameter(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

pub(super) fn text(name: &str, value: &str) -> RepositoryResult<()> {
    if value.trim().is_empty() {
        return Err(RepositoryError::InvalidParameter(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

/// New instances start as draft or active
pub(super) fn initial_status(status: InstanceStatus) -> RepositoryResult<()> {
    if status == InstanceStatus::Deleted {
        return Err(RepositoryError::InvalidParameter(
            "instances cannot be created in the deleted state".into(),
        ));
    }
    Ok(())
}

/// Status changes go through delete and restore, not a status update
pub(super) fn status_update(status: InstanceStatus) -> RepositoryResult<()> {
    if status == InstanceStatus::Deleted {
        return Err(RepositoryError::InvalidParameter(
            "use delete to move an instance to the deleted state".into(),
        ));
    }
    Ok(())
}

/// Reference copies belong to another collection and are read-only here
pub(super) fn locally_homed(
    header: &InstanceHeader,
    noun: &str,
    collection_id: &str,
) -> RepositoryResult<()> {
    if !header.is_homed_in(collection_id) {
        return Err(RepositoryError::InvalidParameter(format!(
            "{} {} is a reference copy homed in {} and cannot be changed locally",
            noun, header.guid, header.provenance.metadata_collection_id
        )));
    }
    Ok(())
}

/// Reference copies must come from some other collection
pub(super) fn homed_elsewhere(
    header: &InstanceHeader,
    noun: &str,
    collection_id: &str,
) -> RepositoryResult<()> {
    if header.is_homed_in(collection_id) {
        return Err(RepositoryError::InvalidParameter(format!(
            "{} {} is homed in this collection and cannot be saved as a reference copy",
            noun, header.guid
        )));
    }
    Ok(())
}

/// Full detail is only available for live, non-proxy entities
pub(super) fn full_entity(entity: Entity) -> RepositoryResult<Entity> {
    if entity.status() == InstanceStatus::Deleted {
        return Err(RepositoryError::NotKnown(format!(
            "entity {} (deleted)",
            entity.guid()
        )));
    }
    if entity.proxy {
        return Err(RepositoryError::ProxyOnly(entity.guid().clone()));
    }
    Ok(entity)
}
