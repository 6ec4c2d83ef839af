//! Transaction functions shared by entities and relationships
//!
//! Each function is generic over the stored kind; the kind's `Versioned`
//! hooks add the cascades that only entities need.

use super::args::Args;
use crate::graph::{Guid, InstanceProvenance, InstanceStatus, InstanceType, Properties};
use crate::mapping::MappedInstance;
use crate::storage::{TransactionFunction, TxAbort, TxContext};
use serde_json::Value;
use std::marker::PhantomData;

/// A graph object mutated through transaction functions
pub trait Versioned: MappedInstance + 'static {
    fn properties_mut(&mut self) -> &mut Properties;

    fn is_proxy(&self) -> bool {
        false
    }

    /// Runs after the instance itself has been soft-deleted
    fn on_delete(_ctx: &mut dyn TxContext, _instance: &Self, _user: &str) -> Result<(), TxAbort> {
        Ok(())
    }

    /// Runs after every version of the instance has been evicted
    fn on_purge(_ctx: &mut dyn TxContext, _guid: &Guid) -> Result<(), TxAbort> {
        Ok(())
    }

    /// Runs after the instance has moved from `old` to `new`
    fn on_re_identify(
        _ctx: &mut dyn TxContext,
        _old: &Guid,
        _new: &Guid,
        _user: &str,
    ) -> Result<(), TxAbort> {
        Ok(())
    }

    /// Runs before a reference copy is stored; receives the full argument list
    fn on_reference_copy(
        _ctx: &mut dyn TxContext,
        _copy: &Self,
        _args: &Args<'_>,
    ) -> Result<(), TxAbort> {
        Ok(())
    }
}

// === Helpers ===

pub(super) fn load<T: MappedInstance>(
    ctx: &dyn TxContext,
    guid: &Guid,
) -> Result<Option<T>, TxAbort> {
    match ctx.get(&T::key_for(guid))? {
        Some(stored) => Ok(Some(T::from_document(&stored.document)?)),
        None => Ok(None),
    }
}

pub(super) fn require<T: MappedInstance>(ctx: &dyn TxContext, guid: &Guid) -> Result<T, TxAbort> {
    load(ctx, guid)?.ok_or_else(|| TxAbort::NotKnown(format!("{} {}", T::NOUN, guid)))
}

pub(super) fn save<T: MappedInstance>(ctx: &mut dyn TxContext, instance: &T) -> Result<(), TxAbort> {
    ctx.put(instance.to_document()?)?;
    Ok(())
}

pub(super) fn check_version<T: MappedInstance>(instance: &T, expected: u64) -> Result<(), TxAbort> {
    let current = instance.header().version;
    if current != expected {
        return Err(TxAbort::Conflict(format!(
            "{} {} is at version {}, expected {}",
            T::NOUN,
            instance.header().guid,
            current,
            expected
        )));
    }
    Ok(())
}

/// Fail with `NotKnown` for soft-deleted instances
pub(super) fn ensure_live<T: MappedInstance>(instance: &T) -> Result<(), TxAbort> {
    if instance.header().status == InstanceStatus::Deleted {
        return Err(TxAbort::NotKnown(format!(
            "{} {} is deleted",
            T::NOUN,
            instance.header().guid
        )));
    }
    Ok(())
}

/// Decode the `[guid, version, user]` prefix, load the instance and check its version
pub(super) fn load_expected<T: MappedInstance>(
    ctx: &dyn TxContext,
    args: &Args<'_>,
) -> Result<(T, String), TxAbort> {
    let guid: Guid = args.get(0, "guid")?;
    let version: u64 = args.get(1, "expected_version")?;
    let user: String = args.get(2, "user")?;
    let instance: T = require(ctx, &guid)?;
    check_version(&instance, version)?;
    Ok((instance, user))
}

/// Stamp a new version and store it
pub(super) fn advance_and_save<T: MappedInstance>(
    ctx: &mut dyn TxContext,
    instance: &mut T,
    user: &str,
) -> Result<(), TxAbort> {
    let at = ctx.tx_time();
    instance.header_mut().advance(user, at);
    save(ctx, instance)
}

/// Soft-delete without running kind hooks
pub(super) fn mark_deleted<T: MappedInstance>(
    ctx: &mut dyn TxContext,
    instance: &mut T,
    user: &str,
) -> Result<(), TxAbort> {
    let header = instance.header_mut();
    header.status_on_delete = Some(header.status);
    header.status = InstanceStatus::Deleted;
    advance_and_save(ctx, instance, user)
}

// === Functions ===

macro_rules! generic_function {
    ($(#[$doc:meta])* $name:ident, $pattern:literal) => {
        $(#[$doc])*
        pub struct $name<T> {
            name: String,
            _kind: PhantomData<fn() -> T>,
        }

        impl<T: Versioned> $name<T> {
            pub fn new() -> Self {
                Self {
                    name: $pattern.replace("{}", T::NOUN),
                    _kind: PhantomData,
                }
            }
        }

        impl<T: Versioned> Default for $name<T> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

generic_function!(
    /// Replace the whole property bag
    UpdateProperties,
    "update_{}_properties"
);
generic_function!(UpdateStatus, "update_{}_status");
generic_function!(
    /// Promote the previous version's content to a new version
    UndoUpdate,
    "undo_{}_update"
);
generic_function!(Delete, "delete_{}");
generic_function!(Restore, "restore_{}");
generic_function!(
    /// Evict every version of a deleted instance
    Purge,
    "purge_{}"
);
generic_function!(ReIdentify, "re_identify_{}");
generic_function!(ReType, "re_type_{}");
generic_function!(ReHome, "re_home_{}");
generic_function!(
    /// Store a copy homed in another collection unless a newer one is held
    SaveReferenceCopy,
    "save_{}_reference_copy"
);
generic_function!(PurgeReferenceCopy, "purge_{}_reference_copy");

impl<T: Versioned> TransactionFunction for UpdateProperties<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, properties)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        let properties: Properties = args.get(3, "properties")?;
        ensure_live(&instance)?;
        if instance.is_proxy() {
            return Err(TxAbort::Invalid(format!(
                "{} {} is a proxy and holds no properties",
                T::NOUN,
                instance.header().guid
            )));
        }
        *instance.properties_mut() = properties;
        advance_and_save(ctx, &mut instance, &user)
    }
}

impl<T: Versioned> TransactionFunction for UpdateStatus<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, status)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        let status: InstanceStatus = args.get(3, "status")?;
        ensure_live(&instance)?;
        if status == InstanceStatus::Deleted {
            return Err(TxAbort::Invalid(format!(
                "use delete_{} to delete an instance",
                T::NOUN
            )));
        }
        instance.header_mut().status = status;
        advance_and_save(ctx, &mut instance, &user)
    }
}

impl<T: Versioned> TransactionFunction for UndoUpdate<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (current, user): (T, String) = load_expected(ctx, &args)?;
        let history = ctx.history(&current.key())?;
        let previous = match history.len() {
            n if n >= 2 => T::from_document(&history[n - 2].document)?,
            _ => {
                return Err(TxAbort::Invalid(format!(
                    "{} {} has no earlier version",
                    T::NOUN,
                    current.header().guid
                )))
            }
        };

        let mut restored = previous;
        let header = restored.header_mut();
        header.version = current.header().version;
        advance_and_save(ctx, &mut restored, &user)
    }
}

impl<T: Versioned> TransactionFunction for Delete<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        if instance.header().status == InstanceStatus::Deleted {
            return Err(TxAbort::Invalid(format!(
                "{} {} is already deleted",
                T::NOUN,
                instance.header().guid
            )));
        }
        mark_deleted(ctx, &mut instance, &user)?;
        T::on_delete(ctx, &instance, &user)
    }
}

impl<T: Versioned> TransactionFunction for Restore<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        let header = instance.header_mut();
        if header.status != InstanceStatus::Deleted {
            return Err(TxAbort::Invalid(format!(
                "{} {} is not deleted",
                T::NOUN,
                header.guid
            )));
        }
        if let Some(moved_to) = &header.re_identified_to {
            return Err(TxAbort::Invalid(format!(
                "{} {} was re-identified as {}",
                T::NOUN,
                header.guid,
                moved_to
            )));
        }
        header.status = header.status_on_delete.take().unwrap_or(InstanceStatus::Active);
        advance_and_save(ctx, &mut instance, &user)
    }
}

impl<T: Versioned> TransactionFunction for Purge<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let guid: Guid = args.get(0, "guid")?;
        let version: u64 = args.get(1, "expected_version")?;
        let instance: T = require(ctx, &guid)?;
        check_version(&instance, version)?;
        if instance.header().status != InstanceStatus::Deleted {
            return Err(TxAbort::Invalid(format!(
                "{} {} must be deleted before it is purged",
                T::NOUN,
                guid
            )));
        }
        ctx.evict(&instance.key())?;
        T::on_purge(ctx, &guid)
    }
}

impl<T: Versioned> TransactionFunction for ReIdentify<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, new_guid)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        let new_guid: Guid = args.get(3, "new_guid")?;
        ensure_live(&instance)?;
        if ctx.get(&T::key_for(&new_guid))?.is_some() {
            return Err(TxAbort::Conflict(format!(
                "{} {} already exists",
                T::NOUN,
                new_guid
            )));
        }

        let old_guid = instance.header().guid.clone();

        // The old GUID keeps its history and ends in a deleted version
        let mut tombstone = instance.clone();
        tombstone.header_mut().re_identified_to = Some(new_guid.clone());
        mark_deleted(ctx, &mut tombstone, &user)?;

        let header = instance.header_mut();
        header.guid = new_guid.clone();
        header.re_identified_from = Some(old_guid.clone());
        advance_and_save(ctx, &mut instance, &user)?;
        T::on_re_identify(ctx, &old_guid, &new_guid, &user)
    }
}

impl<T: Versioned> TransactionFunction for ReType<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, new_type)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        let new_type: InstanceType = args.get(3, "new_type")?;
        ensure_live(&instance)?;
        let header = instance.header_mut();
        if header.instance_type.category != new_type.category {
            return Err(TxAbort::Invalid(format!(
                "cannot re-type a {} as a {} type",
                header.instance_type.category, new_type.category
            )));
        }
        header.instance_type = new_type;
        advance_and_save(ctx, &mut instance, &user)
    }
}

impl<T: Versioned> TransactionFunction for ReHome<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid, expected_version, user, provenance)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let (mut instance, user): (T, String) = load_expected(ctx, &args)?;
        let provenance: InstanceProvenance = args.get(3, "provenance")?;
        ensure_live(&instance)?;
        instance.header_mut().provenance = provenance;
        advance_and_save(ctx, &mut instance, &user)
    }
}

impl<T: Versioned> TransactionFunction for SaveReferenceCopy<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(copy, ...)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let copy: T = args.get(0, "copy")?;
        if let Some(existing) = load::<T>(ctx, &copy.header().guid)? {
            let home = &copy.header().provenance.metadata_collection_id;
            if !existing.is_proxy() && !existing.header().is_homed_in(home) {
                return Err(TxAbort::Invalid(format!(
                    "{} {} is homed in {}, not in {}",
                    T::NOUN,
                    copy.header().guid,
                    existing.header().provenance.metadata_collection_id,
                    home
                )));
            }
            if existing.header().version >= copy.header().version && !existing.is_proxy() {
                return Ok(());
            }
        }
        T::on_reference_copy(ctx, &copy, &args)?;
        save(ctx, &copy)
    }
}

impl<T: Versioned> TransactionFunction for PurgeReferenceCopy<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> String {
        format!("{}(guid)", self.name)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(&self.name, args);
        let guid: Guid = args.get(0, "guid")?;
        if ctx.evict(&T::key_for(&guid))? == 0 {
            return Ok(());
        }
        T::on_purge(ctx, &guid)
    }
}
