//! Relationship-only transaction functions

use super::args::Args;
use super::instance_functions::{load, save, Versioned};
use super::mutation::names;
use crate::graph::{Entity, InstanceStatus, Properties, Relationship};
use crate::storage::{TransactionFunction, TxAbort, TxContext};
use serde_json::Value;

impl Versioned for Relationship {
    fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Store proxies for ends the collection does not hold yet
    fn on_reference_copy(
        ctx: &mut dyn TxContext,
        copy: &Self,
        args: &Args<'_>,
    ) -> Result<(), TxAbort> {
        for (index, end) in [(1, &copy.end1), (2, &copy.end2)] {
            if load::<Entity>(ctx, &end.guid)?.is_some() {
                continue;
            }
            let proxy: Entity = args.get(index, "end proxy")?;
            if proxy.guid() != &end.guid {
                return Err(TxAbort::Invalid(format!(
                    "proxy {} does not match relationship end {}",
                    proxy.guid(),
                    end.guid
                )));
            }
            save(ctx, &proxy.to_proxy())?;
        }
        Ok(())
    }
}

/// Store a brand new relationship between two held entities
pub struct AddRelationship;

impl TransactionFunction for AddRelationship {
    fn name(&self) -> &str {
        names::ADD_RELATIONSHIP
    }

    fn definition(&self) -> String {
        format!("{}(relationship)", names::ADD_RELATIONSHIP)
    }

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort> {
        let args = Args::new(names::ADD_RELATIONSHIP, args);
        let mut relationship: Relationship = args.get(0, "relationship")?;
        if load::<Relationship>(ctx, relationship.guid())?.is_some() {
            return Err(TxAbort::Conflict(format!(
                "relationship {} already exists",
                relationship.guid()
            )));
        }

        for end in [&relationship.end1, &relationship.end2] {
            match load::<Entity>(ctx, &end.guid)? {
                Some(entity) if entity.status() != InstanceStatus::Deleted => {}
                Some(_) => {
                    return Err(TxAbort::NotKnown(format!("entity {} is deleted", end.guid)))
                }
                None => return Err(TxAbort::NotKnown(format!("entity {}", end.guid))),
            }
        }

        let at = ctx.tx_time();
        relationship.header.version = 1;
        relationship.header.create_time = at;
        relationship.header.update_time = at;
        save(ctx, &relationship)
    }
}
