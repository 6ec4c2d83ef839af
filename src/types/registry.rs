//! TypeRegistry: process-local cache of type definitions
//!
//! Readers take an `Arc` of the current immutable catalog and never block
//! writers for longer than a pointer swap. `register` and `remove` build a
//! new catalog and publish it atomically.

use super::typedef::{AttributeDef, TypeDef, TypeDefError};
use crate::graph::{InstanceType, Properties, TypeCategory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Immutable view of all registered types
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    by_guid: HashMap<String, Arc<TypeDef>>,
    guid_by_name: HashMap<String, String>,
}

impl Catalog {
    pub fn by_guid(&self, guid: &str) -> Option<&Arc<TypeDef>> {
        self.by_guid.get(guid)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.guid_by_name.get(name).and_then(|g| self.by_guid.get(g))
    }

    /// Super-type names of `name`, nearest first
    pub fn super_chain(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.by_name(name).and_then(|t| t.super_type.clone());
        while let Some(parent) = current {
            // A cycle cannot be registered, but stop rather than loop forever
            if chain.contains(&parent) {
                break;
            }
            current = self.by_name(&parent).and_then(|t| t.super_type.clone());
            chain.push(parent);
        }
        chain
    }

    pub fn is_type_of(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor || self.super_chain(name).iter().any(|s| s == ancestor)
    }
}

/// Shared, concurrently readable registry of type definitions
#[derive(Debug, Default)]
pub struct TypeRegistry {
    catalog: RwLock<Arc<Catalog>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current catalog; stays consistent even if the registry changes afterwards
    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a type definition.
    ///
    /// Returns `Ok(true)` when the definition was added and `Ok(false)` when
    /// an identical definition was already present. A definition that reuses
    /// a GUID or name with a different shape fails with `Conflict`.
    pub fn register(&self, typedef: TypeDef) -> Result<bool, TypeDefError> {
        if typedef.guid.trim().is_empty() || typedef.name.trim().is_empty() {
            return Err(TypeDefError::Malformed(format!(
                "guid '{}' and name '{}' must both be non-empty",
                typedef.guid, typedef.name
            )));
        }

        let mut guard = self.catalog.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = guard.by_guid(&typedef.guid) {
            if **existing == typedef {
                debug!(type_name = %typedef.name, "type already registered");
                return Ok(false);
            }
            return Err(TypeDefError::Conflict {
                name: typedef.name.clone(),
                reason: format!("guid {} is registered with a different definition", typedef.guid),
            });
        }
        if let Some(existing) = guard.by_name(&typedef.name) {
            return Err(TypeDefError::Conflict {
                name: typedef.name.clone(),
                reason: format!("name is already registered under guid {}", existing.guid),
            });
        }

        if let Some(ref parent) = typedef.super_type {
            let parent_def = guard
                .by_name(parent)
                .ok_or_else(|| TypeDefError::Unknown(parent.clone()))?;
            if parent_def.category != typedef.category {
                return Err(TypeDefError::WrongCategory {
                    type_name: parent.clone(),
                    expected: typedef.category,
                    actual: parent_def.category,
                });
            }
        }

        let mut next = Catalog::clone(&guard);
        next.guid_by_name
            .insert(typedef.name.clone(), typedef.guid.clone());
        info!(type_name = %typedef.name, guid = %typedef.guid, "registered type");
        next.by_guid.insert(typedef.guid.clone(), Arc::new(typedef));
        *guard = Arc::new(next);
        Ok(true)
    }

    /// Remove a type definition by GUID
    pub fn remove(&self, guid: &str) -> Result<Arc<TypeDef>, TypeDefError> {
        let mut guard = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
        let removed = guard
            .by_guid(guid)
            .cloned()
            .ok_or_else(|| TypeDefError::Unknown(guid.to_string()))?;

        if let Some(child) = guard
            .by_guid
            .values()
            .find(|t| t.super_type.as_deref() == Some(removed.name.as_str()))
        {
            return Err(TypeDefError::Conflict {
                name: removed.name.clone(),
                reason: format!("'{}' still names it as super-type", child.name),
            });
        }

        let mut next = Catalog::clone(&guard);
        next.by_guid.remove(guid);
        next.guid_by_name.remove(&removed.name);
        *guard = Arc::new(next);
        info!(type_name = %removed.name, "removed type");
        Ok(removed)
    }

    pub fn lookup_by_guid(&self, guid: &str) -> Option<Arc<TypeDef>> {
        self.catalog().by_guid(guid).cloned()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.catalog().by_name(name).cloned()
    }

    /// Look up by GUID, failing with `Unknown`
    pub fn resolve_guid(&self, guid: &str) -> Result<Arc<TypeDef>, TypeDefError> {
        self.lookup_by_guid(guid)
            .ok_or_else(|| TypeDefError::Unknown(guid.to_string()))
    }

    /// Look up by name, failing with `Unknown`
    pub fn resolve_name(&self, name: &str) -> Result<Arc<TypeDef>, TypeDefError> {
        self.lookup_by_name(name)
            .ok_or_else(|| TypeDefError::Unknown(name.to_string()))
    }

    /// Look up by GUID and check the category
    pub fn resolve_category(
        &self,
        guid: &str,
        category: TypeCategory,
    ) -> Result<Arc<TypeDef>, TypeDefError> {
        let typedef = self.resolve_guid(guid)?;
        if typedef.category != category {
            return Err(TypeDefError::WrongCategory {
                type_name: typedef.name.clone(),
                expected: category,
                actual: typedef.category,
            });
        }
        Ok(typedef)
    }

    /// All registered definitions, sorted by name
    pub fn type_defs(&self) -> Vec<Arc<TypeDef>> {
        let catalog = self.catalog();
        let mut defs: Vec<_> = catalog.by_guid.values().cloned().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.catalog().by_guid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Instance type stamp for new instances of `name`
    pub fn instance_type(&self, name: &str) -> Result<InstanceType, TypeDefError> {
        let catalog = self.catalog();
        let typedef = catalog
            .by_name(name)
            .ok_or_else(|| TypeDefError::Unknown(name.to_string()))?;
        Ok(InstanceType {
            type_guid: typedef.guid.clone(),
            type_name: typedef.name.clone(),
            category: typedef.category,
            super_types: catalog.super_chain(name),
        })
    }

    pub fn is_type_of(&self, name: &str, ancestor: &str) -> bool {
        self.catalog().is_type_of(name, ancestor)
    }

    /// Names of `name` and every type that inherits from it
    pub fn subtype_names(&self, name: &str) -> Vec<String> {
        let catalog = self.catalog();
        let mut names: Vec<String> = catalog
            .guid_by_name
            .keys()
            .filter(|candidate| catalog.is_type_of(candidate, name))
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Own and inherited attributes; own attributes shadow inherited ones
    pub fn all_attributes(&self, name: &str) -> Vec<AttributeDef> {
        let catalog = self.catalog();
        let mut lineage = vec![name.to_string()];
        lineage.extend(catalog.super_chain(name));

        let mut attributes: Vec<AttributeDef> = Vec::new();
        for type_name in lineage {
            if let Some(typedef) = catalog.by_name(&type_name) {
                for attribute in &typedef.attributes {
                    if !attributes.iter().any(|a| a.name == attribute.name) {
                        attributes.push(attribute.clone());
                    }
                }
            }
        }
        attributes
    }

    /// Names of string attributes, the targets of free-text search
    pub fn string_attributes(&self, name: &str) -> Vec<String> {
        self.all_attributes(name)
            .into_iter()
            .filter(|a| a.kind.is_textual())
            .map(|a| a.name)
            .collect()
    }

    /// Check a property bag against the declared attributes of `name`.
    ///
    /// When `complete` is set the bag replaces all properties, so required
    /// attributes must be present.
    pub fn validate_properties(
        &self,
        name: &str,
        properties: &Properties,
        complete: bool,
    ) -> Result<(), TypeDefError> {
        if self.lookup_by_name(name).is_none() {
            return Err(TypeDefError::Unknown(name.to_string()));
        }
        let attributes = self.all_attributes(name);

        for (property, value) in properties {
            let attribute = attributes.iter().find(|a| &a.name == property).ok_or_else(|| {
                TypeDefError::UndeclaredProperty {
                    type_name: name.to_string(),
                    property: property.clone(),
                }
            })?;
            if !attribute.kind.accepts(value) {
                return Err(TypeDefError::WrongPropertyKind {
                    type_name: name.to_string(),
                    property: property.clone(),
                    expected: attribute.kind,
                    actual: value.kind_name(),
                });
            }
        }

        if complete {
            if let Some(missing) = attributes
                .iter()
                .find(|a| a.required && !properties.contains_key(&a.name))
            {
                return Err(TypeDefError::MissingProperty {
                    type_name: name.to_string(),
                    property: missing.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check that classification `name` may be attached to `entity_type`
    pub fn validate_classification(
        &self,
        name: &str,
        entity_type: &str,
    ) -> Result<Arc<TypeDef>, TypeDefError> {
        let typedef = self.resolve_name(name)?;
        if typedef.category != TypeCategory::Classification {
            return Err(TypeDefError::WrongCategory {
                type_name: name.to_string(),
                expected: TypeCategory::Classification,
                actual: typedef.category,
            });
        }
        let catalog = self.catalog();
        let allowed = typedef.valid_entity_types.is_empty()
            || typedef
                .valid_entity_types
                .iter()
                .any(|t| catalog.is_type_of(entity_type, t));
        if !allowed {
            return Err(TypeDefError::NotValid {
                type_name: name.to_string(),
                reason: format!("cannot classify entities of type '{}'", entity_type),
            });
        }
        Ok(typedef)
    }

    /// Check that entities of the given types may sit at the ends of `rel_type`
    pub fn validate_relationship_ends(
        &self,
        rel_type: &str,
        end1_type: &str,
        end2_type: &str,
    ) -> Result<(), TypeDefError> {
        let typedef = self.resolve_name(rel_type)?;
        let catalog = self.catalog();
        for (end, actual) in [(&typedef.end1, end1_type), (&typedef.end2, end2_type)] {
            if let Some(end) = end {
                if !catalog.is_type_of(actual, &end.entity_type) {
                    return Err(TypeDefError::NotValid {
                        type_name: rel_type.to_string(),
                        reason: format!(
                            "end '{}' needs a {} but got a {}",
                            end.attribute_name, end.entity_type, actual
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
