//! Shared fixtures for the connector integration tests
//!
//! A small catalog: `Asset` with `Table` and `Column` subtypes, an
//! `AssetLink` relationship between assets and a `Confidential`
//! classification.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use vellum::config::{ConnectorConfig, StoreBackend};
use vellum::graph::{Entity, Guid, Relationship, TypeCategory};
use vellum::types::{AttributeDef, AttributeKind, RelationshipEndDef, TypeDef, TypeRegistry};
use vellum::{NewEntity, NewRelationship, RepositoryConnector};

pub const USER: &str = "alice";

pub const ASSET: &str = "t-asset";
pub const TABLE: &str = "t-table";
pub const COLUMN: &str = "t-column";
pub const LINK: &str = "t-link";
pub const CONFIDENTIAL: &str = "t-confidential";

pub fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    for typedef in [
        TypeDef::new(ASSET, "Asset", TypeCategory::Entity)
            .with_attribute(AttributeDef::new("qualifiedName", AttributeKind::String).required())
            .with_attribute(AttributeDef::new("description", AttributeKind::String))
            .with_attribute(AttributeDef::new("owner", AttributeKind::String))
            .with_attribute(AttributeDef::new("size", AttributeKind::Int)),
        TypeDef::new(TABLE, "Table", TypeCategory::Entity).with_super_type("Asset"),
        TypeDef::new(COLUMN, "Column", TypeCategory::Entity).with_super_type("Asset"),
        TypeDef::new(LINK, "AssetLink", TypeCategory::Relationship)
            .with_attribute(AttributeDef::new("label", AttributeKind::String))
            .with_ends(
                RelationshipEndDef {
                    entity_type: "Asset".into(),
                    attribute_name: "source".into(),
                },
                RelationshipEndDef {
                    entity_type: "Asset".into(),
                    attribute_name: "target".into(),
                },
            ),
        TypeDef::new(CONFIDENTIAL, "Confidential", TypeCategory::Classification)
            .with_attribute(AttributeDef::new("level", AttributeKind::Int))
            .with_valid_entity_type("Asset"),
    ] {
        registry.register(typedef).unwrap();
    }
    Arc::new(registry)
}

pub fn connector() -> RepositoryConnector {
    RepositoryConnector::open(ConnectorConfig::in_memory("test catalog"), registry()).unwrap()
}

/// Connector over a database file, as a later run would open it
pub fn connector_at(path: &Path, collection_id: &str) -> RepositoryConnector {
    let config = ConnectorConfig::new(
        collection_id,
        "test catalog",
        StoreBackend::Sqlite {
            path: path.to_path_buf(),
        },
    );
    RepositoryConnector::open(config, registry()).unwrap()
}

pub async fn add_asset(connector: &RepositoryConnector, type_guid: &str, name: &str) -> Entity {
    connector
        .add_entity(
            USER,
            NewEntity::of_type(type_guid).with_property("qualifiedName", name),
        )
        .await
        .unwrap()
        .unwrap()
}

pub async fn link(connector: &RepositoryConnector, end1: &Guid, end2: &Guid) -> Relationship {
    connector
        .add_relationship(USER, NewRelationship::of_type(LINK, end1.clone(), end2.clone()))
        .await
        .unwrap()
        .unwrap()
}
