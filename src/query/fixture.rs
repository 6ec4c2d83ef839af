//! In-memory graphs for traversal tests

use crate::graph::{
    Classification, Entity, Guid, InstanceGraph, InstanceProvenance, InstanceStatus, InstanceType,
    Relationship, RelationshipEnd, TypeCategory,
};
use chrono::{TimeZone, Utc};

fn instance_type(name: &str, category: TypeCategory) -> InstanceType {
    InstanceType {
        type_guid: format!("guid-{}", name),
        type_name: name.to_string(),
        category,
        super_types: vec![],
    }
}

pub fn entity(guid: &str, type_name: &str) -> Entity {
    Entity::new(
        instance_type(type_name, TypeCategory::Entity),
        InstanceProvenance::local("coll", "local"),
        "tester",
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    )
    .with_guid(Guid::from(guid))
}

pub fn classified(guid: &str, type_name: &str, classification: &str) -> Entity {
    let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    entity(guid, type_name).with_classification(Classification::new(
        classification,
        format!("guid-{}", classification),
        "tester",
        at,
    ))
}

pub fn link(guid: &str, type_name: &str, end1: &str, end2: &str) -> Relationship {
    let mut relationship = Relationship::new(
        instance_type(type_name, TypeCategory::Relationship),
        InstanceProvenance::local("coll", "local"),
        RelationshipEnd::new(Guid::from(end1), "Table"),
        RelationshipEnd::new(Guid::from(end2), "Table"),
        "tester",
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    );
    relationship.header.guid = Guid::from(guid);
    relationship
}

pub fn deleted(mut relationship: Relationship) -> Relationship {
    relationship.header.status = InstanceStatus::Deleted;
    relationship
}

pub fn graph(entities: Vec<Entity>, relationships: Vec<Relationship>) -> InstanceGraph {
    InstanceGraph {
        entities,
        relationships,
    }
}

pub fn entity_ids(graph: &InstanceGraph) -> Vec<String> {
    let mut ids: Vec<String> = graph.entities.iter().map(|e| e.guid().to_string()).collect();
    ids.sort();
    ids
}

pub fn relationship_ids(graph: &InstanceGraph) -> Vec<String> {
    let mut ids: Vec<String> = graph
        .relationships
        .iter()
        .map(|r| r.guid().to_string())
        .collect();
    ids.sort();
    ids
}
