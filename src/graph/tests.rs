//! Serialization tests with stored-document fixtures

use serde_json::{json, Value};

/// Fixture: entity body as written by the document mapper
fn entity_fixture() -> Value {
    json!({
        "guid": "4c1b9a2e-6f3a-4bd0-9e4e-1f0c6a6c9d11",
        "type": {
            "type_guid": "type-guid-database",
            "type_name": "Database",
            "category": "entity",
            "super_types": ["DataStore", "Asset"]
        },
        "status": "active",
        "version": 3,
        "provenance": {
            "kind": "local_cohort",
            "metadata_collection_id": "coll-local",
            "metadata_collection_name": "local catalog"
        },
        "created_by": "alice",
        "updated_by": "bob",
        "create_time": "2025-11-29T08:00:00Z",
        "update_time": "2025-11-30T10:23:00Z",
        "properties": {
            "qualifiedName": "db://sales",
            "replicas": 2
        },
        "classifications": [
            {
                "name": "Confidentiality",
                "type_guid": "type-guid-confidentiality",
                "origin": "assigned",
                "properties": { "level": 3 },
                "status": "active",
                "version": 1,
                "created_by": "alice",
                "create_time": "2025-11-29T09:00:00Z",
                "update_time": "2025-11-29T09:00:00Z"
            }
        ]
    })
}

/// Fixture: relationship body as written by the document mapper
fn relationship_fixture() -> Value {
    json!({
        "guid": "rel-1",
        "type": {
            "type_guid": "type-guid-attachment",
            "type_name": "DataStoreAttachment",
            "category": "relationship"
        },
        "status": "deleted",
        "status_on_delete": "active",
        "version": 2,
        "provenance": {
            "kind": "external_source",
            "metadata_collection_id": "coll-remote",
            "metadata_collection_name": null,
            "replicated_by": "coll-local"
        },
        "created_by": "sync",
        "create_time": "2025-11-29T08:00:00Z",
        "update_time": "2025-11-29T08:05:00Z",
        "properties": {},
        "end1": { "guid": "e-1", "type_name": "Database" },
        "end2": { "guid": "e-2", "type_name": "Process" }
    })
}

#[cfg(test)]
mod serialization_tests {
    use super::*;
    use crate::graph::{
        ClassificationOrigin, Entity, Guid, InstanceStatus, PropertyValue, ProvenanceKind,
        Relationship, TypeCategory,
    };

    #[test]
    fn entity_deserializes_from_fixture() {
        let entity: Entity = serde_json::from_value(entity_fixture()).unwrap();
        assert_eq!(entity.guid().as_str(), "4c1b9a2e-6f3a-4bd0-9e4e-1f0c6a6c9d11");
        assert_eq!(entity.type_name(), "Database");
        assert_eq!(entity.header.instance_type.category, TypeCategory::Entity);
        assert!(entity.header.instance_type.is_type_of("Asset"));
        assert_eq!(entity.version(), 3);
        assert_eq!(entity.status(), InstanceStatus::Active);
        assert!(!entity.proxy);
        assert_eq!(
            entity.properties.get("replicas"),
            Some(&PropertyValue::Int(2))
        );
        let classification = entity.classification("Confidentiality").unwrap();
        assert_eq!(classification.origin, ClassificationOrigin::Assigned);
        assert_eq!(classification.properties.get("level"), Some(&PropertyValue::Int(3)));
    }

    #[test]
    fn entity_roundtrips_through_json() {
        let entity: Entity = serde_json::from_value(entity_fixture()).unwrap();
        let json = serde_json::to_value(&entity).unwrap();
        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(entity, back);
    }

    #[test]
    fn header_is_flattened_into_entity_body() {
        let entity: Entity = serde_json::from_value(entity_fixture()).unwrap();
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["guid"], "4c1b9a2e-6f3a-4bd0-9e4e-1f0c6a6c9d11");
        assert_eq!(json["type"]["type_name"], "Database");
        assert!(json.get("header").is_none());
        // Optional audit fields are omitted rather than written as null
        assert!(json.get("re_identified_from").is_none());
    }

    #[test]
    fn relationship_deserializes_from_fixture() {
        let rel: Relationship = serde_json::from_value(relationship_fixture()).unwrap();
        assert_eq!(rel.type_name(), "DataStoreAttachment");
        assert_eq!(rel.header.status, InstanceStatus::Deleted);
        assert_eq!(rel.header.status_on_delete, Some(InstanceStatus::Active));
        assert_eq!(rel.header.provenance.kind, ProvenanceKind::ExternalSource);
        assert!(rel.connects(&Guid::from("e-2")));
        assert_eq!(rel.other_end(&Guid::from("e-1")), Some(&Guid::from("e-2")));
        assert_eq!(rel.other_end(&Guid::from("e-9")), None);
    }

    #[test]
    fn proxy_strips_properties_but_keeps_classifications() {
        let entity: Entity = serde_json::from_value(entity_fixture()).unwrap();
        let proxy = entity.to_proxy();
        assert!(proxy.proxy);
        assert!(proxy.properties.is_empty());
        assert_eq!(proxy.classifications.len(), 1);
        assert_eq!(proxy.guid(), entity.guid());
    }
}
