//! Conversion between graph objects and store documents

use super::keys::{entity_key, parse_key, relationship_key, DocKind};
use crate::graph::{Entity, Guid, InstanceHeader, Relationship};
use crate::storage::{Document, StorageError, StorageResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A graph object that is stored as one document per version
pub trait MappedInstance: Serialize + DeserializeOwned + Clone + Send + Sync {
    const KIND: DocKind;

    /// Name used in transaction function names and messages
    const NOUN: &'static str;

    fn key_for(guid: &Guid) -> String;

    fn header(&self) -> &InstanceHeader;

    fn header_mut(&mut self) -> &mut InstanceHeader;

    /// Endpoint references written to the indexed `ref1`/`ref2` columns
    fn references(&self) -> (Option<String>, Option<String>) {
        (None, None)
    }

    fn key(&self) -> String {
        Self::key_for(&self.header().guid)
    }

    fn to_document(&self) -> StorageResult<Document> {
        let (ref1, ref2) = self.references();
        let header = self.header();
        Ok(Document {
            key: self.key(),
            type_name: header.instance_type.type_name.clone(),
            status: header.status.as_str().to_string(),
            ref1,
            ref2,
            body: serde_json::to_value(self)?,
        })
    }

    fn from_document(document: &Document) -> StorageResult<Self> {
        match parse_key(&document.key) {
            Some((kind, _)) if kind == Self::KIND => {}
            _ => {
                return Err(StorageError::Corrupt {
                    key: document.key.clone(),
                    reason: format!("not a {} document", Self::NOUN),
                })
            }
        }
        serde_json::from_value(document.body.clone()).map_err(|e| StorageError::Corrupt {
            key: document.key.clone(),
            reason: e.to_string(),
        })
    }
}

impl MappedInstance for Entity {
    const KIND: DocKind = DocKind::Entity;
    const NOUN: &'static str = "entity";

    fn key_for(guid: &Guid) -> String {
        entity_key(guid)
    }

    fn header(&self) -> &InstanceHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut InstanceHeader {
        &mut self.header
    }
}

impl MappedInstance for Relationship {
    const KIND: DocKind = DocKind::Relationship;
    const NOUN: &'static str = "relationship";

    fn key_for(guid: &Guid) -> String {
        relationship_key(guid)
    }

    fn header(&self) -> &InstanceHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut InstanceHeader {
        &mut self.header
    }

    fn references(&self) -> (Option<String>, Option<String>) {
        (
            Some(self.end1.guid.to_string()),
            Some(self.end2.guid.to_string()),
        )
    }
}

pub fn entity_to_document(entity: &Entity) -> StorageResult<Document> {
    entity.to_document()
}

pub fn document_to_entity(document: &Document) -> StorageResult<Entity> {
    Entity::from_document(document)
}

pub fn relationship_to_document(relationship: &Relationship) -> StorageResult<Document> {
    relationship.to_document()
}

pub fn document_to_relationship(document: &Document) -> StorageResult<Relationship> {
    Relationship::from_document(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        now_micros, InstanceProvenance, InstanceStatus, InstanceType, PropertyValue,
        RelationshipEnd, TypeCategory,
    };

    fn entity_type(name: &str) -> InstanceType {
        InstanceType {
            type_guid: format!("t-{}", name),
            type_name: name.into(),
            category: TypeCategory::Entity,
            super_types: vec![],
        }
    }

    fn sample_entity() -> Entity {
        Entity::new(
            entity_type("Database"),
            InstanceProvenance::local("coll-1", "local"),
            "alice",
            now_micros(),
        )
        .with_property("qualifiedName", PropertyValue::from("db://a"))
    }

    #[test]
    fn entity_document_carries_indexed_columns() {
        let entity = sample_entity().with_status(InstanceStatus::Draft);
        let doc = entity_to_document(&entity).unwrap();
        assert_eq!(doc.key, format!("e_{}", entity.guid()));
        assert_eq!(doc.type_name, "Database");
        assert_eq!(doc.status, "draft");
        assert_eq!(doc.ref1, None);
        assert_eq!(document_to_entity(&doc).unwrap(), entity);
    }

    #[test]
    fn relationship_document_references_both_ends() {
        let rel = Relationship::new(
            InstanceType {
                category: TypeCategory::Relationship,
                ..entity_type("Feeds")
            },
            InstanceProvenance::local("coll-1", "local"),
            RelationshipEnd::new(Guid::from("a"), "Database"),
            RelationshipEnd::new(Guid::from("b"), "Process"),
            "alice",
            now_micros(),
        );
        let doc = relationship_to_document(&rel).unwrap();
        assert!(doc.key.starts_with("r_"));
        assert_eq!(doc.ref1.as_deref(), Some("a"));
        assert_eq!(doc.ref2.as_deref(), Some("b"));
        assert_eq!(document_to_relationship(&doc).unwrap(), rel);
    }

    #[test]
    fn decoding_with_wrong_prefix_is_corrupt() {
        let doc = entity_to_document(&sample_entity()).unwrap();
        assert!(matches!(
            document_to_relationship(&doc),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn proxy_survives_mapping() {
        let proxy = sample_entity().to_proxy();
        let doc = entity_to_document(&proxy).unwrap();
        let back = document_to_entity(&doc).unwrap();
        assert!(back.proxy);
        assert!(back.properties.is_empty());
    }
}
