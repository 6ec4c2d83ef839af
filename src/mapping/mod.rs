//! Document mapper: graph objects to and from store documents

mod documents;
mod keys;

pub use documents::{
    document_to_entity, document_to_relationship, entity_to_document, relationship_to_document,
    MappedInstance,
};
pub use keys::{
    entity_key, marker_key, parse_key, relationship_key, DocKind, ENTITY_PREFIX, MARKER_PREFIX,
    RELATIONSHIP_PREFIX,
};
