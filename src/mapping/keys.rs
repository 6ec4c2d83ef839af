//! Document key conventions
//!
//! Keys carry a prefix naming the kind of object, so entity and relationship
//! documents never collide even if their GUIDs do.

use crate::graph::Guid;

pub const ENTITY_PREFIX: &str = "e_";
pub const RELATIONSHIP_PREFIX: &str = "r_";
pub const MARKER_PREFIX: &str = "x_";

/// Kind of object a document key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocKind {
    Entity,
    Relationship,
    Marker,
}

impl DocKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocKind::Entity => ENTITY_PREFIX,
            DocKind::Relationship => RELATIONSHIP_PREFIX,
            DocKind::Marker => MARKER_PREFIX,
        }
    }
}

pub fn entity_key(guid: &Guid) -> String {
    format!("{}{}", ENTITY_PREFIX, guid)
}

pub fn relationship_key(guid: &Guid) -> String {
    format!("{}{}", RELATIONSHIP_PREFIX, guid)
}

pub fn marker_key(name: &str) -> String {
    format!("{}{}", MARKER_PREFIX, name)
}

/// Split a key into its kind and the identifier after the prefix
pub fn parse_key(key: &str) -> Option<(DocKind, &str)> {
    [DocKind::Entity, DocKind::Relationship, DocKind::Marker]
        .into_iter()
        .find_map(|kind| {
            key.strip_prefix(kind.prefix())
                .filter(|rest| !rest.is_empty())
                .map(|rest| (kind, rest))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_and_relationship_keys_differ_for_same_guid() {
        let guid = Guid::from("abc");
        assert_eq!(entity_key(&guid), "e_abc");
        assert_eq!(relationship_key(&guid), "r_abc");
        assert_ne!(entity_key(&guid), relationship_key(&guid));
    }

    #[test]
    fn parse_key_recovers_kind_and_guid() {
        assert_eq!(parse_key("e_abc"), Some((DocKind::Entity, "abc")));
        assert_eq!(parse_key("r_e_abc"), Some((DocKind::Relationship, "e_abc")));
        assert_eq!(parse_key("x_persistence_layer"), Some((DocKind::Marker, "persistence_layer")));
        assert_eq!(parse_key("e_"), None);
        assert_eq!(parse_key("zzz"), None);
    }
}
