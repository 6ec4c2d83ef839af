//! Type registry for entity, relationship and classification definitions
//!
//! Every other layer consults the registry to validate properties and to
//! resolve type names, GUIDs and inheritance.

mod registry;
mod typedef;

pub use registry::{Catalog, TypeRegistry};
pub use typedef::{
    AttributeDef, AttributeKind, RelationshipEndDef, TypeDef, TypeDefBundle, TypeDefError,
};
