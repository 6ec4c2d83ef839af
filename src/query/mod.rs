//! Query engine over stored instances
//!
//! Find requests filter instances by type, status, property and
//! classification conditions and free text, then order and page the result.
//! The traversal queries (neighborhood, linking, related) walk relationships
//! breadth-first over any `InstanceSource`.

mod find;
mod matching;
mod path;
mod related;
mod sequence;
mod source;
mod text;
mod traverse;
mod types;

#[cfg(test)]
mod fixture;

pub use find::FindQuery;
pub use matching::{matches_text, ClassificationMatcher, PropertyMatcher};
pub use path::LinkingQuery;
pub use related::RelatedQuery;
pub use sequence::{page, sequence, validate as validate_paging, Sequenced};
pub use source::InstanceSource;
pub use text::{exact_match, full_match_regex};
pub use traverse::NeighborhoodQuery;
pub use types::{
    ClassificationCondition, FindRequest, MatchCriteria, Paging, PropertyCondition,
    PropertyOperator, QueryError, SearchClassifications, SearchProperties, Sequencing,
    SequencingOrder, TraversalFilter,
};
