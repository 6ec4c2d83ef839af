//! Repository connector: the public operation surface
//!
//! Every call validates its parameters, reads through one snapshot and, for
//! writes, submits a mutation carrying the version it observed. Failures
//! come back as a `RepositoryError` whose `kind()` tells callers what went
//! wrong without parsing messages.

mod connector;
mod entities;
mod error;
mod reader;
mod relationships;
mod search;
mod traversal;
mod validate;

pub use connector::{RepositoryConnector, PERSISTENCE_LAYER_VERSION, PERSISTENCE_MARKER};
pub use entities::NewEntity;
pub use error::{ErrorKind, RepositoryError, RepositoryResult};
pub use reader::{HistoryOrder, SnapshotReader};
pub use relationships::NewRelationship;
pub use traversal::TraversalRequest;
