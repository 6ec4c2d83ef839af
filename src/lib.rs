//! Vellum: a bitemporal metadata collection engine
//!
//! Stores a typed property graph of entities, relationships and
//! classifications in an append-only document store. Every write adds a new
//! version, so any object can be read as it stood at an earlier time.
//!
//! # Core Concepts
//!
//! - **Types**: entity, relationship and classification definitions held in a
//!   `TypeRegistry`
//! - **Instances**: versioned entities and relationships, each homed in one
//!   metadata collection
//! - **Transactions**: named, idempotent functions applied in log order with
//!   optimistic version checks
//! - **Snapshots**: consistent point-in-time views used by every read
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vellum::{ConnectorConfig, RepositoryConnector, TypeRegistry};
//!
//! let config = ConnectorConfig::in_memory("docs");
//! let connector = RepositoryConnector::open(config, Arc::new(TypeRegistry::new())).unwrap();
//! assert_eq!(connector.config().metadata_collection_name, "docs");
//! ```

pub mod config;
pub mod graph;
pub mod mapping;
pub mod query;
pub mod repository;
pub mod storage;
pub mod txn;
pub mod types;

pub use config::{CommitMode, ConfigError, ConnectorConfig, StoreBackend};
pub use graph::{
    Classification, Entity, Guid, InstanceGraph, InstanceStatus, Properties, PropertyValue,
    Relationship, TypeCategory,
};
pub use query::{FindRequest, Paging, SearchProperties, Sequencing, SequencingOrder};
pub use repository::{
    ErrorKind, HistoryOrder, NewEntity, NewRelationship, RepositoryConnector, RepositoryError,
    RepositoryResult, TraversalRequest,
};
pub use storage::{DocumentStore, OpenStore, SqliteStore, StorageError, StorageResult};
pub use types::{TypeDef, TypeDefBundle, TypeRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
