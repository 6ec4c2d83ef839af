//! Storage backends for Vellum
//!
//! The repository layer talks to a `DocumentStore`: an append-only,
//! bitemporal document store that runs named transaction functions in log
//! order. `SqliteStore` is the bundled implementation.

mod snapshot;
mod sqlite;
mod traits;

pub use snapshot::SnapshotGuard;
pub use sqlite::SqliteStore;
pub use traits::{
    DocFilter, Document, DocumentStore, OpenStore, Snapshot, SnapshotBasis, StorageError,
    StorageResult, StoredDocument, TransactionFunction, TransactionReceipt, TxAbort, TxContext,
    TxId, TxOutcome,
};
