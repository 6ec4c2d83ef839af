//! Storage trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Position in the transaction log; 0 means "nothing indexed yet"
pub type TxId = i64;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt document '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Transaction function not installed: {0}")]
    FunctionNotInstalled(String),

    #[error("Snapshot {0} is not open")]
    SnapshotClosed(u64),

    #[error("Snapshot basis {requested} is ahead of the indexed watermark {indexed}")]
    SnapshotUnavailable { requested: TxId, indexed: TxId },

    #[error("Transaction {0} was not indexed within the commit timeout")]
    CommitTimeout(TxId),

    #[error("Transaction {0} is not in the log")]
    UnknownTransaction(TxId),

    #[error("Indexer has stopped")]
    IndexerStopped,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One stored version of a logical document
///
/// `type_name`, `status`, `ref1` and `ref2` are indexed columns extracted
/// from the body so that queries need not parse JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub type_name: String,
    pub status: String,
    /// First endpoint reference (relationships only)
    pub ref1: Option<String>,
    /// Second endpoint reference (relationships only)
    pub ref2: Option<String>,
    pub body: Value,
}

/// A document together with the transaction that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub document: Document,
    pub tx_id: TxId,
    /// Instant from which this version is the effective one
    pub valid_time: DateTime<Utc>,
}

/// What a snapshot should see
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotBasis {
    /// Only versions valid at or before this instant; `None` means now
    pub as_of: Option<DateTime<Utc>>,
    /// Only transactions up to this id; `None` means the indexed watermark
    pub tx_id: Option<TxId>,
}

impl SnapshotBasis {
    pub fn now() -> Self {
        Self::default()
    }

    pub fn as_of(as_of: Option<DateTime<Utc>>) -> Self {
        Self { as_of, tx_id: None }
    }

    pub fn at_transaction(tx_id: TxId) -> Self {
        Self {
            as_of: None,
            tx_id: Some(tx_id),
        }
    }
}

/// An open, consistent view of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: u64,
    /// Highest transaction visible through this snapshot
    pub tx_id: TxId,
    pub as_of: Option<DateTime<Utc>>,
}

/// Filter criteria for querying current documents in a snapshot
#[derive(Debug, Clone, Default)]
pub struct DocFilter {
    /// Restrict to keys starting with this prefix
    pub key_prefix: Option<String>,
    /// Restrict to these type names (empty means any)
    pub type_names: Vec<String>,
    /// Restrict to these statuses (empty means any)
    pub statuses: Vec<String>,
    /// Restrict to documents whose `ref1` or `ref2` equals this value
    pub reference: Option<String>,
}

impl DocFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_types(mut self, type_names: impl IntoIterator<Item = String>) -> Self {
        self.type_names.extend(type_names);
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = String>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    pub fn referencing(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Acknowledgement that a transaction has been durably logged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_id: TxId,
    pub function: String,
    pub submitted_at: DateTime<Utc>,
}

/// Why a transaction function refused to apply
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TxAbort {
    /// An optimistic-concurrency precondition did not hold
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not known: {0}")]
    NotKnown(String),

    #[error("invalid: {0}")]
    Invalid(String),

    #[error("storage: {0}")]
    Storage(String),
}

impl From<StorageError> for TxAbort {
    fn from(err: StorageError) -> Self {
        TxAbort::Storage(err.to_string())
    }
}

/// Final state of an indexed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    Aborted(TxAbort),
}

/// State visible to a transaction function while it runs
///
/// Reads see the latest version of each key, including writes made earlier
/// in the same transaction. Every write lands at the transaction's time.
pub trait TxContext {
    fn tx_id(&self) -> TxId;

    /// Valid time recorded for every version this transaction writes
    fn tx_time(&self) -> DateTime<Utc>;

    fn get(&self, key: &str) -> StorageResult<Option<StoredDocument>>;

    /// All versions of `key`, oldest first
    fn history(&self, key: &str) -> StorageResult<Vec<StoredDocument>>;

    /// Current documents whose `ref1` or `ref2` is `reference`
    fn referencing(&self, reference: &str) -> StorageResult<Vec<StoredDocument>>;

    fn put(&mut self, document: Document) -> StorageResult<()>;

    /// Remove every version of `key`; returns the number of versions removed
    fn evict(&mut self, key: &str) -> StorageResult<usize>;
}

/// A named, idempotent mutation executed by the store's indexer
pub trait TransactionFunction: Send + Sync {
    fn name(&self) -> &str;

    /// Stable description recorded at installation
    fn definition(&self) -> String;

    fn apply(&self, ctx: &mut dyn TxContext, args: &[Value]) -> Result<(), TxAbort>;
}

/// Ordered, snapshot-capable, transactional document store
///
/// Implementations must be thread-safe (Send + Sync); reads may run in
/// parallel with the indexer applying transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // === Snapshots ===

    fn open_snapshot(&self, basis: SnapshotBasis) -> StorageResult<Snapshot>;

    fn close_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()>;

    // === Reads ===

    /// Version of `key` effective in the snapshot
    fn get_document(&self, snapshot: &Snapshot, key: &str) -> StorageResult<Option<StoredDocument>>;

    /// Effective versions of every document matching the filter, ordered by key
    fn query(&self, snapshot: &Snapshot, filter: &DocFilter) -> StorageResult<Vec<StoredDocument>>;

    /// Versions of `key` whose valid time lies in `[from, to)`, oldest first
    fn history(
        &self,
        snapshot: &Snapshot,
        key: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<StoredDocument>>;

    // === Transactions ===

    /// Register a function; returns false if it was already installed
    fn install_function(&self, function: Arc<dyn TransactionFunction>) -> StorageResult<bool>;

    /// Durably log a call of an installed function and queue it for indexing
    fn submit_transaction(&self, function: &str, args: Vec<Value>)
        -> StorageResult<TransactionReceipt>;

    /// Wait until the transaction has been indexed and report its outcome
    async fn await_commit(
        &self,
        receipt: &TransactionReceipt,
        timeout: Duration,
    ) -> StorageResult<TxOutcome>;

    /// Re-queue logged transactions that were never indexed
    fn resume_pending(&self) -> StorageResult<usize>;

    fn indexed_watermark(&self) -> TxId;

    /// Wait until everything submitted so far has been indexed
    async fn await_indexed(&self, timeout: Duration) -> StorageResult<TxId>;

    // === Reserved documents ===

    fn read_marker(&self, name: &str) -> StorageResult<Option<Value>>;

    fn write_marker(&self, name: &str, value: &Value) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: DocumentStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
