//! Error taxonomy of the repository connector

use crate::config::ConfigError;
use crate::graph::Guid;
use crate::query::QueryError;
use crate::storage::{StorageError, StorageResult, TxAbort, TxId};
use crate::txn::TxError;
use crate::types::TypeDefError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Coarse classification of a `RepositoryError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotKnown,
    ProxyOnly,
    InstanceConflict,
    TypeError,
    TypeConflict,
    PagingError,
    PersistenceLayerMismatch,
    CommitTimeout,
    ResourceError,
    InvalidParameter,
    Storage,
}

impl ErrorKind {
    /// Only a lost optimistic-concurrency race is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::InstanceConflict)
    }
}

fn context(guid: &Option<Guid>, as_of: &Option<DateTime<Utc>>) -> String {
    match (guid, as_of) {
        (Some(guid), Some(at)) => format!(" for {} as of {}", guid, at.to_rfc3339()),
        (Some(guid), None) => format!(" for {}", guid),
        (None, Some(at)) => format!(" as of {}", at.to_rfc3339()),
        (None, None) => String::new(),
    }
}

/// Errors returned by connector operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0} is not known")]
    NotKnown(String),

    #[error("entity {0} is only held as a proxy")]
    ProxyOnly(Guid),

    #[error("Instance conflict: {0}")]
    InstanceConflict(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Type conflict: {0}")]
    TypeConflict(String),

    #[error("Paging error: {0}")]
    PagingError(String),

    #[error("Persistence layer version {found} does not match expected version {expected}")]
    PersistenceLayerMismatch { found: String, expected: u32 },

    #[error("Transaction {0} was not confirmed before the commit timeout")]
    CommitTimeout(TxId),

    #[error("Resource error: {0}")]
    ResourceError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{operation} failed{}: {source}", context(.guid, .as_of))]
    Storage {
        operation: &'static str,
        guid: Option<Guid>,
        as_of: Option<DateTime<Utc>>,
        #[source]
        source: StorageError,
    },
}

/// Result type for connector operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepositoryError::NotKnown(_) => ErrorKind::NotKnown,
            RepositoryError::ProxyOnly(_) => ErrorKind::ProxyOnly,
            RepositoryError::InstanceConflict(_) => ErrorKind::InstanceConflict,
            RepositoryError::TypeError(_) => ErrorKind::TypeError,
            RepositoryError::TypeConflict(_) => ErrorKind::TypeConflict,
            RepositoryError::PagingError(_) => ErrorKind::PagingError,
            RepositoryError::PersistenceLayerMismatch { .. } => ErrorKind::PersistenceLayerMismatch,
            RepositoryError::CommitTimeout(_) => ErrorKind::CommitTimeout,
            RepositoryError::ResourceError(_) => ErrorKind::ResourceError,
            RepositoryError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            RepositoryError::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Wrap a store error with the context needed to reproduce it
    pub fn storage(
        operation: &'static str,
        guid: Option<&Guid>,
        as_of: Option<DateTime<Utc>>,
        source: StorageError,
    ) -> Self {
        match source {
            StorageError::CommitTimeout(tx_id) => RepositoryError::CommitTimeout(tx_id),
            StorageError::SnapshotClosed(_)
            | StorageError::SnapshotUnavailable { .. }
            | StorageError::IndexerStopped => RepositoryError::ResourceError(format!(
                "{}{}: {}",
                operation,
                context(&guid.cloned(), &as_of),
                source
            )),
            source => RepositoryError::Storage {
                operation,
                guid: guid.cloned(),
                as_of,
                source,
            },
        }
    }

    /// Translate the outcome of a transaction
    pub fn from_tx(operation: &'static str, guid: Option<&Guid>, err: TxError) -> Self {
        match err {
            TxError::Aborted(abort) => Self::from(abort),
            TxError::Storage(source) => Self::storage(operation, guid, None, source),
        }
    }
}

/// Attach operation context to store results
pub(crate) trait StorageContext<T> {
    fn context(
        self,
        operation: &'static str,
        guid: Option<&Guid>,
        as_of: Option<DateTime<Utc>>,
    ) -> RepositoryResult<T>;
}

impl<T> StorageContext<T> for StorageResult<T> {
    fn context(
        self,
        operation: &'static str,
        guid: Option<&Guid>,
        as_of: Option<DateTime<Utc>>,
    ) -> RepositoryResult<T> {
        self.map_err(|e| RepositoryError::storage(operation, guid, as_of, e))
    }
}

impl From<TxAbort> for RepositoryError {
    fn from(abort: TxAbort) -> Self {
        match abort {
            TxAbort::Conflict(msg) => RepositoryError::InstanceConflict(msg),
            TxAbort::NotKnown(msg) => RepositoryError::NotKnown(msg),
            TxAbort::Invalid(msg) => RepositoryError::InvalidParameter(msg),
            TxAbort::Storage(msg) => RepositoryError::ResourceError(msg),
        }
    }
}

impl From<TypeDefError> for RepositoryError {
    fn from(err: TypeDefError) -> Self {
        match err {
            TypeDefError::Conflict { .. } => RepositoryError::TypeConflict(err.to_string()),
            TypeDefError::Malformed(_) | TypeDefError::Io(_) | TypeDefError::Yaml(_) => {
                RepositoryError::InvalidParameter(err.to_string())
            }
            _ => RepositoryError::TypeError(err.to_string()),
        }
    }
}

impl From<QueryError> for RepositoryError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Paging(msg) => RepositoryError::PagingError(msg),
            other => RepositoryError::InvalidParameter(other.to_string()),
        }
    }
}

impl From<ConfigError> for RepositoryError {
    fn from(err: ConfigError) -> Self {
        RepositoryError::InvalidParameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aborts_map_to_kinds() {
        let conflict: RepositoryError = TxAbort::Conflict("raced".into()).into();
        assert_eq!(conflict.kind(), ErrorKind::InstanceConflict);
        assert!(conflict.is_retryable());

        let missing: RepositoryError = TxAbort::NotKnown("entity x".into()).into();
        assert_eq!(missing.kind(), ErrorKind::NotKnown);
        assert!(!missing.is_retryable());
    }

    #[test]
    fn store_errors_keep_their_context() {
        let err = RepositoryError::storage(
            "get_entity_detail",
            Some(&Guid::from("g-1")),
            None,
            StorageError::Corrupt {
                key: "e_g-1".into(),
                reason: "bad body".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Storage);
        let text = err.to_string();
        assert!(text.contains("get_entity_detail"));
        assert!(text.contains("g-1"));
    }

    #[test]
    fn timeouts_and_snapshot_failures_get_their_own_kinds() {
        let timeout = RepositoryError::storage("add_entity", None, None, StorageError::CommitTimeout(7));
        assert_eq!(timeout.kind(), ErrorKind::CommitTimeout);
        let closed = RepositoryError::storage("find_entities", None, None, StorageError::SnapshotClosed(3));
        assert_eq!(closed.kind(), ErrorKind::ResourceError);
    }

    #[test]
    fn type_conflicts_are_distinct_from_type_errors() {
        let conflict: RepositoryError = TypeDefError::Conflict {
            name: "Table".into(),
            reason: "different attributes".into(),
        }
        .into();
        assert_eq!(conflict.kind(), ErrorKind::TypeConflict);
        let unknown: RepositoryError = TypeDefError::Unknown("Nope".into()).into();
        assert_eq!(unknown.kind(), ErrorKind::TypeError);
        let blank: RepositoryError = TypeDefError::Malformed("empty guid".into()).into();
        assert_eq!(blank.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn paging_query_errors_are_paging_errors() {
        let err: RepositoryError = QueryError::Paging("negative".into()).into();
        assert_eq!(err.kind(), ErrorKind::PagingError);
    }
}
