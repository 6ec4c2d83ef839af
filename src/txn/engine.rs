//! Transaction engine: submits mutations and applies commit semantics

use super::entity_functions::{
    AddEntity, AddEntityProxy, ClassifyEntity, DeclassifyEntity, UpdateEntityClassification,
};
use super::instance_functions::{
    Delete, Purge, PurgeReferenceCopy, ReHome, ReIdentify, ReType, Restore, SaveReferenceCopy,
    UndoUpdate, UpdateProperties, UpdateStatus,
};
use super::mutation::Mutation;
use super::relationship_functions::AddRelationship;
use crate::config::CommitMode;
use crate::graph::{Entity, Relationship};
use crate::storage::{
    Document, DocumentStore, SnapshotBasis, SnapshotGuard, StorageError, TransactionFunction,
    TransactionReceipt, TxAbort, TxOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while running a mutation
#[derive(Debug, Error)]
pub enum TxError {
    #[error("Transaction aborted: {0}")]
    Aborted(TxAbort),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for TxError {
    fn from(err: serde_json::Error) -> Self {
        TxError::Storage(StorageError::Serialization(err))
    }
}

/// Every transaction function the engine relies on
pub fn all_functions() -> Vec<Arc<dyn TransactionFunction>> {
    vec![
        Arc::new(AddEntity),
        Arc::new(AddEntityProxy),
        Arc::new(UpdateProperties::<Entity>::new()),
        Arc::new(UpdateStatus::<Entity>::new()),
        Arc::new(UndoUpdate::<Entity>::new()),
        Arc::new(Delete::<Entity>::new()),
        Arc::new(Restore::<Entity>::new()),
        Arc::new(Purge::<Entity>::new()),
        Arc::new(ClassifyEntity),
        Arc::new(DeclassifyEntity),
        Arc::new(UpdateEntityClassification),
        Arc::new(ReIdentify::<Entity>::new()),
        Arc::new(ReType::<Entity>::new()),
        Arc::new(ReHome::<Entity>::new()),
        Arc::new(SaveReferenceCopy::<Entity>::new()),
        Arc::new(PurgeReferenceCopy::<Entity>::new()),
        Arc::new(AddRelationship),
        Arc::new(UpdateProperties::<Relationship>::new()),
        Arc::new(UpdateStatus::<Relationship>::new()),
        Arc::new(UndoUpdate::<Relationship>::new()),
        Arc::new(Delete::<Relationship>::new()),
        Arc::new(Restore::<Relationship>::new()),
        Arc::new(Purge::<Relationship>::new()),
        Arc::new(ReIdentify::<Relationship>::new()),
        Arc::new(ReType::<Relationship>::new()),
        Arc::new(ReHome::<Relationship>::new()),
        Arc::new(SaveReferenceCopy::<Relationship>::new()),
        Arc::new(PurgeReferenceCopy::<Relationship>::new()),
    ]
}

/// Runs mutations as named transactions against a document store
pub struct TransactionEngine {
    store: Arc<dyn DocumentStore>,
    mode: CommitMode,
    timeout: Duration,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn DocumentStore>, mode: CommitMode, timeout: Duration) -> Self {
        Self {
            store,
            mode,
            timeout,
        }
    }

    pub fn mode(&self) -> CommitMode {
        self.mode
    }

    /// Install every transaction function; returns how many were new
    pub fn install_all(&self) -> Result<usize, StorageError> {
        let mut installed = 0;
        for function in all_functions() {
            if self.store.install_function(function)? {
                installed += 1;
            }
        }
        info!(installed, "transaction functions ready");
        Ok(installed)
    }

    /// Run a mutation under the configured commit mode.
    ///
    /// Synchronous mode returns the committed document (or `None` when the
    /// mutation removed it). Asynchronous mode always returns `None`.
    pub async fn transact(&self, mutation: Mutation) -> Result<Option<Document>, TxError> {
        match self.mode {
            CommitMode::Synchronous => self.transact_with_validation(mutation).await,
            CommitMode::Asynchronous => {
                let receipt = self.submit(&mutation)?;
                self.watch_in_background(receipt);
                Ok(None)
            }
        }
    }

    /// Submit and wait for the outcome whatever the commit mode
    pub async fn transact_with_validation(
        &self,
        mutation: Mutation,
    ) -> Result<Option<Document>, TxError> {
        let receipt = self.submit(&mutation)?;
        match self.store.await_commit(&receipt, self.timeout).await? {
            TxOutcome::Committed => {}
            TxOutcome::Aborted(abort) => return Err(TxError::Aborted(abort)),
        }

        let Some(key) = mutation.result_key() else {
            return Ok(None);
        };
        let snapshot = SnapshotGuard::open(
            self.store.as_ref(),
            SnapshotBasis::at_transaction(receipt.tx_id),
        )?;
        let document = snapshot.get(&key)?.map(|stored| stored.document);
        snapshot.close()?;
        Ok(document)
    }

    /// Submit without waiting; the outcome is only logged
    pub fn transact_without_validation(
        &self,
        mutation: Mutation,
    ) -> Result<TransactionReceipt, TxError> {
        let receipt = self.submit(&mutation)?;
        self.watch_in_background(receipt.clone());
        Ok(receipt)
    }

    fn submit(&self, mutation: &Mutation) -> Result<TransactionReceipt, TxError> {
        let call = mutation.lower()?;
        let receipt = self.store.submit_transaction(call.function, call.args)?;
        debug!(tx_id = receipt.tx_id, function = call.function, "submitted mutation");
        Ok(receipt)
    }

    fn watch_in_background(&self, receipt: TransactionReceipt) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let timeout = self.timeout;
        runtime.spawn(async move {
            match store.await_commit(&receipt, timeout).await {
                Ok(TxOutcome::Committed) => {}
                Ok(TxOutcome::Aborted(abort)) => {
                    warn!(tx_id = receipt.tx_id, function = %receipt.function, reason = %abort, "asynchronous transaction aborted")
                }
                Err(e) => {
                    warn!(tx_id = receipt.tx_id, function = %receipt.function, error = %e, "asynchronous transaction not confirmed")
                }
            }
        });
    }
}
