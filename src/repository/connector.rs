//! Connector construction, startup checks and shared plumbing

use super::error::{RepositoryError, RepositoryResult, StorageContext};
use super::reader::SnapshotReader;
use super::validate;
use crate::config::{ConnectorConfig, StoreBackend};
use crate::graph::{Entity, Guid, InstanceProvenance, InstanceStatus, Relationship};
use crate::mapping::MappedInstance;
use crate::storage::{Document, DocumentStore, OpenStore, SqliteStore, TxId};
use crate::txn::{Mutation, TransactionEngine};
use crate::types::TypeRegistry;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Version of the document layout written by this crate
pub const PERSISTENCE_LAYER_VERSION: u32 = 1;

/// Marker document holding the persistence layer version
pub const PERSISTENCE_MARKER: &str = "persistence_layer";

/// The public operation surface over one metadata collection
pub struct RepositoryConnector {
    pub(super) config: ConnectorConfig,
    pub(super) registry: Arc<TypeRegistry>,
    pub(super) store: Arc<dyn DocumentStore>,
    pub(super) engine: TransactionEngine,
}

impl RepositoryConnector {
    /// Open the configured backend and start the connector
    pub fn open(config: ConnectorConfig, registry: Arc<TypeRegistry>) -> RepositoryResult<Self> {
        config.validate()?;
        let store: Arc<dyn DocumentStore> = match &config.backend {
            StoreBackend::Sqlite { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::ResourceError(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                Arc::new(SqliteStore::open(path).context("open_store", None, None)?)
            }
            StoreBackend::InMemory => {
                Arc::new(SqliteStore::open_in_memory().context("open_store", None, None)?)
            }
        };
        Self::with_store(config, registry, store)
    }

    /// Start the connector over an already opened store.
    ///
    /// Refuses to start when the store was written by an incompatible
    /// persistence layer. Otherwise installs every transaction function and
    /// re-queues transactions that were logged but never applied.
    pub fn with_store(
        config: ConnectorConfig,
        registry: Arc<TypeRegistry>,
        store: Arc<dyn DocumentStore>,
    ) -> RepositoryResult<Self> {
        config.validate()?;
        check_persistence_layer(store.as_ref())?;

        let engine = TransactionEngine::new(
            Arc::clone(&store),
            config.commit_mode,
            config.commit_timeout(),
        );
        engine.install_all().context("install_functions", None, None)?;

        let resumed = store.resume_pending().context("resume_pending", None, None)?;
        if resumed > 0 {
            warn!(resumed, "re-queued transactions left unapplied by a previous run");
        }

        info!(
            collection = %config.metadata_collection_id,
            name = %config.metadata_collection_name,
            mode = ?config.commit_mode,
            types = registry.len(),
            "repository connector started"
        );
        Ok(Self {
            config,
            registry,
            store,
            engine,
        })
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn metadata_collection_id(&self) -> &str {
        &self.config.metadata_collection_id
    }

    /// Wait until every logged transaction has been applied.
    ///
    /// Writes in asynchronous mode become visible to reads only after this.
    pub async fn await_indexed(&self) -> RepositoryResult<TxId> {
        self.store
            .await_indexed(self.config.commit_timeout())
            .await
            .context("await_indexed", None, None)
    }

    pub(super) fn local_provenance(&self) -> InstanceProvenance {
        InstanceProvenance::local(
            self.config.metadata_collection_id.clone(),
            self.config.metadata_collection_name.clone(),
        )
    }

    /// Run `read` against one snapshot, releasing it on every path
    pub(super) fn with_snapshot<R>(
        &self,
        operation: &'static str,
        guid: Option<&Guid>,
        as_of: Option<DateTime<Utc>>,
        read: impl FnOnce(&SnapshotReader<'_>) -> RepositoryResult<R>,
    ) -> RepositoryResult<R> {
        let reader = SnapshotReader::open(self.store.as_ref(), as_of).context(operation, guid, as_of)?;
        let result = read(&reader);
        let closed = reader.close();
        let value = result?;
        closed.context(operation, guid, as_of)?;
        Ok(value)
    }

    /// Current version of an entity, whatever its status
    pub(super) fn stored_entity(
        &self,
        operation: &'static str,
        guid: &Guid,
    ) -> RepositoryResult<Entity> {
        self.with_snapshot(operation, Some(guid), None, |reader| {
            reader
                .instance::<Entity>(guid)
                .context(operation, Some(guid), None)?
                .ok_or_else(|| RepositoryError::NotKnown(format!("entity {}", guid)))
        })
    }

    /// Current version of a live, full entity
    pub(super) fn live_entity(&self, operation: &'static str, guid: &Guid) -> RepositoryResult<Entity> {
        validate::full_entity(self.stored_entity(operation, guid)?)
    }

    pub(super) fn stored_relationship(
        &self,
        operation: &'static str,
        guid: &Guid,
    ) -> RepositoryResult<Relationship> {
        self.with_snapshot(operation, Some(guid), None, |reader| {
            reader
                .relationship(guid)
                .context(operation, Some(guid), None)?
                .ok_or_else(|| RepositoryError::NotKnown(format!("relationship {}", guid)))
        })
    }

    pub(super) fn live_relationship(
        &self,
        operation: &'static str,
        guid: &Guid,
    ) -> RepositoryResult<Relationship> {
        let relationship = self.stored_relationship(operation, guid)?;
        if relationship.header.status == InstanceStatus::Deleted {
            return Err(RepositoryError::NotKnown(format!(
                "relationship {} (deleted)",
                guid
            )));
        }
        Ok(relationship)
    }

    /// Run a mutation and decode the object it produced, if any
    pub(super) async fn apply<T: MappedInstance>(
        &self,
        operation: &'static str,
        guid: Option<&Guid>,
        mutation: Mutation,
    ) -> RepositoryResult<Option<T>> {
        let document = self
            .engine
            .transact(mutation)
            .await
            .map_err(|e| RepositoryError::from_tx(operation, guid, e))?;
        decode(operation, guid, document)
    }

    /// Run a mutation and always wait for its outcome
    pub(super) async fn apply_and_confirm(
        &self,
        operation: &'static str,
        guid: &Guid,
        mutation: Mutation,
    ) -> RepositoryResult<()> {
        self.engine
            .transact_with_validation(mutation)
            .await
            .map_err(|e| RepositoryError::from_tx(operation, Some(guid), e))?;
        Ok(())
    }

    /// Submit a mutation without waiting; failures are only logged
    pub(super) fn apply_in_background(
        &self,
        operation: &'static str,
        guid: &Guid,
        mutation: Mutation,
    ) -> RepositoryResult<()> {
        self.engine
            .transact_without_validation(mutation)
            .map_err(|e| RepositoryError::from_tx(operation, Some(guid), e))?;
        Ok(())
    }
}

fn decode<T: MappedInstance>(
    operation: &'static str,
    guid: Option<&Guid>,
    document: Option<Document>,
) -> RepositoryResult<Option<T>> {
    document
        .map(|doc| T::from_document(&doc))
        .transpose()
        .context(operation, guid, None)
}

fn check_persistence_layer(store: &dyn DocumentStore) -> RepositoryResult<()> {
    match store
        .read_marker(PERSISTENCE_MARKER)
        .context("check_persistence_layer", None, None)?
    {
        Some(marker) => {
            let found = marker.get("version").and_then(|v| v.as_u64());
            if found != Some(u64::from(PERSISTENCE_LAYER_VERSION)) {
                return Err(RepositoryError::PersistenceLayerMismatch {
                    found: marker.to_string(),
                    expected: PERSISTENCE_LAYER_VERSION,
                });
            }
        }
        None => {
            store
                .write_marker(
                    PERSISTENCE_MARKER,
                    &json!({ "version": PERSISTENCE_LAYER_VERSION }),
                )
                .context("write_persistence_marker", None, None)?;
            info!(version = PERSISTENCE_LAYER_VERSION, "initialized persistence layer marker");
        }
    }
    Ok(())
}
