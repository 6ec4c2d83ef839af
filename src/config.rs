//! Connector configuration
//!
//! Loaded from YAML:
//!
//! ```yaml
//! metadata_collection_id: 9f1c0e1e-1b7e-4c55-8d8c-3a0d6c1a2b3c
//! metadata_collection_name: local catalog
//! backend:
//!   sqlite:
//!     path: /var/lib/vellum/vellum.db
//! commit_mode: synchronous
//! commit_timeout_ms: 30000
//! max_page_size: 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or checking configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where documents are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Sqlite { path: PathBuf },
    InMemory,
}

/// How write operations wait for the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Wait until the transaction is indexed and return the new state
    #[default]
    Synchronous,
    /// Return as soon as the transaction is logged.
    ///
    /// Writes return no object, and a read issued straight after a write
    /// may not see it. Aborted transactions are only logged.
    Asynchronous,
}

fn default_commit_timeout_ms() -> u64 {
    30_000
}

fn default_max_page_size() -> usize {
    1000
}

/// Settings for one repository connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub metadata_collection_id: String,
    pub metadata_collection_name: String,
    pub backend: StoreBackend,
    #[serde(default)]
    pub commit_mode: CommitMode,
    #[serde(default = "default_commit_timeout_ms")]
    pub commit_timeout_ms: u64,
    /// Upper bound on the page size of any find or traversal result
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl ConnectorConfig {
    pub fn new(
        metadata_collection_id: impl Into<String>,
        metadata_collection_name: impl Into<String>,
        backend: StoreBackend,
    ) -> Self {
        Self {
            metadata_collection_id: metadata_collection_id.into(),
            metadata_collection_name: metadata_collection_name.into(),
            backend,
            commit_mode: CommitMode::default(),
            commit_timeout_ms: default_commit_timeout_ms(),
            max_page_size: default_max_page_size(),
        }
    }

    /// In-memory connector with a fresh collection id
    pub fn in_memory(metadata_collection_name: impl Into<String>) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            metadata_collection_name,
            StoreBackend::InMemory,
        )
    }

    pub fn with_commit_mode(mut self, commit_mode: CommitMode) -> Self {
        self.commit_mode = commit_mode;
        self
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metadata_collection_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "metadata_collection_id must not be empty".into(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid("max_page_size must be positive".into()));
        }
        if self.commit_timeout_ms == 0 {
            return Err(ConfigError::Invalid("commit_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
