//! SQLite storage backend for Vellum
//!
//! Every write appends a row to `documents` keyed by `(key, tx_id)`, so each
//! row is one version of a logical document. A snapshot sees, per key, the
//! row with the highest `tx_id` not above its basis whose `valid_time` is not
//! after its as-of time. Only eviction (purge) deletes rows.
//!
//! Transactions are logged to `tx_log` on submission and applied in log
//! order by a single indexer thread, which publishes the highest indexed id
//! on a watch channel.

use super::traits::{
    DocFilter, Document, DocumentStore, OpenStore, Snapshot, SnapshotBasis, StorageError,
    StorageResult, StoredDocument, TransactionFunction, TransactionReceipt, TxAbort, TxContext,
    TxId, TxOutcome,
};
use crate::graph::now_micros;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const OUTCOME_PENDING: &str = "pending";
const OUTCOME_COMMITTED: &str = "committed";
const OUTCOME_ABORTED: &str = "aborted";

/// Re-check interval when the watermark has passed a still-pending transaction
const PENDING_POLL: Duration = Duration::from_millis(1);

/// Marker documents live outside the transaction log at tx 0
const MARKER_TX: TxId = 0;

const DOC_COLUMNS: &str =
    "d.key, d.tx_id, d.valid_time, d.type_name, d.status, d.ref1, d.ref2, d.body_json";

/// Latest version per key within a basis; `?1` is the tx basis, `?2` the as-of time
const EFFECTIVE_CLAUSE: &str = "d.tx_id <= ?1 AND d.valid_time <= ?2 AND NOT EXISTS (
        SELECT 1 FROM documents n
        WHERE n.key = d.key AND n.tx_id <= ?1 AND n.valid_time <= ?2 AND n.tx_id > d.tx_id
    )";

type DocRow = (
    String,
    i64,
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
);

/// State shared between the store handle and its indexer thread
struct StoreInner {
    conn: Mutex<Connection>,
    functions: DashMap<String, Arc<dyn TransactionFunction>>,
    watermark: watch::Sender<TxId>,
    open_snapshots: DashMap<u64, Snapshot>,
    next_snapshot: AtomicU64,
}

/// SQLite-backed bitemporal document store
///
/// Thread-safe via internal mutex on the connection. Dropping the store
/// closes the queue and joins the indexer thread.
pub struct SqliteStore {
    inner: Arc<StoreInner>,
    queue: Option<mpsc::UnboundedSender<TxId>>,
    indexer: Option<JoinHandle<()>>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- One row per version of a logical document
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT NOT NULL,
                tx_id INTEGER NOT NULL,
                valid_time INTEGER NOT NULL,
                type_name TEXT NOT NULL,
                status TEXT NOT NULL,
                ref1 TEXT,
                ref2 TEXT,
                body_json TEXT NOT NULL,
                PRIMARY KEY (key, tx_id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(type_name);
            CREATE INDEX IF NOT EXISTS idx_documents_ref1 ON documents(ref1);
            CREATE INDEX IF NOT EXISTS idx_documents_ref2 ON documents(ref2);

            -- Durable transaction log, applied in tx_id order
            CREATE TABLE IF NOT EXISTS tx_log (
                tx_id INTEGER PRIMARY KEY AUTOINCREMENT,
                function TEXT NOT NULL,
                args_json TEXT NOT NULL,
                submitted_at INTEGER NOT NULL,
                tx_time INTEGER,
                indexed_at INTEGER,
                outcome TEXT NOT NULL DEFAULT 'pending',
                outcome_json TEXT
            );

            CREATE TABLE IF NOT EXISTS tx_functions (
                name TEXT PRIMARY KEY,
                definition TEXT NOT NULL,
                installed_at INTEGER NOT NULL
            );

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;

        let indexed: TxId = conn.query_row(
            "SELECT COALESCE(MAX(tx_id), 0) FROM tx_log WHERE outcome != ?1",
            params![OUTCOME_PENDING],
            |row| row.get(0),
        )?;
        let last_tx_time: i64 = conn.query_row(
            "SELECT COALESCE(MAX(tx_time), 0) FROM tx_log",
            [],
            |row| row.get(0),
        )?;

        let (watermark, _) = watch::channel(indexed);
        let inner = Arc::new(StoreInner {
            conn: Mutex::new(conn),
            functions: DashMap::new(),
            watermark,
            open_snapshots: DashMap::new(),
            next_snapshot: AtomicU64::new(1),
        });

        let (queue, receiver) = mpsc::unbounded_channel();
        let indexer_inner = Arc::clone(&inner);
        let indexer = std::thread::Builder::new()
            .name("vellum-indexer".into())
            .spawn(move || run_indexer(indexer_inner, receiver, last_tx_time))?;

        debug!(indexed, "opened sqlite store");
        Ok(Self {
            inner,
            queue: Some(queue),
            indexer: Some(indexer),
        })
    }

    fn enqueue(&self, tx_id: TxId) -> StorageResult<()> {
        self.queue
            .as_ref()
            .ok_or(StorageError::IndexerStopped)?
            .send(tx_id)
            .map_err(|_| StorageError::IndexerStopped)
    }

    fn check_open(&self, snapshot: &Snapshot) -> StorageResult<()> {
        if self.inner.open_snapshots.contains_key(&snapshot.id) {
            Ok(())
        } else {
            Err(StorageError::SnapshotClosed(snapshot.id))
        }
    }

    /// Final outcome of a logged transaction; `None` while it is still pending
    fn outcome(&self, tx_id: TxId) -> StorageResult<Option<TxOutcome>> {
        let conn = self.inner.lock_conn();
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT outcome, outcome_json FROM tx_log WHERE tx_id = ?1",
                params![tx_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((outcome, _)) if outcome == OUTCOME_PENDING => Ok(None),
            Some((outcome, _)) if outcome == OUTCOME_COMMITTED => Ok(Some(TxOutcome::Committed)),
            Some((_, Some(json))) => Ok(Some(TxOutcome::Aborted(serde_json::from_str(&json)?))),
            Some((outcome, None)) => Ok(Some(TxOutcome::Aborted(TxAbort::Storage(format!(
                "transaction ended as '{}' without a reason",
                outcome
            ))))),
            None => Err(StorageError::UnknownTransaction(tx_id)),
        }
    }

    async fn wait_for_watermark(&self, tx_id: TxId, timeout: Duration) -> StorageResult<()> {
        let mut watermark = self.inner.watermark.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            watermark.wait_for(|w| *w >= tx_id).await.map(|_| ())
        })
        .await;
        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(StorageError::IndexerStopped),
            Err(_) => Err(StorageError::CommitTimeout(tx_id)),
        }
    }
}

impl StoreInner {
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one logged transaction
    fn index(&self, tx_id: TxId, last_tx_time: &mut i64) -> StorageResult<()> {
        let mut conn = self.lock_conn();

        let (function, args_json, outcome): (String, String, String) = conn
            .query_row(
                "SELECT function, args_json, outcome FROM tx_log WHERE tx_id = ?1",
                params![tx_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or(StorageError::UnknownTransaction(tx_id))?;

        if outcome != OUTCOME_PENDING {
            debug!(tx_id, "transaction already indexed");
            return Ok(());
        }

        let args: Vec<Value> = serde_json::from_str(&args_json)?;
        let tx_time = next_tx_time(*last_tx_time);
        let installed = self.functions.get(&function).map(|f| Arc::clone(f.value()));

        let tx = conn.transaction()?;
        let result = match installed {
            Some(f) => {
                let mut ctx = SqliteTxContext {
                    conn: &tx,
                    tx_id,
                    tx_time,
                };
                f.apply(&mut ctx, &args)
            }
            None => Err(TxAbort::Invalid(format!(
                "function '{}' is not installed",
                function
            ))),
        };

        match result {
            Ok(()) => {
                tx.execute(
                    "UPDATE tx_log SET outcome = ?2, tx_time = ?3, indexed_at = ?4 WHERE tx_id = ?1",
                    params![tx_id, OUTCOME_COMMITTED, tx_time, to_micros(now_micros())],
                )?;
                tx.commit()?;
                *last_tx_time = tx_time;
                debug!(tx_id, function = %function, "transaction committed");
            }
            Err(abort) => {
                tx.rollback()?;
                warn!(tx_id, function = %function, reason = %abort, "transaction aborted");
                record_abort(&conn, tx_id, &abort)?;
            }
        }
        Ok(())
    }
}

fn record_abort(conn: &Connection, tx_id: TxId, abort: &TxAbort) -> StorageResult<()> {
    conn.execute(
        "UPDATE tx_log SET outcome = ?2, outcome_json = ?3, indexed_at = ?4 WHERE tx_id = ?1",
        params![
            tx_id,
            OUTCOME_ABORTED,
            serde_json::to_string(abort)?,
            to_micros(now_micros())
        ],
    )?;
    Ok(())
}

fn run_indexer(
    inner: Arc<StoreInner>,
    mut queue: mpsc::UnboundedReceiver<TxId>,
    mut last_tx_time: i64,
) {
    while let Some(tx_id) = queue.blocking_recv() {
        if let Err(e) = inner.index(tx_id, &mut last_tx_time) {
            error!(tx_id, error = %e, "failed to index transaction");
            let abort = TxAbort::Storage(e.to_string());
            if let Err(e) = record_abort(&inner.lock_conn(), tx_id, &abort) {
                error!(tx_id, error = %e, "failed to record transaction failure");
            }
        }
        inner.watermark.send_modify(|w| *w = (*w).max(tx_id));
    }
    debug!("indexer stopped");
}

/// Strictly increasing transaction clock in microseconds
fn next_tx_time(last: i64) -> i64 {
    to_micros(now_micros()).max(last + 1)
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(key: &str, micros: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StorageError::Corrupt {
        key: key.to_string(),
        reason: format!("valid time {} out of range", micros),
    })
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<DocRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn row_to_stored(row: DocRow) -> StorageResult<StoredDocument> {
    let (key, tx_id, valid_time, type_name, status, ref1, ref2, body_json) = row;
    let valid_time = from_micros(&key, valid_time)?;
    let body = serde_json::from_str(&body_json).map_err(|e| StorageError::Corrupt {
        key: key.clone(),
        reason: e.to_string(),
    })?;
    Ok(StoredDocument {
        document: Document {
            key,
            type_name,
            status,
            ref1,
            ref2,
            body,
        },
        tx_id,
        valid_time,
    })
}

fn select_effective(
    conn: &Connection,
    key: &str,
    basis: TxId,
    as_of: i64,
) -> StorageResult<Option<StoredDocument>> {
    let sql = format!(
        "SELECT {} FROM documents d WHERE d.key = ?3 AND {}",
        DOC_COLUMNS, EFFECTIVE_CLAUSE
    );
    let row = conn
        .query_row(&sql, params![basis, as_of, key], read_row)
        .optional()?;
    row.map(row_to_stored).transpose()
}

fn select_matching(
    conn: &Connection,
    basis: TxId,
    as_of: i64,
    filter: &DocFilter,
) -> StorageResult<Vec<StoredDocument>> {
    let mut sql = format!(
        "SELECT {} FROM documents d WHERE d.tx_id > ?3 AND {}",
        DOC_COLUMNS, EFFECTIVE_CLAUSE
    );
    let mut values: Vec<SqlValue> = vec![
        SqlValue::Integer(basis),
        SqlValue::Integer(as_of),
        SqlValue::Integer(MARKER_TX),
    ];

    if let Some(ref prefix) = filter.key_prefix {
        values.push(SqlValue::Text(prefix.clone()));
        sql.push_str(&format!(" AND substr(d.key, 1, length(?{0})) = ?{0}", values.len()));
    }
    push_in_clause(&mut sql, &mut values, "d.type_name", &filter.type_names);
    push_in_clause(&mut sql, &mut values, "d.status", &filter.statuses);
    if let Some(ref reference) = filter.reference {
        values.push(SqlValue::Text(reference.clone()));
        sql.push_str(&format!(" AND (d.ref1 = ?{0} OR d.ref2 = ?{0})", values.len()));
    }
    sql.push_str(" ORDER BY d.key");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(row_to_stored).collect()
}

fn push_in_clause(sql: &mut String, values: &mut Vec<SqlValue>, column: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let mut placeholders = Vec::with_capacity(items.len());
    for item in items {
        values.push(SqlValue::Text(item.clone()));
        placeholders.push(format!("?{}", values.len()));
    }
    sql.push_str(&format!(" AND {} IN ({})", column, placeholders.join(", ")));
}

fn select_history(
    conn: &Connection,
    key: &str,
    basis: TxId,
    from: i64,
    to: i64,
) -> StorageResult<Vec<StoredDocument>> {
    let sql = format!(
        "SELECT {} FROM documents d
         WHERE d.key = ?1 AND d.tx_id <= ?2 AND d.valid_time >= ?3 AND d.valid_time < ?4
         ORDER BY d.tx_id",
        DOC_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![key, basis, from, to], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(row_to_stored).collect()
}

/// Transaction context over an open SQLite transaction
struct SqliteTxContext<'a> {
    conn: &'a Connection,
    tx_id: TxId,
    tx_time: i64,
}

impl TxContext for SqliteTxContext<'_> {
    fn tx_id(&self) -> TxId {
        self.tx_id
    }

    fn tx_time(&self) -> DateTime<Utc> {
        // The clock only produces in-range values
        DateTime::from_timestamp_micros(self.tx_time).unwrap_or_else(now_micros)
    }

    fn get(&self, key: &str) -> StorageResult<Option<StoredDocument>> {
        select_effective(self.conn, key, TxId::MAX, i64::MAX)
    }

    fn history(&self, key: &str) -> StorageResult<Vec<StoredDocument>> {
        select_history(self.conn, key, TxId::MAX, i64::MIN, i64::MAX)
    }

    fn referencing(&self, reference: &str) -> StorageResult<Vec<StoredDocument>> {
        let filter = DocFilter::new().referencing(reference);
        select_matching(self.conn, TxId::MAX, i64::MAX, &filter)
    }

    fn put(&mut self, document: Document) -> StorageResult<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO documents
                (key, tx_id, valid_time, type_name, status, ref1, ref2, body_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                document.key,
                self.tx_id,
                self.tx_time,
                document.type_name,
                document.status,
                document.ref1,
                document.ref2,
                serde_json::to_string(&document.body)?,
            ],
        )?;
        Ok(())
    }

    fn evict(&mut self, key: &str) -> StorageResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM documents WHERE key = ?1", params![key])?)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    // === Snapshots ===

    fn open_snapshot(&self, basis: SnapshotBasis) -> StorageResult<Snapshot> {
        let indexed = self.indexed_watermark();
        let tx_id = match basis.tx_id {
            Some(requested) if requested > indexed => {
                return Err(StorageError::SnapshotUnavailable { requested, indexed })
            }
            Some(requested) => requested,
            None => indexed,
        };
        let snapshot = Snapshot {
            id: self.inner.next_snapshot.fetch_add(1, Ordering::Relaxed),
            tx_id,
            as_of: basis.as_of,
        };
        self.inner.open_snapshots.insert(snapshot.id, snapshot.clone());
        Ok(snapshot)
    }

    fn close_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        self.inner
            .open_snapshots
            .remove(&snapshot.id)
            .map(|_| ())
            .ok_or(StorageError::SnapshotClosed(snapshot.id))
    }

    // === Reads ===

    fn get_document(&self, snapshot: &Snapshot, key: &str) -> StorageResult<Option<StoredDocument>> {
        self.check_open(snapshot)?;
        let as_of = snapshot.as_of.map(to_micros).unwrap_or(i64::MAX);
        select_effective(&self.inner.lock_conn(), key, snapshot.tx_id, as_of)
    }

    fn query(&self, snapshot: &Snapshot, filter: &DocFilter) -> StorageResult<Vec<StoredDocument>> {
        self.check_open(snapshot)?;
        let as_of = snapshot.as_of.map(to_micros).unwrap_or(i64::MAX);
        select_matching(&self.inner.lock_conn(), snapshot.tx_id, as_of, filter)
    }

    fn history(
        &self,
        snapshot: &Snapshot,
        key: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<StoredDocument>> {
        self.check_open(snapshot)?;
        let from = from.map(to_micros).unwrap_or(i64::MIN);
        let to = to.map(to_micros).unwrap_or(i64::MAX);
        select_history(&self.inner.lock_conn(), key, snapshot.tx_id, from, to)
    }

    // === Transactions ===

    fn install_function(&self, function: Arc<dyn TransactionFunction>) -> StorageResult<bool> {
        let name = function.name().to_string();
        let definition = function.definition();

        let stored: Option<String> = {
            let conn = self.inner.lock_conn();
            let stored = conn
                .query_row(
                    "SELECT definition FROM tx_functions WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;
            if stored.as_deref() != Some(definition.as_str()) {
                conn.execute(
                    r#"
                    INSERT INTO tx_functions (name, definition, installed_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(name) DO UPDATE SET
                        definition = excluded.definition,
                        installed_at = excluded.installed_at
                    "#,
                    params![name, definition, to_micros(now_micros())],
                )?;
            }
            stored
        };

        let newly_loaded = self.inner.functions.insert(name.clone(), function).is_none();
        match stored {
            None => info!(function = %name, "installed transaction function"),
            Some(ref previous) if previous != &definition => {
                info!(function = %name, "updated transaction function definition")
            }
            Some(_) => debug!(function = %name, "transaction function already installed"),
        }
        Ok(stored.is_none() && newly_loaded)
    }

    fn submit_transaction(
        &self,
        function: &str,
        args: Vec<Value>,
    ) -> StorageResult<TransactionReceipt> {
        if !self.inner.functions.contains_key(function) {
            return Err(StorageError::FunctionNotInstalled(function.to_string()));
        }

        let submitted_at = now_micros();
        let tx_id = {
            let conn = self.inner.lock_conn();
            conn.execute(
                "INSERT INTO tx_log (function, args_json, submitted_at) VALUES (?1, ?2, ?3)",
                params![
                    function,
                    serde_json::to_string(&args)?,
                    to_micros(submitted_at)
                ],
            )?;
            let tx_id = conn.last_insert_rowid();
            // Queue order must match log order; enqueue before releasing the lock
            self.enqueue(tx_id)?;
            tx_id
        };

        debug!(tx_id, function, "transaction submitted");
        Ok(TransactionReceipt {
            tx_id,
            function: function.to_string(),
            submitted_at,
        })
    }

    async fn await_commit(
        &self,
        receipt: &TransactionReceipt,
        timeout: Duration,
    ) -> StorageResult<TxOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.wait_for_watermark(receipt.tx_id, remaining).await?;
            if let Some(outcome) = self.outcome(receipt.tx_id)? {
                return Ok(outcome);
            }
            if remaining.is_zero() {
                return Err(StorageError::CommitTimeout(receipt.tx_id));
            }
            tokio::time::sleep(PENDING_POLL).await;
        }
    }

    fn resume_pending(&self) -> StorageResult<usize> {
        let pending: Vec<TxId> = {
            let conn = self.inner.lock_conn();
            let mut stmt =
                conn.prepare("SELECT tx_id FROM tx_log WHERE outcome = ?1 ORDER BY tx_id")?;
            let ids = stmt
                .query_map(params![OUTCOME_PENDING], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            for tx_id in &ids {
                self.enqueue(*tx_id)?;
            }
            ids
        };
        if !pending.is_empty() {
            info!(count = pending.len(), "resumed pending transactions");
        }
        Ok(pending.len())
    }

    fn indexed_watermark(&self) -> TxId {
        *self.inner.watermark.borrow()
    }

    async fn await_indexed(&self, timeout: Duration) -> StorageResult<TxId> {
        let latest: TxId = self.inner.lock_conn().query_row(
            "SELECT COALESCE(MAX(tx_id), 0) FROM tx_log",
            [],
            |row| row.get(0),
        )?;
        self.wait_for_watermark(latest, timeout).await?;
        Ok(latest)
    }

    // === Reserved documents ===

    fn read_marker(&self, name: &str) -> StorageResult<Option<Value>> {
        let key = crate::mapping::marker_key(name);
        let doc = select_effective(&self.inner.lock_conn(), &key, TxId::MAX, i64::MAX)?;
        Ok(doc.map(|d| d.document.body))
    }

    fn write_marker(&self, name: &str, value: &Value) -> StorageResult<()> {
        let key = crate::mapping::marker_key(name);
        self.inner.lock_conn().execute(
            r#"
            INSERT OR REPLACE INTO documents
                (key, tx_id, valid_time, type_name, status, ref1, ref2, body_json)
            VALUES (?1, ?2, 0, 'marker', 'active', NULL, NULL, ?3)
            "#,
            params![key, MARKER_TX, serde_json::to_string(value)?],
        )?;
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Closing the queue ends the indexer loop once it drains
        self.queue.take();
        if let Some(indexer) = self.indexer.take() {
            if indexer.join().is_err() {
                error!("indexer thread panicked");
            }
        }
    }
}
