//! Per-credential request counting.
//!
//! One row per API key. Every completed run bumps `request_count` with a
//! single upsert, so concurrent writers never lose an update.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row};
use serde::Serialize;

use crate::error::UsageError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS api_key_usage (
    key TEXT PRIMARY KEY,
    request_count INTEGER NOT NULL,
    last_used_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_api_key_usage_last_used ON api_key_usage(last_used_at DESC);
"#;

/// Usage counters for one credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub key: String,
    pub request_count: u64,
    pub last_used_at: DateTime<Utc>,
}

impl UsageRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let last_used: String = row.get(2)?;
        let last_used_at = DateTime::parse_from_rfc3339(&last_used)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?;
        Ok(Self {
            key: row.get(0)?,
            request_count: row.get::<_, i64>(1)?.max(0) as u64,
            last_used_at,
        })
    }
}

/// SQLite usage table with connection-per-call access.
#[derive(Debug)]
pub struct UsageStore {
    path: PathBuf,
}

impl UsageStore {
    /// Open database at path, creating if necessary
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create usage database directory")?;
        }

        let store = Self { path };
        store.initialize()?;
        Ok(store)
    }

    /// Fresh database in the temp directory, unique per call.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let db_name = format!("synthgenie_usage_{}_{}.db", std::process::id(), unique_id);
        Self::open(std::env::temp_dir().join(db_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a connection with WAL mode and busy timeout
    pub fn conn(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open usage database: {:?}", self.path))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        Ok(conn)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize usage schema")?;
        Ok(())
    }

    /// Increment-or-insert the counter for `key` and return the new row.
    pub fn increment(&self, key: &str) -> Result<UsageRecord> {
        let conn = self.conn()?;
        // Fixed width so text order matches time order
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        conn.query_row(
            "INSERT INTO api_key_usage (key, request_count, last_used_at) VALUES (?1, 1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                 request_count = request_count + 1,
                 last_used_at = excluded.last_used_at
             RETURNING key, request_count, last_used_at",
            (key, &now),
            UsageRecord::from_row,
        )
        .context("Failed to increment usage")
    }

    pub fn get(&self, key: &str) -> Result<Option<UsageRecord>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT key, request_count, last_used_at FROM api_key_usage WHERE key = ?1",
            [key],
            UsageRecord::from_row,
        )
        .optional()
        .context("Failed to read usage")
    }

    /// Every row, most recently used first.
    pub fn list(&self) -> Result<Vec<UsageRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, request_count, last_used_at FROM api_key_usage
             ORDER BY last_used_at DESC",
        )?;
        let rows = stmt
            .query_map([], UsageRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

/// Counts completed runs per credential.
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn record(&self, key: &str) -> Result<UsageRecord, UsageError>;
}

/// [`UsageTracker`] over a [`UsageStore`], off the async runtime.
#[derive(Debug, Clone)]
pub struct SqliteUsageTracker {
    store: Arc<UsageStore>,
}

impl SqliteUsageTracker {
    pub fn new(store: UsageStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &UsageStore {
        &self.store
    }
}

#[async_trait]
impl UsageTracker for SqliteUsageTracker {
    async fn record(&self, key: &str) -> Result<UsageRecord, UsageError> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.increment(&key))
            .await
            .map_err(|e| UsageError::Join(e.to_string()))?
            .map_err(|e| UsageError::Store(format!("{:#}", e)))
    }
}
