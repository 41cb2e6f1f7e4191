//! # Sync State Store
//!
//! Opens the SQLite file that holds run cursors, item errors and the
//! category index, and hands out the two repositories over it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Database::new(DbConfig)                                                │
//! │     open (rwc, WAL, foreign keys, busy_timeout)                        │
//! │     migrate  ──► sync_runs · sync_run_errors · category_mappings       │
//! │                                                                         │
//! │  db.sync_runs()          one writer per entity; the partial unique     │
//! │                          index rejects a second running run            │
//! │  db.category_mappings()  external category id ──► local term id        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The orchestrator commits once per batch, while `sync-report` may read
//! the same file. WAL keeps those reads off the writer's lock and
//! `busy_timeout` absorbs the short overlap on commit.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::DbResult;
use crate::migrations;
use crate::repository::category_map::CategoryMappingRepository;
use crate::repository::sync_run::SyncRunRepository;

/// Where the sync state lives and how many connections may touch it.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    in_memory: bool,
}

impl DbConfig {
    /// A file-backed store, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
            in_memory: false,
        }
    }

    /// A private in-memory store.
    ///
    /// Pinned to one connection: every new SQLite memory connection would
    /// otherwise see its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
            busy_timeout: Duration::from_secs(1),
            in_memory: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = if self.in_memory {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

/// Shared handle to the sync state store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            // An in-memory database disappears with its last connection
            .min_connections(if config.in_memory { 1 } else { 0 })
            .idle_timeout(if config.in_memory { None } else { Some(Duration::from_secs(600)) })
            .max_lifetime(if config.in_memory { None } else { Some(Duration::from_secs(1800)) })
            .connect_with(config.connect_options())
            .await?;

        migrations::run_migrations(&pool).await?;

        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "Sync state store ready"
        );

        Ok(Database { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run lifecycle, cursor commits and item errors.
    pub fn sync_runs(&self) -> SyncRunRepository {
        SyncRunRepository::new(self.pool.clone())
    }

    /// Persistent external → local category index.
    pub fn category_mappings(&self) -> CategoryMappingRepository {
        CategoryMappingRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
