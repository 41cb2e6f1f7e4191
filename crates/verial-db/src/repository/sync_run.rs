//! # Sync Run Repository
//!
//! Persistent state for sync runs and their per-item errors.
//!
//! ## Single-Flight
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   One Running Run Per Entity                            │
//! │                                                                         │
//! │  create(products) ──► INSERT status='running'                          │
//! │                            │                                            │
//! │                            ▼                                            │
//! │        UNIQUE INDEX idx_sync_runs_single_flight                        │
//! │             ON sync_runs(entity) WHERE status = 'running'              │
//! │                            │                                            │
//! │          ┌─────────────────┴─────────────────┐                          │
//! │          ▼                                   ▼                          │
//! │   no running products run            a running products run exists     │
//! │   → row inserted                     → DbError::UniqueViolation        │
//! │                                        (caller reports already_running)│
//! │                                                                         │
//! │  The orchestrator checks find_running() first; the index closes the    │
//! │  race between two hosts that checked at the same moment.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Once-Per-Batch Writes
//! `commit_batch` stores the new offset, the counters and the batch's item
//! errors in one transaction, so a crash mid-batch never leaves the offset
//! ahead of the recorded errors.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use verial_core::{EntityType, ItemError, RunCounters, RunStatus, SyncDirection, SyncFilters, SyncRun};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct SyncRunRecord {
    id: String,
    entity: EntityType,
    direction: SyncDirection,
    status: RunStatus,
    current_offset: i64,
    batch_size: i64,
    processed: i64,
    succeeded: i64,
    errored: i64,
    skipped: i64,
    filters: String,
    cancel_requested: bool,
    last_error: Option<String>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl SyncRunRecord {
    fn into_run(self) -> DbResult<SyncRun> {
        let filters: SyncFilters = serde_json::from_str(&self.filters)
            .map_err(|e| DbError::corrupt("sync_runs", format!("filters of {}: {}", self.id, e)))?;

        Ok(SyncRun {
            id: self.id,
            entity: self.entity,
            direction: self.direction,
            status: self.status,
            current_offset: self.current_offset,
            batch_size: self.batch_size,
            counters: RunCounters {
                processed: self.processed,
                succeeded: self.succeeded,
                errored: self.errored,
                skipped: self.skipped,
            },
            filters,
            cancel_requested: self.cancel_requested,
            last_error: self.last_error,
            started_at: self.started_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemErrorRecord {
    run_id: String,
    item: String,
    reason: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<ItemErrorRecord> for ItemError {
    fn from(row: ItemErrorRecord) -> Self {
        ItemError {
            run_id: row.run_id,
            item: row.item,
            reason: row.reason,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

const RUN_COLUMNS: &str = r#"
    id, entity, direction, status, current_offset, batch_size,
    processed, succeeded, errored, skipped, filters, cancel_requested,
    last_error, started_at, updated_at, finished_at
"#;

/// Absolute progress written at the end of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    pub current_offset: i64,
    pub counters: RunCounters,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for `sync_runs` and `sync_run_errors`.
#[derive(Debug, Clone)]
pub struct SyncRunRepository {
    pool: SqlitePool,
}

impl SyncRunRepository {
    /// Creates a new SyncRunRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncRunRepository { pool }
    }

    /// Creates a running run at offset 0.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when a run for `entity` is already running.
    pub async fn create(
        &self,
        entity: EntityType,
        direction: SyncDirection,
        batch_size: i64,
        filters: &SyncFilters,
    ) -> DbResult<SyncRun> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let filters_json = serde_json::to_string(filters)
            .map_err(|e| DbError::corrupt("sync_runs", format!("serialize filters: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO sync_runs (
                id, entity, direction, status, current_offset, batch_size,
                filters, cancel_requested, started_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, 0, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(entity)
        .bind(direction)
        .bind(RunStatus::Running)
        .bind(batch_size)
        .bind(&filters_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation() => DbError::duplicate(format!("running {} sync run", entity)),
            err => err,
        })?;

        info!(run_id = %id, entity = %entity, direction = %direction, batch_size, "Sync run created");

        self.require(&id).await
    }

    /// Gets a run by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<SyncRun>> {
        let query = format!("SELECT {} FROM sync_runs WHERE id = ?1", RUN_COLUMNS);
        let record = sqlx::query_as::<_, SyncRunRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(SyncRunRecord::into_run).transpose()
    }

    /// Gets a run by id, failing with `NotFound` when absent.
    pub async fn require(&self, id: &str) -> DbResult<SyncRun> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("SyncRun", id))
    }

    /// Most recently started run for an entity, whatever its status.
    pub async fn latest_for_entity(&self, entity: EntityType) -> DbResult<Option<SyncRun>> {
        let query = format!(
            "SELECT {} FROM sync_runs WHERE entity = ?1 ORDER BY started_at DESC, rowid DESC LIMIT 1",
            RUN_COLUMNS
        );
        let record = sqlx::query_as::<_, SyncRunRecord>(&query)
            .bind(entity)
            .fetch_optional(&self.pool)
            .await?;

        record.map(SyncRunRecord::into_run).transpose()
    }

    /// The running run for an entity, if any.
    pub async fn find_running(&self, entity: EntityType) -> DbResult<Option<SyncRun>> {
        let query = format!(
            "SELECT {} FROM sync_runs WHERE entity = ?1 AND status = ?2 LIMIT 1",
            RUN_COLUMNS
        );
        let record = sqlx::query_as::<_, SyncRunRecord>(&query)
            .bind(entity)
            .bind(RunStatus::Running)
            .fetch_optional(&self.pool)
            .await?;

        record.map(SyncRunRecord::into_run).transpose()
    }

    /// Stores a batch's progress and item errors atomically.
    ///
    /// Only applies to running runs; returns false when the run was no longer
    /// running (nothing is written in that case).
    pub async fn commit_batch(
        &self,
        id: &str,
        progress: RunProgress,
        errors: &[ItemError],
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE sync_runs SET
                current_offset = ?2,
                processed = ?3,
                succeeded = ?4,
                errored = ?5,
                skipped = ?6,
                updated_at = ?7
            WHERE id = ?1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(progress.current_offset)
        .bind(progress.counters.processed)
        .bind(progress.counters.succeeded)
        .bind(progress.counters.errored)
        .bind(progress.counters.skipped)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for error in errors {
            sqlx::query(
                r#"
                INSERT INTO sync_run_errors (run_id, item, reason, message, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(id)
            .bind(&error.item)
            .bind(&error.reason)
            .bind(&error.message)
            .bind(error.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            run_id = %id,
            offset = progress.current_offset,
            errors = errors.len(),
            "Batch progress committed"
        );
        Ok(true)
    }

    /// Flags a running run for cancellation at its next batch boundary.
    ///
    /// Returns false when the run is not running.
    pub async fn request_cancel(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE sync_runs SET cancel_requested = 1, updated_at = ?2 WHERE id = ?1 AND status = 'running'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Moves a running run to a terminal status.
    ///
    /// Returns false when the run was not running anymore.
    pub async fn finish(&self, id: &str, status: RunStatus, last_error: Option<&str>) -> DbResult<bool> {
        if !status.is_terminal() {
            return Err(DbError::Query(format!("{} is not a terminal status", status)));
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE sync_runs SET
                status = ?2,
                last_error = COALESCE(?3, last_error),
                finished_at = ?4,
                updated_at = ?4
            WHERE id = ?1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(last_error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let finished = result.rows_affected() > 0;
        if finished {
            info!(run_id = %id, status = %status, "Sync run finished");
        }
        Ok(finished)
    }

    /// First `limit` errors of a run, in the order they were recorded.
    pub async fn list_errors(&self, run_id: &str, limit: u32) -> DbResult<Vec<ItemError>> {
        let rows = sqlx::query_as::<_, ItemErrorRecord>(
            r#"
            SELECT run_id, item, reason, message, created_at
            FROM sync_run_errors
            WHERE run_id = ?1
            ORDER BY id ASC
            LIMIT ?2
            "#,
        )
        .bind(run_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemError::from).collect())
    }

    /// Total number of errors recorded for a run.
    pub async fn count_errors(&self, run_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_run_errors WHERE run_id = ?1")
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
