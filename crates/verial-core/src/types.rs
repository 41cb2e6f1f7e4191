//! # Sync Run Types
//!
//! Shared vocabulary for sync runs: which entity, which direction, what state,
//! how far along, and what went wrong.
//!
//! ## Run Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncRun States                                 │
//! │                                                                         │
//! │                 start_sync()                                            │
//! │     ┌──────┐  ─────────────►  ┌─────────┐                               │
//! │     │ Idle │                  │ Running │ ◄── process_next_batch()      │
//! │     └──────┘                  └────┬────┘     (offset, counters)        │
//! │                                    │                                    │
//! │            ┌───────────────────────┼───────────────────────┐            │
//! │            ▼                       ▼                       ▼            │
//! │     ┌───────────┐           ┌───────────┐           ┌──────────┐        │
//! │     │ Completed │           │ Cancelled │           │  Failed  │        │
//! │     │ (done)    │           │ (flag set)│           │(last_err)│        │
//! │     └───────────┘           └───────────┘           └──────────┘        │
//! │                                                                         │
//! │  At most ONE Running run per EntityType (single-flight).               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::batch::BatchRange;

// =============================================================================
// Entity Type
// =============================================================================

/// Which family of records a run moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Products,
    Orders,
    Customers,
}

impl EntityType {
    /// All entity types, in the order admin screens list them.
    pub const ALL: [EntityType; 3] = [EntityType::Products, EntityType::Orders, EntityType::Customers];

    /// Stable lowercase name (`"products"`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Products => "products",
            EntityType::Orders => "orders",
            EntityType::Customers => "customers",
        }
    }

    /// Parses the lowercase name. Singular forms are accepted too.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "products" | "product" => Some(EntityType::Products),
            "orders" | "order" => Some(EntityType::Orders),
            "customers" | "customer" => Some(EntityType::Customers),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sync Direction
// =============================================================================

/// Which side is the source of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Import: Verial → WooCommerce.
    ErpToPlatform,
    /// Export: WooCommerce → Verial.
    PlatformToErp,
}

impl SyncDirection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::ErpToPlatform => "erp_to_platform",
            SyncDirection::PlatformToErp => "platform_to_erp",
        }
    }
}

impl Default for SyncDirection {
    fn default() -> Self {
        SyncDirection::ErpToPlatform
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Run Status
// =============================================================================

/// Lifecycle state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        }
    }

    /// Completed, cancelled and failed runs never change again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed)
    }
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Idle
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Per-Record Sync Status
// =============================================================================

/// Sync state carried on a normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordSyncStatus {
    /// Mapped, not yet written.
    Pending,
    /// Written to the target side.
    Synced,
    /// The write was rejected.
    Error,
}

impl Default for RecordSyncStatus {
    fn default() -> Self {
        RecordSyncStatus::Pending
    }
}

// =============================================================================
// Counters & Filters
// =============================================================================

/// Progress counters for a run (or the delta produced by one batch).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RunCounters {
    /// Records fetched and looked at (skipped ranges excluded).
    pub processed: i64,
    pub succeeded: i64,
    pub errored: i64,
    /// Records inside skipped bad ranges.
    pub skipped: i64,
}

impl RunCounters {
    /// Adds another set of counters into this one.
    pub fn absorb(&mut self, other: &RunCounters) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.errored += other.errored;
        self.skipped += other.skipped;
    }
}

/// Optional narrowing of the records a run touches, forwarded to the ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncFilters {
    /// Only records modified at or after this instant.
    #[ts(as = "Option<String>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<DateTime<Utc>>,

    /// Only products in this ERP category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    /// Only these external ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

impl SyncFilters {
    pub fn is_empty(&self) -> bool {
        self.modified_since.is_none() && self.category_id.is_none() && self.ids.is_empty()
    }
}

// =============================================================================
// Sync Run
// =============================================================================

/// Snapshot of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncRun {
    /// UUID v4.
    pub id: String,
    pub entity: EntityType,
    pub direction: SyncDirection,
    pub status: RunStatus,

    /// Number of positions already consumed; the next range starts at `current_offset + 1`.
    pub current_offset: i64,

    /// Clamped to the entity's limits at creation.
    pub batch_size: i64,

    pub counters: RunCounters,
    pub filters: SyncFilters,

    /// Set by `cancel_sync`, honoured at the next batch boundary.
    pub cancel_requested: bool,

    pub last_error: Option<String>,

    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncRun {
    /// Next range this run would request.
    pub fn next_range(&self) -> BatchRange {
        BatchRange::next(self.current_offset.max(0) as u64, self.batch_size.max(1) as u64)
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }
}

// =============================================================================
// Item Error
// =============================================================================

/// One per-item failure recorded against a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemError {
    pub run_id: String,

    /// External id, sku, or the skipped range (`"3201-3210"`).
    pub item: String,

    /// Stable snake_case reason (`missing_sku`, `range_skipped`, `write_failed`, ...).
    pub reason: String,

    pub message: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ItemError {
    pub fn new(
        run_id: impl Into<String>,
        item: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ItemError {
            run_id: run_id.into(),
            item: item.into(),
            reason: reason.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Batch Outcome & Status Report
// =============================================================================

/// Result of one `process_next_batch` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchOutcome {
    pub run_id: String,

    /// Range actually fetched; `None` when the batch only honoured a cancel
    /// or skipped ranges.
    pub range: Option<BatchRange>,

    /// Counters produced by this batch only.
    pub delta: RunCounters,

    /// Status after the batch.
    pub status: RunStatus,

    /// True once the run reached a terminal state.
    pub done: bool,
}

/// Latest run snapshot for an entity plus its first reported errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncStatusReport {
    pub entity: EntityType,
    pub run: Option<SyncRun>,
    pub errors: Vec<ItemError>,
    /// Total errors stored for the run (may exceed `errors.len()`).
    pub total_errors: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
