//! # verial-db: Persistence Layer for Verial Sync
//!
//! Durable sync state in SQLite, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Verial Sync Data Flow                            │
//! │                                                                         │
//! │  SyncOrchestrator / CategoryResolver                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     verial-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────────┐  ┌───────────┐  │   │
//! │  │   │   Database    │    │    Repositories     │  │Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                     │  │ (embedded)│  │   │
//! │  │   │               │    │ CategoryMappingRepo │  │           │  │   │
//! │  │   │ SqlitePool    │◄───│ SyncRunRepository   │  │ 001_init  │  │   │
//! │  │   └───────────────┘    └─────────────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SQLite: category_mappings · sync_runs · sync_run_errors        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Category index and sync run repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verial_core::{EntityType, SyncDirection, SyncFilters};
//! use verial_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("verial-sync.db")).await?;
//!
//! let run = db
//!     .sync_runs()
//!     .create(EntityType::Products, SyncDirection::ErpToPlatform, 50, &SyncFilters::default())
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category_map::{CategoryMapping, CategoryMappingRepository};
pub use repository::sync_run::{RunProgress, SyncRunRepository};
