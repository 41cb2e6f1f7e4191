//! # verial-sync: Sync Engine for Verial Sync
//!
//! Batched, resumable synchronization of products, orders and customers
//! between the Verial ERP and a WooCommerce store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SyncDriver (optional background loop)            │  │
//! │  │     interval.tick() ──► process_next_batch(run_id) until done    │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                       SyncOrchestrator                           │  │
//! │  │  start_sync • process_next_batch • cancel_sync • complete        │  │
//! │  │  get_sync_status                                                 │  │
//! │  └──────┬──────────────────┬──────────────────────┬─────────────────┘  │
//! │         ▼                  ▼                      ▼                     │
//! │  ┌──────────────┐  ┌────────────────┐  ┌────────────────────────┐      │
//! │  │   Mappers    │  │  RetryPolicy   │  │   Ports (traits)       │      │
//! │  │              │  │                │  │                        │      │
//! │  │ Product      │  │ timeout +      │  │ ErpClient              │      │
//! │  │ Order        │  │ exponential    │  │ PlatformWriter         │      │
//! │  │ Customer     │  │ backoff        │  │ SyncEventEmitter       │      │
//! │  └──────┬───────┘  └────────────────┘  └────────────────────────┘      │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────┐  ┌──────────────────────────────┐    │
//! │  │ CategoryResolver             │  │ BatchCache                   │    │
//! │  │ index ► find ► create        │  │ categories, levels, tariffs  │    │
//! │  └──────────────────────────────┘  └──────────────────────────────┘    │
//! │                                                                         │
//! │  STATUS EVENTS (to the host via SyncEventEmitter):                     │
//! │  • status   - run created / finished                                   │
//! │  • progress - one per batch                                            │
//! │  • error    - fatal configuration or fetch failures                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`orchestrator`] - Run lifecycle and batch processing
//! - [`driver`] - Interval loop around `process_next_batch`
//! - [`mapper`] - Verial ⇄ store record mappers
//! - [`category`] - Category resolution and creation
//! - [`cache`] - Per-batch lookup cache
//! - [`retry`] - Bounded retry with timeout
//! - [`ports`] - Collaborator traits implemented by the host
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use verial_core::{EntityType, SyncDirection, SyncFilters};
//! use verial_db::{Database, DbConfig};
//! use verial_sync::{SyncConfig, SyncDriver, SyncOrchestrator};
//!
//! let config = Arc::new(SyncConfig::load(None)?);
//! let db = Arc::new(Database::new(DbConfig::new("./verial-sync.db")).await?);
//! let orchestrator = Arc::new(SyncOrchestrator::new(config, db, erp, store));
//!
//! let run = orchestrator
//!     .start_sync(EntityType::Products, SyncDirection::ErpToPlatform, SyncFilters::default())
//!     .await?;
//!
//! let (driver, handle) = SyncDriver::new(orchestrator.clone());
//! tokio::spawn(driver.run(run.id.clone()));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod category;
pub mod config;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod ports;
pub mod retry;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::BatchCache;
pub use category::{CategoryRef, CategoryResolver};
pub use config::SyncConfig;
pub use driver::{SyncDriver, SyncDriverHandle};
pub use error::{ErrorClass, SyncError, SyncResult};
pub use mapper::{CustomerMapper, OrderMapper, ProductDraft, ProductMapper, ProductReader};
pub use orchestrator::SyncOrchestrator;
pub use ports::{ErpClient, NoOpEmitter, PlatformWriter, SyncEventEmitter, WriteOutcome};
pub use retry::RetryPolicy;
