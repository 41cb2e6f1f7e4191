//! # Repository Module
//!
//! Database repository implementations for Verial Sync.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  CategoryResolver                    SyncOrchestrator                  │
//! │       │                                   │                             │
//! │       │ db.category_mappings()            │ db.sync_runs()              │
//! │       ▼                                   ▼                             │
//! │  CategoryMappingRepository           SyncRunRepository                 │
//! │  ├── get(external_id)                ├── create(entity, ...)           │
//! │  ├── put(external_id, term, name)    ├── commit_batch(id, progress,    │
//! │  └── remove(external_id)             │                  errors)        │
//! │                                      ├── request_cancel(id)            │
//! │                                      ├── finish(id, status, error)     │
//! │                                      └── list_errors(id, limit)        │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  category_mappings                  sync_runs · sync_run_errors        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryMappingRepository`](category_map::CategoryMappingRepository) - Durable category id index
//! - [`SyncRunRepository`](sync_run::SyncRunRepository) - Run state, single-flight, item errors

pub mod category_map;
pub mod sync_run;
