//! # verial-core: Pure Mapping Primitives for Verial Sync
//!
//! Everything the sync engine needs to understand an ERP record without
//! touching the network or the database.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Verial Sync Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host (admin screens, scheduler)                 │   │
//! │  │     start_sync ──► process_next_batch ──► get_sync_status       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               verial-sync (orchestrator, mappers)               │   │
//! │  └───────────────┬─────────────────────────────────┬───────────────┘   │
//! │                  │                                 │                    │
//! │  ┌───────────────▼─────────────────────┐  ┌────────▼───────────────┐   │
//! │  │      ★ verial-core (THIS CRATE) ★   │  │       verial-db        │   │
//! │  │                                     │  │  category index, runs  │   │
//! │  │  record   sanitize   price   batch  │  └────────────────────────┘   │
//! │  │  money    catalog    order   types  │                               │
//! │  │                                     │                               │
//! │  │  NO I/O • NO DATABASE • NO NETWORK  │                               │
//! │  └─────────────────────────────────────┘                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`record`] - `ExternalRecord`, field probing over untyped ERP payloads
//! - [`sanitize`] - Type-aware coercion (sku, price, email, html, dates, ...)
//! - [`price`] - Tariff condition resolution (first match wins)
//! - [`batch`] - Batch ranges, size limits, bad-range skip list
//! - [`money`] - Integer-cents money
//! - [`catalog`], [`order`], [`customer`] - Normalized records
//! - [`types`] - Sync run vocabulary
//! - [`error`] - Record rejection reasons
//!
//! ## Example Usage
//!
//! ```rust
//! use serde_json::json;
//! use verial_core::price::resolve_price;
//! use verial_core::batch::BatchRangeCalculator;
//!
//! let tariff = resolve_price(&json!({ "Condiciones": [{ "Precio": 10, "Dto": 50 }] }));
//! assert_eq!(tariff.effective_price.unwrap().cents(), 500);
//!
//! let range = BatchRangeCalculator::new().next_range(0, 20);
//! assert_eq!((range.start, range.end), (1, 20));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod batch;
pub mod catalog;
pub mod customer;
pub mod error;
pub mod money;
pub mod order;
pub mod price;
pub mod record;
pub mod sanitize;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use batch::{BadRange, BatchLimits, BatchRange, BatchRangeCalculator, RangePlan};
pub use catalog::{NormalizedProduct, ProductOverrides, ProductType, StockStatus};
pub use customer::NormalizedCustomer;
pub use error::{MapResult, ValidationError};
pub use money::Money;
pub use order::{NormalizedOrder, OrderStatus};
pub use price::{resolve_price, PriceResolution};
pub use record::ExternalRecord;
pub use sanitize::{sanitize, validate, CleanValue, FieldKind};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Attribute name given to variations that arrive without attributes.
///
/// Its value is the variation sku, which makes every child distinguishable.
pub const SYNTHETIC_VARIATION_ATTRIBUTE: &str = "Variante";

/// How many item errors a status report carries by default.
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 20;

/// Reason code recorded when a batch range is skipped.
pub const RANGE_SKIPPED_REASON: &str = "range_skipped";
