//! # Ports
//!
//! The engine reaches the ERP, the store and the admin UI only through these
//! traits. Hosts inject implementations at construction time.
//!
//! ## Collaborators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Verial web service            SyncOrchestrator          WooCommerce  │
//! │  ┌──────────────────┐          ┌────────────────┐       ┌────────────┐ │
//! │  │    ErpClient     │◄─────────│                │──────►│ Platform   │ │
//! │  │                  │  fetch   │  one batch at  │ upsert│ Writer     │ │
//! │  │ fetch_records    │  tariffs │  a time        │ terms │            │ │
//! │  │ fetch_tariff_... │  push    │                │ fetch │ upsert_*   │ │
//! │  │ push_record      │          └───────┬────────┘       │ *_category │ │
//! │  └──────────────────┘                  │                │ fetch_...  │ │
//! │                                        ▼                └────────────┘ │
//! │                                 SyncEventEmitter                       │
//! │                                 (admin screens)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method returns [`SyncResult`]; implementations map their transport
//! failures to [`SyncError::ErpUnavailable`] / [`SyncError::PlatformUnavailable`]
//! so the retry layer can tell them apart from rejections.
//!
//! [`SyncError::ErpUnavailable`]: crate::error::SyncError::ErpUnavailable
//! [`SyncError::PlatformUnavailable`]: crate::error::SyncError::PlatformUnavailable

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use verial_core::{
    BatchOutcome, BatchRange, EntityType, ExternalRecord, NormalizedCustomer, NormalizedOrder,
    NormalizedProduct, SyncFilters, SyncRun,
};

use crate::error::SyncResult;

// =============================================================================
// ERP Client
// =============================================================================

/// Request/response access to the Verial web service.
#[async_trait]
pub trait ErpClient: Send + Sync {
    /// Fetches the records at positions `range.start..=range.end`.
    ///
    /// Returning fewer records than `range.size()` means the end of the
    /// data set was reached.
    async fn fetch_records(
        &self,
        entity: EntityType,
        range: BatchRange,
        filters: &SyncFilters,
    ) -> SyncResult<Vec<Value>>;

    /// Fetches the tariff conditions of one product for one customer
    /// (0 = general tariff). Any of the shapes `resolve_price` accepts.
    async fn fetch_tariff_conditions(&self, product_id: &str, customer_id: i64) -> SyncResult<Value>;

    /// Creates or updates a record in the ERP and returns its ERP id.
    async fn push_record(&self, entity: EntityType, record: &ExternalRecord) -> SyncResult<String>;
}

// =============================================================================
// Platform Writer
// =============================================================================

/// What the store answered for one write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Store id of the written entity.
    pub id: Option<i64>,
    /// Rejection message; the write did not happen.
    pub error: Option<String>,
}

impl WriteOutcome {
    /// Successful write.
    pub fn ok(id: i64) -> Self {
        WriteOutcome {
            id: Some(id),
            error: None,
        }
    }

    /// Rejected write.
    pub fn rejected(message: impl Into<String>) -> Self {
        WriteOutcome {
            id: None,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Write (and read-back) access to the store.
#[async_trait]
pub trait PlatformWriter: Send + Sync {
    /// Creates or updates a product, matched by sku.
    async fn upsert_product(&self, product: &NormalizedProduct) -> SyncResult<WriteOutcome>;

    /// Creates or updates an order, matched by its ERP id.
    async fn upsert_order(&self, order: &NormalizedOrder) -> SyncResult<WriteOutcome>;

    /// Creates or updates a customer, matched by email or ERP id.
    async fn upsert_customer(&self, customer: &NormalizedCustomer) -> SyncResult<WriteOutcome>;

    /// Finds a product category by exact name under `parent` (None = top level).
    async fn find_category(&self, name: &str, parent: Option<i64>) -> SyncResult<Option<i64>>;

    /// Creates a product category and returns its term id.
    async fn create_category(&self, name: &str, parent: Option<i64>) -> SyncResult<i64>;

    /// Finds a category or creates it when missing.
    async fn find_or_create_category(&self, name: &str, parent: Option<i64>) -> SyncResult<i64> {
        match self.find_category(name, parent).await? {
            Some(id) => Ok(id),
            None => self.create_category(name, parent).await,
        }
    }

    /// Reads store records at positions `range.start..=range.end`, as the
    /// store's own JSON representation. Used by the export direction.
    async fn fetch_records(
        &self,
        entity: EntityType,
        range: BatchRange,
        filters: &SyncFilters,
    ) -> SyncResult<Vec<Value>>;
}

// =============================================================================
// Event Emitter
// =============================================================================

/// Trait for emitting sync events (implemented by the admin integration).
pub trait SyncEventEmitter: Send + Sync {
    /// Emit a run status change.
    fn emit_status(&self, run: &SyncRun);

    /// Emit the outcome of one batch.
    fn emit_progress(&self, outcome: &BatchOutcome);

    /// Emit an error.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _run: &SyncRun) {}
    fn emit_progress(&self, _outcome: &BatchOutcome) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}
