//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  FatalConfig    │  │   TransientIo   │  │     State               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  ErpUnavailable │  │  AlreadyRunning         │ │
//! │  │  MissingErp...  │  │  PlatformUnav.. │  │  RunNotFound            │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  RunNotRunning          │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │   Resolution    │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Record         │  │  Category       │  │  Store                  │ │
//! │  │  (per item)     │  │  Tariff         │  │  ChannelError           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and Resolution errors never abort a batch: the first ends up in
//! the run's item error list, the second degrades to a fallback value.

use thiserror::Error;
use verial_core::{EntityType, ValidationError};
use verial_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Coarse classification used for handling decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A single record was rejected.
    Validation,
    /// A lookup (category, tariff) failed; a fallback is used.
    Resolution,
    /// Network or timeout failure; worth retrying.
    TransientIo,
    /// Configuration is unusable; nothing can run.
    FatalConfig,
    /// The request conflicts with the run state.
    State,
    /// Store failures and bugs.
    Internal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorClass::Validation => "validation",
            ErrorClass::Resolution => "resolution",
            ErrorClass::TransientIo => "transient_io",
            ErrorClass::FatalConfig => "fatal_config",
            ErrorClass::State => "state",
            ErrorClass::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// No ERP endpoint configured.
    #[error("ERP endpoint not configured. Set [erp] endpoint or VERIAL_ERP_URL.")]
    MissingErpEndpoint,

    /// ERP endpoint is not an http(s) URL.
    #[error("Invalid ERP URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The ERP call failed.
    #[error("ERP request failed: {0}")]
    ErpUnavailable(String),

    /// The store call failed.
    #[error("Platform request failed: {0}")]
    PlatformUnavailable(String),

    /// A call exceeded its timeout.
    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    /// The store answered but refused the write.
    #[error("Platform rejected {item}: {message}")]
    PlatformRejected { item: String, message: String },

    // =========================================================================
    // Record Errors
    // =========================================================================
    /// A record failed mapping.
    #[error(transparent)]
    Record(#[from] ValidationError),

    /// Category lookup or creation failed.
    #[error("Category resolution failed for '{category}': {message}")]
    CategoryResolution { category: String, message: String },

    /// Tariff lookup failed.
    #[error("Tariff resolution failed for product {product_id}: {message}")]
    TariffResolution { product_id: String, message: String },

    // =========================================================================
    // Run State Errors
    // =========================================================================
    /// A run for this entity is already running.
    ///
    /// ## When This Occurs
    /// - `start_sync` called twice without completing the first run
    /// - Two hosts racing on the same database (the partial unique index wins)
    #[error("A {entity} sync is already running")]
    AlreadyRunning { entity: EntityType },

    /// No run with this id.
    #[error("Sync run not found: {0}")]
    RunNotFound(String),

    /// The run already reached a terminal status.
    #[error("Sync run {id} is {status}, not running")]
    RunNotRunning { id: String, status: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Persistent store failure.
    #[error("Store error: {0}")]
    Store(DbError),

    /// Serialization of an outgoing payload failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Internal sync engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } if entity == "SyncRun" => SyncError::RunNotFound(id),
            other => SyncError::Store(other),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Classifies this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::InvalidConfig(_)
            | SyncError::MissingErpEndpoint
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_)
            | SyncError::ConfigSaveFailed(_) => ErrorClass::FatalConfig,

            SyncError::ErpUnavailable(_)
            | SyncError::PlatformUnavailable(_)
            | SyncError::Timeout { .. } => ErrorClass::TransientIo,

            SyncError::Record(_) | SyncError::PlatformRejected { .. } => ErrorClass::Validation,

            SyncError::CategoryResolution { .. } | SyncError::TariffResolution { .. } => {
                ErrorClass::Resolution
            }

            SyncError::AlreadyRunning { .. }
            | SyncError::RunNotFound(_)
            | SyncError::RunNotRunning { .. } => ErrorClass::State,

            SyncError::Store(e) if e.is_transient() => ErrorClass::TransientIo,
            SyncError::Store(_)
            | SyncError::SerializationFailed(_)
            | SyncError::ChannelError(_)
            | SyncError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Returns true if this error is recoverable and the operation can be retried.
    ///
    /// ## Retryable Errors
    /// - ERP and store connection failures
    /// - Timeouts
    /// - Busy/locked SQLite
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Rejected records
    /// - Run state conflicts
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::TransientIo
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        self.class() == ErrorClass::FatalConfig
    }

    /// Reason code stored with an item error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            SyncError::Record(e) => e.reason_code(),
            SyncError::PlatformRejected { .. } => "platform_rejected",
            SyncError::Timeout { .. } => "timeout",
            SyncError::ErpUnavailable(_) => "erp_unavailable",
            SyncError::PlatformUnavailable(_) => "platform_unavailable",
            SyncError::CategoryResolution { .. } => "category_unresolved",
            SyncError::TariffResolution { .. } => "tariff_unresolved",
            _ => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ErpUnavailable("connection reset".into()).is_retryable());
        assert!(SyncError::Timeout {
            operation: "fetch products 1-50".into(),
            secs: 30
        }
        .is_retryable());
        assert!(SyncError::Store(DbError::Unavailable("database is locked".into())).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingErpEndpoint.is_retryable());
        assert!(!SyncError::Record(ValidationError::MissingSku).is_retryable());
    }

    #[test]
    fn test_classes() {
        assert_eq!(SyncError::MissingErpEndpoint.class(), ErrorClass::FatalConfig);
        assert_eq!(
            SyncError::AlreadyRunning { entity: EntityType::Products }.class(),
            ErrorClass::State
        );
        assert_eq!(SyncError::Record(ValidationError::MissingSku).class(), ErrorClass::Validation);
        assert_eq!(
            SyncError::CategoryResolution {
                category: "Bebidas".into(),
                message: "HTTP 500".into()
            }
            .class(),
            ErrorClass::Resolution
        );
    }

    #[test]
    fn test_db_not_found_maps_to_run_not_found() {
        let err: SyncError = DbError::not_found("SyncRun", "abc").into();
        assert!(matches!(err, SyncError::RunNotFound(ref id) if id == "abc"));
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(SyncError::Record(ValidationError::MissingSku).reason_code(), "missing_sku");
        assert_eq!(
            SyncError::PlatformRejected {
                item: "SKU-1".into(),
                message: "duplicate sku".into()
            }
            .reason_code(),
            "platform_rejected"
        );
    }
}
