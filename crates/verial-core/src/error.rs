//! # Error Types
//!
//! Record-level error types for verial-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  verial-core errors (this file)                                        │
//! │  └── ValidationError  - A record was rejected at the mapping boundary  │
//! │                                                                         │
//! │  verial-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  verial-sync errors (separate crate)                                   │
//! │  └── SyncError        - Config, transport, run-state failures          │
//! │                                                                         │
//! │  Flow: ValidationError → ItemError (run error list) → report           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `ValidationError` never escapes the batch loop. The orchestrator turns it
//! into an [`ItemError`](crate::types::ItemError) carrying [`reason_code`].
//!
//! [`reason_code`]: ValidationError::reason_code

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Why a single external or platform record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// None of the sku candidate fields held a usable value.
    #[error("record has no resolvable sku")]
    MissingSku,

    /// The record id is not a positive integer.
    ///
    /// ## When This Occurs
    /// - Order or customer without `Id`
    /// - Id is zero, negative, or not numeric
    #[error("invalid id: '{value}'")]
    InvalidId { value: String },

    /// Billing email is present but not shaped like an email.
    #[error("invalid email: '{value}'")]
    InvalidEmail { value: String },

    /// Payload is not a key/value object, or is structurally unusable.
    #[error("malformed record: {reason}")]
    Malformed { reason: String },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },
}

impl ValidationError {
    /// Creates a Malformed error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        ValidationError::Malformed {
            reason: reason.into(),
        }
    }

    /// Stable snake_case code stored in the run error list.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ValidationError::MissingSku => "missing_sku",
            ValidationError::InvalidId { .. } => "invalid_id",
            ValidationError::InvalidEmail { .. } => "invalid_email",
            ValidationError::Malformed { .. } => "malformed_record",
            ValidationError::Required { .. } => "required_field",
        }
    }
}

/// Convenience type alias for mapping results.
pub type MapResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================
