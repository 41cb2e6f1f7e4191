//! Store errors, classified for the sync engine.
//!
//! The engine cares about three things: a run that does not exist, a second
//! running run for the same entity (single-flight index), and whether a
//! failed statement is worth retrying.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write, e.g. `idx_sync_runs_single_flight`.
    #[error("Unique constraint rejected {constraint}")]
    UniqueViolation { constraint: String },

    /// The pool could not hand out a connection, or the file is locked.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// A stored value could not be decoded (bad JSON in `filters`, etc.).
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: String, message: String },
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(constraint: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn corrupt(table: impl Into<String>, message: impl Into<String>) -> Self {
        DbError::Corrupt {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    /// True when the same statement may succeed a moment later.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Unavailable(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                // SQLite: "UNIQUE constraint failed: sync_runs.entity"
                if let Some(constraint) = message.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::duplicate(constraint)
                } else if message.contains("database is locked") || message.contains("database is busy") {
                    DbError::Unavailable(message.to_string())
                } else {
                    DbError::Query(message.to_string())
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Unavailable(err.to_string())
            }
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
