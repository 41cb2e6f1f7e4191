//! # Category Mapping Repository
//!
//! Durable index from Verial category ids to WooCommerce term ids.
//!
//! The per-batch cache in verial-sync is always consulted first; this table
//! is the second lookup and survives across batches and runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// One persisted mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryMapping {
    pub external_id: String,
    pub local_term_id: i64,
    pub external_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Repository for the `category_mappings` table.
#[derive(Debug, Clone)]
pub struct CategoryMappingRepository {
    pool: SqlitePool,
}

impl CategoryMappingRepository {
    /// Creates a new CategoryMappingRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryMappingRepository { pool }
    }

    /// Looks up a mapping by external id.
    pub async fn get(&self, external_id: &str) -> DbResult<Option<CategoryMapping>> {
        let mapping = sqlx::query_as::<_, CategoryMapping>(
            r#"
            SELECT external_id, local_term_id, external_name, created_at, updated_at
            FROM category_mappings
            WHERE external_id = ?1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }

    /// Returns only the local term id for an external id.
    pub async fn get_term_id(&self, external_id: &str) -> DbResult<Option<i64>> {
        Ok(self.get(external_id).await?.map(|m| m.local_term_id))
    }

    /// Inserts or replaces the mapping for `external_id`.
    ///
    /// `created_at` is kept on update; `external_name` is only overwritten
    /// when a new name is supplied.
    pub async fn put(
        &self,
        external_id: &str,
        local_term_id: i64,
        external_name: Option<&str>,
    ) -> DbResult<CategoryMapping> {
        let now = Utc::now();

        debug!(
            external_id = %external_id,
            local_term_id = local_term_id,
            "Persisting category mapping"
        );

        let mapping = sqlx::query_as::<_, CategoryMapping>(
            r#"
            INSERT INTO category_mappings (
                external_id, local_term_id, external_name, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (external_id) DO UPDATE SET
                local_term_id = excluded.local_term_id,
                external_name = COALESCE(excluded.external_name, category_mappings.external_name),
                updated_at = excluded.updated_at
            RETURNING external_id, local_term_id, external_name, created_at, updated_at
            "#,
        )
        .bind(external_id)
        .bind(local_term_id)
        .bind(external_name)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(mapping)
    }
}

// =============================================================================
// Tests
// =============================================================================
