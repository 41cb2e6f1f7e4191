//! # Category Resolver
//!
//! Maps Verial category references to WooCommerce term ids, creating the
//! terms that do not exist yet.
//!
//! ## Lookup Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     resolve(external_id, name)                          │
//! │                                                                         │
//! │  1. BatchCache ─────────────── hit (term or cached miss) ──► return    │
//! │        │                                                                │
//! │  2. category_mappings table ── hit ─────────────────────────► return   │
//! │        │                                                                │
//! │  3. Store: find by exact name ─┐                                        │
//! │        │                       ├── "Alimentación > Bebidas > Zumos"     │
//! │  4. Store: create ─────────────┘   each level found or created under   │
//! │        │                           the previous one; only the leaf is  │
//! │        │                           mapped                               │
//! │        ▼                                                                │
//! │  persist mapping (when an id exists) + cache ───────────────► return   │
//! │                                                                         │
//! │  No id and no name, or any failure ──► None (caller falls back to the  │
//! │  uncategorized term). Failures are cached as misses for the batch.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use verial_core::sanitize::clean_text;
use verial_db::CategoryMappingRepository;

use crate::cache::BatchCache;
use crate::error::{SyncError, SyncResult};
use crate::ports::PlatformWriter;

/// Separator between hierarchy levels in a category name.
pub const HIERARCHY_SEPARATOR: &str = " > ";

/// One category slot of a product record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryRef {
    pub external_id: Option<String>,
    pub name: Option<String>,
}

impl CategoryRef {
    pub fn new(external_id: Option<String>, name: Option<String>) -> Self {
        CategoryRef {
            external_id: external_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty() && id != "0"),
            name: name.and_then(|n| clean_text(&Value::String(n))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.external_id.is_none() && self.name.is_none()
    }
}

/// Resolves category references against the durable index and the store.
#[derive(Clone)]
pub struct CategoryResolver {
    mappings: CategoryMappingRepository,
    platform: Arc<dyn PlatformWriter>,
}

impl CategoryResolver {
    pub fn new(mappings: CategoryMappingRepository, platform: Arc<dyn PlatformWriter>) -> Self {
        CategoryResolver { mappings, platform }
    }

    /// Resolves one category reference. Never fails; see the module docs.
    pub async fn resolve(
        &self,
        external_id: Option<&str>,
        name: Option<&str>,
        cache: &mut BatchCache,
    ) -> Option<i64> {
        let key = BatchCache::category_key(external_id, name)?;

        if let Some(cached) = cache.category(&key) {
            return cached;
        }

        let resolved = match self.lookup_or_create(external_id, name, cache).await {
            Ok(term) => term,
            Err(e) => {
                warn!(
                    category = %key,
                    error = %e,
                    "Category resolution failed, treating as uncategorized"
                );
                None
            }
        };

        cache.remember_category(key, resolved);
        resolved
    }

    /// Resolves several slots, keeping the first occurrence of each term.
    pub async fn resolve_all(&self, refs: &[CategoryRef], cache: &mut BatchCache) -> Vec<i64> {
        let mut terms = Vec::with_capacity(refs.len());
        for slot in refs.iter().filter(|r| !r.is_empty()) {
            let term = self
                .resolve(slot.external_id.as_deref(), slot.name.as_deref(), cache)
                .await;
            if let Some(term) = term {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        terms
    }

    async fn lookup_or_create(
        &self,
        external_id: Option<&str>,
        name: Option<&str>,
        cache: &mut BatchCache,
    ) -> SyncResult<Option<i64>> {
        if let Some(id) = external_id {
            if let Some(term) = self.mappings.get_term_id(id).await? {
                debug!(external_id = %id, term, "Category found in index");
                return Ok(Some(term));
            }
        }

        let Some(name) = name else {
            debug!(external_id = ?external_id, "Unmapped category without a name");
            return Ok(None);
        };

        let term = self.find_or_create_path(name, cache).await?;

        if let Some(id) = external_id {
            self.mappings.put(id, term, Some(name)).await?;
        }

        Ok(Some(term))
    }

    /// Walks a `" > "` separated path, finding or creating each level.
    async fn find_or_create_path(&self, path: &str, cache: &mut BatchCache) -> SyncResult<i64> {
        let levels: Vec<&str> = path
            .split(HIERARCHY_SEPARATOR)
            .map(str::trim)
            .filter(|level| !level.is_empty())
            .collect();

        let mut parent: Option<i64> = None;
        for level in &levels {
            let term = match cache.level(parent, level) {
                Some(term) => term,
                None => {
                    let term = self
                        .platform
                        .find_or_create_category(level, parent)
                        .await
                        .map_err(|e| SyncError::CategoryResolution {
                            category: path.to_string(),
                            message: e.to_string(),
                        })?;
                    cache.remember_level(parent, level, term);
                    term
                }
            };
            parent = Some(term);
        }

        parent.ok_or_else(|| SyncError::CategoryResolution {
            category: path.to_string(),
            message: "empty category path".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::WriteOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use verial_core::{
        BatchRange, EntityType, NormalizedCustomer, NormalizedOrder, NormalizedProduct,
        SyncFilters,
    };
    use verial_db::{Database, DbConfig};

    /// Store that only knows categories and counts how often it is asked.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
        unavailable: bool,
    }

    #[async_trait]
    impl PlatformWriter for CountingStore {
        async fn upsert_product(&self, _product: &NormalizedProduct) -> SyncResult<WriteOutcome> {
            Ok(WriteOutcome::ok(1))
        }

        async fn upsert_order(&self, _order: &NormalizedOrder) -> SyncResult<WriteOutcome> {
            Ok(WriteOutcome::ok(1))
        }

        async fn upsert_customer(&self, _customer: &NormalizedCustomer) -> SyncResult<WriteOutcome> {
            Ok(WriteOutcome::ok(1))
        }

        async fn find_category(&self, _name: &str, _parent: Option<i64>) -> SyncResult<Option<i64>> {
            Ok(None)
        }

        async fn create_category(&self, _name: &str, _parent: Option<i64>) -> SyncResult<i64> {
            Ok(0)
        }

        async fn find_or_create_category(&self, _name: &str, _parent: Option<i64>) -> SyncResult<i64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable {
                return Err(SyncError::PlatformUnavailable("503".into()));
            }
            Ok(200 + call as i64)
        }

        async fn fetch_records(
            &self,
            _entity: EntityType,
            _range: BatchRange,
            _filters: &SyncFilters,
        ) -> SyncResult<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    async fn resolver(store: Arc<CountingStore>) -> (CategoryResolver, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (CategoryResolver::new(db.category_mappings(), store), db)
    }

    #[tokio::test]
    async fn test_second_lookup_in_batch_is_served_from_cache() {
        let store = Arc::new(CountingStore::default());
        let (resolver, db) = resolver(store.clone()).await;
        let mut cache = BatchCache::new();

        let first = resolver.resolve(Some("12"), Some("Bebidas"), &mut cache).await;
        assert_eq!(first, Some(200));
        assert_eq!(db.category_mappings().get_term_id("12").await.unwrap(), Some(200));

        // Re-point the index: the cached term must still win inside the batch
        db.category_mappings().put("12", 999, None).await.unwrap();

        let second = resolver.resolve(Some("12"), Some("Bebidas"), &mut cache).await;
        assert_eq!(second, Some(200));
        assert_eq!(cache.hits(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        // A fresh batch consults the index again
        let mut next_batch = BatchCache::new();
        let third = resolver.resolve(Some("12"), Some("Bebidas"), &mut next_batch).await;
        assert_eq!(third, Some(999));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_cached_as_miss() {
        let store = Arc::new(CountingStore {
            unavailable: true,
            ..CountingStore::default()
        });
        let (resolver, db) = resolver(store.clone()).await;
        let mut cache = BatchCache::new();

        assert_eq!(resolver.resolve(Some("5"), Some("Hogar"), &mut cache).await, None);
        assert_eq!(resolver.resolve(Some("5"), Some("Hogar"), &mut cache).await, None);

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(db.category_mappings().get_term_id("5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_all_deduplicates_slots() {
        let store = Arc::new(CountingStore::default());
        let (resolver, _db) = resolver(store.clone()).await;
        let mut cache = BatchCache::new();

        let refs = vec![
            CategoryRef::new(Some("1".into()), Some("Bebidas".into())),
            CategoryRef::new(Some("1".into()), Some("Bebidas".into())),
            CategoryRef::new(None, Some("Ofertas".into())),
            CategoryRef::new(Some("0".into()), None),
        ];
        let terms = resolver.resolve_all(&refs, &mut cache).await;

        assert_eq!(terms, vec![200, 201]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_category_ref_normalization() {
        let slot = CategoryRef::new(Some(" 12 ".into()), Some("  <b>Bebidas</b> ".into()));
        assert_eq!(slot.external_id.as_deref(), Some("12"));
        assert_eq!(slot.name.as_deref(), Some("Bebidas"));

        // Verial uses 0 for "no category"
        let empty = CategoryRef::new(Some("0".into()), Some("   ".into()));
        assert!(empty.is_empty());
    }
}
