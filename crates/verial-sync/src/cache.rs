//! # Batch Cache
//!
//! Lookups remembered for the lifetime of one batch: resolved categories
//! (including failed ones) and resolved tariff prices.
//!
//! A fresh cache is created at the start of every `process_next_batch` call
//! and dropped at its end, so nothing here outlives a batch. Durable category
//! mappings live in the `category_mappings` table instead.

use std::collections::HashMap;
use verial_core::PriceResolution;

/// Per-batch memo of category and price lookups.
#[derive(Debug, Default)]
pub struct BatchCache {
    /// External category id (or `name:<name>` when there is no id) → term.
    /// `None` records a failed resolution.
    categories: HashMap<String, Option<i64>>,

    /// `(parent term, level name)` → term, for hierarchy walks.
    levels: HashMap<(Option<i64>, String), i64>,

    /// External product id → resolved tariff price.
    prices: HashMap<String, PriceResolution>,

    hits: u64,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a category reference.
    ///
    /// The id wins; the name is only used when there is no id.
    pub fn category_key(external_id: Option<&str>, name: Option<&str>) -> Option<String> {
        match (external_id, name) {
            (Some(id), _) => Some(id.to_string()),
            (None, Some(name)) => Some(format!("name:{}", name)),
            (None, None) => None,
        }
    }

    /// Outer `None` means "not looked up yet"; `Some(None)` is a cached miss.
    pub fn category(&mut self, key: &str) -> Option<Option<i64>> {
        let cached = self.categories.get(key).copied();
        if cached.is_some() {
            self.hits += 1;
        }
        cached
    }

    pub fn remember_category(&mut self, key: impl Into<String>, term_id: Option<i64>) {
        self.categories.insert(key.into(), term_id);
    }

    pub fn level(&mut self, parent: Option<i64>, name: &str) -> Option<i64> {
        let cached = self.levels.get(&(parent, name.to_string())).copied();
        if cached.is_some() {
            self.hits += 1;
        }
        cached
    }

    pub fn remember_level(&mut self, parent: Option<i64>, name: &str, term_id: i64) {
        self.levels.insert((parent, name.to_string()), term_id);
    }

    pub fn price(&mut self, product_id: &str) -> Option<PriceResolution> {
        let cached = self.prices.get(product_id).copied();
        if cached.is_some() {
            self.hits += 1;
        }
        cached
    }

    pub fn remember_price(&mut self, product_id: impl Into<String>, resolution: PriceResolution) {
        self.prices.insert(product_id.into(), resolution);
    }

    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.levels.is_empty() && self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verial_core::Money;

    #[test]
    fn test_category_key() {
        assert_eq!(BatchCache::category_key(Some("12"), Some("Bebidas")).as_deref(), Some("12"));
        assert_eq!(BatchCache::category_key(None, Some("Bebidas")).as_deref(), Some("name:Bebidas"));
        assert_eq!(BatchCache::category_key(None, None), None);
    }

    #[test]
    fn test_misses_are_cached() {
        let mut cache = BatchCache::new();
        assert_eq!(cache.category("12"), None);

        cache.remember_category("12", None);
        assert_eq!(cache.category("12"), Some(None));

        cache.remember_category("13", Some(140));
        assert_eq!(cache.category("13"), Some(Some(140)));
        assert_eq!(cache.hits(), 2);
    }

    #[test]
    fn test_prices() {
        let mut cache = BatchCache::new();
        let resolution = PriceResolution {
            found: true,
            base_price: Some(Money::from_cents(1000)),
            effective_price: Some(Money::from_cents(900)),
        };
        cache.remember_price("42", resolution);
        assert_eq!(cache.price("42"), Some(resolution));
        assert_eq!(cache.price("43"), None);
    }
}
