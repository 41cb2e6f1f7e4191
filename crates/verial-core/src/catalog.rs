//! # Catalog Records
//!
//! Platform-ready product shapes produced by the product mapper.
//!
//! ## Product Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Simple          Variable                     Bundle                    │
//! │  ───────         ─────────────────────        ────────────────────      │
//! │  sku             sku                          sku                       │
//! │  price           attributes (axes)            bundle                    │
//! │  stock           variations[]                 └── components[]          │
//! │                  ├── sku                          ├── sku               │
//! │                  ├── attributes (values)          └── quantity ≥ 1      │
//! │                  └── price / stock                                      │
//! │                                                                         │
//! │  Every shape: external_id + meta["_verial_product_id"] = ERP id        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::money::Money;
use crate::types::RecordSyncStatus;

/// Meta key carrying the ERP product id on the platform side.
pub const VERIAL_PRODUCT_ID_META: &str = "_verial_product_id";

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Simple,
    Variable,
    Bundle,
}

impl ProductType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductType::Simple => "simple",
            ProductType::Variable => "variable",
            ProductType::Bundle => "bundle",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(ProductType::Simple),
            "variable" => Some(ProductType::Variable),
            "bundle" | "pack" => Some(ProductType::Bundle),
            _ => None,
        }
    }
}

impl Default for ProductType {
    fn default() -> Self {
        ProductType::Simple
    }
}

/// Derived from the stock quantity, never read from the ERP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

impl StockStatus {
    pub fn from_quantity(quantity: i64) -> Self {
        if quantity > 0 {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    /// WooCommerce spelling (`instock` / `outofstock`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
        }
    }
}

// =============================================================================
// Components
// =============================================================================

/// Weight and size. Zero means "not provided".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub weight: f64,
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        self.weight == 0.0 && self.length == 0.0 && self.width == 0.0 && self.height == 0.0
    }
}

/// A product-level attribute. On variable products, `is_variation` marks a
/// variation axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAttribute {
    pub name: String,
    pub values: Vec<String>,
    pub is_variation: bool,
}

impl ProductAttribute {
    /// Appends a value unless already present.
    pub fn add_value(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }
}

/// A single `name = value` pair on a variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationAttribute {
    pub name: String,
    pub value: String,
}

/// One child of a variable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedVariation {
    pub sku: String,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub stock_quantity: i64,
    pub stock_status: StockStatus,
    pub attributes: Vec<VariationAttribute>,
    pub dimensions: Dimensions,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleComponent {
    pub sku: String,
    /// At least 1.
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub name: String,
    pub components: Vec<BundleComponent>,
}

// =============================================================================
// Normalized Product
// =============================================================================

/// A product ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    /// Business key. Never empty.
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub product_type: ProductType,
    pub price: Money,
    pub sale_price: Option<Money>,
    pub stock_quantity: i64,
    pub stock_status: StockStatus,
    pub dimensions: Dimensions,
    /// Local term ids, de-duplicated, first occurrence kept.
    pub category_ids: Vec<i64>,
    pub attributes: Vec<ProductAttribute>,
    pub variations: Vec<NormalizedVariation>,
    pub bundle: Option<Bundle>,
    pub external_id: String,
    pub meta: BTreeMap<String, String>,
    pub sync_status: RecordSyncStatus,
    pub last_sync: DateTime<Utc>,
}

impl NormalizedProduct {
    /// Sets the stock and re-derives the stock status.
    pub fn set_stock(&mut self, quantity: i64) {
        self.stock_quantity = quantity;
        self.stock_status = StockStatus::from_quantity(quantity);
    }

    /// Applies a tariff price: `sale_price` only when strictly below the base.
    pub fn apply_sale_price(&mut self, effective: Money) {
        if effective < self.price {
            self.sale_price = Some(effective.clamp_non_negative());
        }
    }

    /// Compares two products ignoring `last_sync`.
    pub fn same_content(&self, other: &NormalizedProduct) -> bool {
        let mut left = self.clone();
        left.last_sync = other.last_sync;
        left == *other
    }
}

// =============================================================================
// Overrides
// =============================================================================

/// Host-supplied values that win over whatever the ERP sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductOverrides {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<i64>,
    pub category_ids: Option<Vec<i64>>,
    pub product_type: Option<ProductType>,
}

impl ProductOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ProductOverrides::default()
    }

    /// Applies every set override.
    ///
    /// A price override drops a sale price that is no longer below it.
    pub fn apply(&self, product: &mut NormalizedProduct) {
        if let Some(name) = self.name.as_ref().filter(|n| !n.trim().is_empty()) {
            product.name = name.trim().to_string();
        }
        if let Some(price) = self.price {
            product.price = price.clamp_non_negative();
            if product.sale_price.is_some_and(|sale| sale >= product.price) {
                product.sale_price = None;
            }
        }
        if let Some(quantity) = self.stock_quantity {
            product.set_stock(quantity);
        }
        if let Some(ids) = &self.category_ids {
            let mut unique = Vec::with_capacity(ids.len());
            for id in ids {
                if !unique.contains(id) {
                    unique.push(*id);
                }
            }
            product.category_ids = unique;
        }
        if let Some(product_type) = self.product_type {
            product.product_type = product_type;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> NormalizedProduct {
        NormalizedProduct {
            sku: "SKU-1".into(),
            name: "Aceite".into(),
            description: None,
            short_description: None,
            product_type: ProductType::Simple,
            price: Money::from_cents(1000),
            sale_price: Some(Money::from_cents(800)),
            stock_quantity: 0,
            stock_status: StockStatus::OutOfStock,
            dimensions: Dimensions::default(),
            category_ids: vec![15],
            attributes: Vec::new(),
            variations: Vec::new(),
            bundle: None,
            external_id: "1".into(),
            meta: BTreeMap::new(),
            sync_status: RecordSyncStatus::Pending,
            last_sync: Utc::now(),
        }
    }

    #[test]
    fn test_stock_status_derivation() {
        assert_eq!(StockStatus::from_quantity(3), StockStatus::InStock);
        assert_eq!(StockStatus::from_quantity(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_quantity(-2).as_str(), "outofstock");
    }

    #[test]
    fn test_overrides() {
        let mut p = product();
        ProductOverrides {
            name: Some("  Aceite virgen ".into()),
            price: Some(Money::from_cents(700)),
            stock_quantity: Some(4),
            category_ids: Some(vec![3, 3, 9]),
            product_type: None,
        }
        .apply(&mut p);

        assert_eq!(p.name, "Aceite virgen");
        assert_eq!(p.price.cents(), 700);
        assert_eq!(p.sale_price, None);
        assert_eq!(p.stock_status, StockStatus::InStock);
        assert_eq!(p.category_ids, vec![3, 9]);
    }

    #[test]
    fn test_apply_sale_price_only_when_lower() {
        let mut p = product();
        p.sale_price = None;
        p.apply_sale_price(Money::from_cents(1000));
        assert_eq!(p.sale_price, None);
        p.apply_sale_price(Money::from_cents(900));
        assert_eq!(p.sale_price, Some(Money::from_cents(900)));
    }

    #[test]
    fn test_same_content_ignores_last_sync() {
        let a = product();
        let mut b = a.clone();
        b.last_sync = a.last_sync + chrono::Duration::seconds(30);
        assert!(a.same_content(&b));
        b.name = "Other".into();
        assert!(!a.same_content(&b));
    }
}
