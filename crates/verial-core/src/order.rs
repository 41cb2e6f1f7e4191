//! # Order Records
//!
//! Normalized orders plus the fixed status table shared by both directions.
//!
//! ## Status Table
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  WooCommerce      Verial name      Verial code      │
//! │  ────────────     ────────────     ───────────      │
//! │  pending     ◄──► pendiente            0            │
//! │  processing  ◄──► en_proceso           1            │
//! │  completed   ◄──► completado           2            │
//! │  cancelled   ◄──► cancelado            3            │
//! │  refunded    ◄──► devuelto             4            │
//! │  failed      ◄──► fallido              5            │
//! │                                                      │
//! │  anything else ──► pending                          │
//! └──────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::Money;
use crate::record::scalar_to_string;
use crate::types::RecordSyncStatus;

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
    Failed,
}

/// `(status, platform name, ERP name, ERP code)`.
static STATUS_TABLE: [(OrderStatus, &str, &str, i64); 6] = [
    (OrderStatus::Pending, "pending", "pendiente", 0),
    (OrderStatus::Processing, "processing", "en_proceso", 1),
    (OrderStatus::Completed, "completed", "completado", 2),
    (OrderStatus::Cancelled, "cancelled", "cancelado", 3),
    (OrderStatus::Refunded, "refunded", "devuelto", 4),
    (OrderStatus::Failed, "failed", "fallido", 5),
];

impl OrderStatus {
    /// WooCommerce name.
    pub fn as_platform(&self) -> &'static str {
        self.row().1
    }

    /// Verial name.
    pub fn as_erp_name(&self) -> &'static str {
        self.row().2
    }

    /// Verial numeric code.
    pub fn as_erp_code(&self) -> i64 {
        self.row().3
    }

    /// Reads a WooCommerce status (`wc-` prefix tolerated). Unknown → pending.
    pub fn from_platform(raw: &str) -> Self {
        let name = raw.trim().to_ascii_lowercase();
        let name = name.strip_prefix("wc-").unwrap_or(&name);
        STATUS_TABLE
            .iter()
            .find(|row| row.1 == name)
            .map(|row| row.0)
            .unwrap_or(OrderStatus::Pending)
    }

    /// Reads a Verial status given as a code or a name. Unknown → pending.
    pub fn from_erp(value: &Value) -> Self {
        let Some(raw) = scalar_to_string(value) else {
            return OrderStatus::Pending;
        };
        if let Ok(code) = raw.parse::<i64>() {
            return STATUS_TABLE
                .iter()
                .find(|row| row.3 == code)
                .map(|row| row.0)
                .unwrap_or(OrderStatus::Pending);
        }
        let name = raw.to_lowercase().replace(' ', "_");
        STATUS_TABLE
            .iter()
            .find(|row| row.2 == name || row.1 == name)
            .map(|row| row.0)
            .unwrap_or(OrderStatus::Pending)
    }

    fn row(&self) -> &'static (OrderStatus, &'static str, &'static str, i64) {
        // The table covers every variant
        &STATUS_TABLE[*self as usize]
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Address
// =============================================================================

/// Billing or shipping block. Every field already sanitized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub address_1: String,
    pub address_2: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    pub country: String,
    pub email: Option<String>,
    pub phone: String,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        *self == Address::default()
    }
}

// =============================================================================
// Lines
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// ERP article id, when known.
    pub product_id: Option<String>,
    pub sku: Option<String>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
    pub total: Money,
    pub tax: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingLine {
    pub method_id: String,
    pub method_title: String,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLine {
    pub name: String,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponLine {
    pub code: String,
    pub discount: Money,
}

// =============================================================================
// Normalized Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOrder {
    /// Positive ERP document id.
    pub id: i64,
    pub customer_id: Option<i64>,
    pub status: OrderStatus,
    pub currency: String,
    pub total: Money,
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub billing: Address,
    pub shipping_address: Address,
    pub line_items: Vec<LineItem>,
    pub shipping_lines: Vec<ShippingLine>,
    pub fee_lines: Vec<FeeLine>,
    pub coupon_lines: Vec<CouponLine>,
    pub created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub external_id: String,
    pub sync_status: RecordSyncStatus,
}

impl NormalizedOrder {
    /// Sum of line totals.
    pub fn lines_total(&self) -> Money {
        self.line_items
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.total)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
