//! # Tariff Price Resolution
//!
//! Extracts the effective sale price from a Verial tariff response.
//!
//! ## Accepted Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (a) wrapped     { "CondicionesTarifa": [ {..}, {..} ] }               │
//! │  (b) bare list   [ {..}, {..} ]                                        │
//! │  (c) single      { "Precio": 10.0, "Dto": 5 }                          │
//! │                                                                         │
//! │  All three normalize to a list of conditions, then:                    │
//! │                                                                         │
//! │   for condition in list:                                               │
//! │       price > 0 ?  ── no ──► keep scanning                             │
//! │          │ yes                                                          │
//! │          ▼                                                              │
//! │       FIRST MATCH WINS, stop                                           │
//! │          │                                                              │
//! │          ├── percent > 0   → base - base * pct / 100                   │
//! │          ├── per-unit > 0  → max(base - discount, 0)                   │
//! │          └── otherwise     → base                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The resolver holds no state. Callers that need caching keep their own map
//! keyed by external product id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::money::{percent_to_bps, Money};
use crate::sanitize::{clean_float, clean_money};

/// Keys that wrap the condition list in shape (a).
pub const CONDITION_LIST_FIELDS: &[&str] = &["conditions", "CondicionesTarifa", "Condiciones"];

/// Keys probed for a condition's price.
pub const CONDITION_PRICE_FIELDS: &[&str] = &["price", "Precio", "PVP"];

/// Keys probed for a percentage discount (12.5 = 12.5%).
pub const CONDITION_PERCENT_FIELDS: &[&str] = &["percent_discount", "Dto", "Descuento"];

/// Keys probed for an absolute per-unit discount.
pub const CONDITION_PER_UNIT_FIELDS: &[&str] = &["per_unit_discount", "DtoEurosXUd", "DescuentoUnidad"];

// =============================================================================
// Types
// =============================================================================

/// One priced rule from a tariff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffCondition {
    pub price: Money,
    pub percent_discount: Option<f64>,
    pub per_unit_discount: Option<Money>,
}

impl TariffCondition {
    /// Reads a condition object. `None` unless the price is strictly positive.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let price = probe(obj, CONDITION_PRICE_FIELDS)
            .and_then(clean_money)
            .filter(Money::is_positive)?;

        Some(TariffCondition {
            price,
            percent_discount: probe(obj, CONDITION_PERCENT_FIELDS)
                .and_then(clean_float)
                .filter(|pct| *pct > 0.0),
            per_unit_discount: probe(obj, CONDITION_PER_UNIT_FIELDS)
                .and_then(clean_money)
                .filter(Money::is_positive),
        })
    }

    /// Price after this condition's discount.
    pub fn effective_price(&self) -> Money {
        if let Some(pct) = self.percent_discount {
            self.price
                .apply_percentage_discount(percent_to_bps(pct))
                .clamp_non_negative()
        } else if let Some(discount) = self.per_unit_discount {
            (self.price - discount).clamp_non_negative()
        } else {
            self.price
        }
    }
}

/// Outcome of [`resolve_price`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceResolution {
    pub found: bool,
    pub base_price: Option<Money>,
    pub effective_price: Option<Money>,
}

impl PriceResolution {
    /// No usable condition.
    pub fn not_found() -> Self {
        PriceResolution::default()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolves the effective price from any accepted tariff shape.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use verial_core::price::resolve_price;
///
/// let resolution = resolve_price(&json!([
///     { "Precio": 0 },
///     { "Precio": "20,00", "Dto": 10 },
///     { "Precio": 5 },
/// ]));
/// assert!(resolution.found);
/// assert_eq!(resolution.base_price.unwrap().cents(), 2000);
/// assert_eq!(resolution.effective_price.unwrap().cents(), 1800);
/// ```
pub fn resolve_price(input: &Value) -> PriceResolution {
    let selected = conditions(input)
        .into_iter()
        .find_map(TariffCondition::from_value);

    match selected {
        Some(condition) => PriceResolution {
            found: true,
            base_price: Some(condition.price),
            effective_price: Some(condition.effective_price()),
        },
        None => PriceResolution::not_found(),
    }
}

/// Normalizes the three input shapes into an ordered list of candidates.
fn conditions(input: &Value) -> Vec<&Value> {
    match input {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => {
            let wrapped = CONDITION_LIST_FIELDS.iter().find_map(|key| obj.get(*key));
            match wrapped {
                Some(Value::Array(items)) => items.iter().collect(),
                Some(single @ Value::Object(_)) => vec![single],
                Some(_) => Vec::new(),
                None => vec![input],
            }
        }
        _ => Vec::new(),
    }
}

fn probe<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_invariance() {
        let condition = json!({ "Precio": 25.0, "Dto": 20 });
        let wrapped = resolve_price(&json!({ "CondicionesTarifa": [condition.clone()] }));
        let bare = resolve_price(&json!([condition.clone()]));
        let single = resolve_price(&condition);

        assert_eq!(wrapped, bare);
        assert_eq!(bare, single);
        assert_eq!(single.effective_price, Some(Money::from_cents(2000)));
    }

    #[test]
    fn test_skips_non_positive_and_non_numeric_prices() {
        let resolution = resolve_price(&json!({
            "conditions": [
                { "price": -3 },
                { "price": "abc" },
                { "price": 0 },
                { "price": 12.5 },
                { "price": 99 }
            ]
        }));
        assert!(resolution.found);
        assert_eq!(resolution.base_price, Some(Money::from_cents(1250)));
        assert_eq!(resolution.effective_price, Some(Money::from_cents(1250)));
    }

    #[test]
    fn test_per_unit_discount_clamps_at_zero() {
        let resolution = resolve_price(&json!([{ "PVP": 4, "DtoEurosXUd": 6 }]));
        assert_eq!(resolution.effective_price, Some(Money::zero()));

        let resolution = resolve_price(&json!([{ "PVP": 10, "DescuentoUnidad": "2,5" }]));
        assert_eq!(resolution.effective_price, Some(Money::from_cents(750)));
    }

    #[test]
    fn test_percentage_takes_precedence_over_per_unit() {
        let resolution = resolve_price(&json!([{ "price": 100, "percent_discount": 10, "per_unit_discount": 50 }]));
        assert_eq!(resolution.effective_price, Some(Money::from_cents(9000)));
    }

    #[test]
    fn test_not_found() {
        assert!(!resolve_price(&json!([])).found);
        assert!(!resolve_price(&json!({ "Condiciones": [] })).found);
        assert!(!resolve_price(&json!("10")).found);
        assert_eq!(resolve_price(&json!(null)), PriceResolution::not_found());
    }
}
