//! # Money Module
//!
//! Provides the `Money` type for monetary values crossing the ERP boundary.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Verial sends "19,95", 19.95 or "19.950000" for the same price.        │
//! │  WooCommerce expects "19.95".                                          │
//! │                                                                         │
//! │  Parsing into f64 and writing back can produce 19.949999999999999      │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    parse once → 1995 cents → render "19.95" on the way out             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use verial_core::money::Money;
//!
//! let price = Money::parse("19,95").unwrap();
//! assert_eq!(price.cents(), 1995);
//! assert_eq!(price.to_decimal_string(), "19.95");
//!
//! let discounted = price.apply_percentage_discount(1000); // 10% off
//! assert_eq!(discounted.cents(), 1795);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so intermediate arithmetic can go below zero; fields declared
/// non-negative go through [`Money::clamp_non_negative`] before they are
/// stored on a normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount to cents, rounding half away from zero.
    ///
    /// Non-finite input (NaN, infinity) yields zero.
    ///
    /// ## Example
    /// ```rust
    /// use verial_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(10.005).cents(), 1001);
    /// assert_eq!(Money::from_decimal(f64::NAN).cents(), 0);
    /// ```
    pub fn from_decimal(amount: f64) -> Self {
        if !amount.is_finite() {
            return Money::zero();
        }
        // Nudge by a tiny epsilon so 10.005 (stored as 10.00499..) rounds up
        let scaled = amount * 100.0;
        let nudged = scaled + scaled.signum() * 1e-7;
        Money(nudged.round() as i64)
    }

    /// Parses a numeric-looking string.
    ///
    /// ## Accepted Shapes
    /// - `"19.95"`, `"19,95"`, `" 19.950000 "`
    /// - `"1.234,56"` (dot thousands, comma decimals)
    /// - `"1,234.56"` (comma thousands, dot decimals)
    /// - optional currency symbol or code around the number (`"€ 5"`, `"5 EUR"`)
    ///
    /// Returns `None` when no number can be read.
    pub fn parse(raw: &str) -> Option<Self> {
        parse_decimal(raw).map(Money::from_decimal)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value as a decimal amount (for ERP payloads and display).
    #[inline]
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is strictly positive.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Negative values become zero.
    #[inline]
    pub const fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            self
        }
    }

    /// Renders the amount the way WooCommerce stores prices: `"19.95"`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }

    /// Applies a percentage discount expressed in basis points (1000 = 10%).
    ///
    /// ## Implementation
    /// Integer math: `discount = (amount * bps + 5000) / 10000`, then subtract.
    ///
    /// ## Example
    /// ```rust
    /// use verial_core::money::Money;
    ///
    /// let base = Money::from_cents(10000); // 100.00
    /// assert_eq!(base.apply_percentage_discount(1250).cents(), 8750);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        let discount_amount = (self.0 as i128 * discount_bps as i128 + 5000) / 10000;
        Money::from_cents(self.0 - discount_amount as i64)
    }
}

/// Reads a decimal number out of loosely formatted text.
///
/// Shared by [`Money::parse`] and the field sanitizer. Characters other than
/// digits, `.`, `,` and `-` are dropped first; when both separators appear
/// the last one is the decimal mark.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Converts a percentage (12.5 = 12.5%) into basis points.
///
/// Negative or non-finite input yields zero; values above 100% are capped.
pub fn percent_to_bps(pct: f64) -> u32 {
    if !pct.is_finite() || pct <= 0.0 {
        return 0;
    }
    (pct.min(100.0) * 100.0).round() as u32
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

/// Multiplication by a quantity (line totals). Saturates at the i64 bounds.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_separators() {
        assert_eq!(Money::parse("19.95"), Some(Money::from_cents(1995)));
        assert_eq!(Money::parse("19,95"), Some(Money::from_cents(1995)));
        assert_eq!(Money::parse("1.234,56"), Some(Money::from_cents(123456)));
        assert_eq!(Money::parse("1,234.56"), Some(Money::from_cents(123456)));
        assert_eq!(Money::parse(" 7.500000 "), Some(Money::from_cents(750)));
        assert_eq!(Money::parse("€ 5"), Some(Money::from_cents(500)));
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("gratis"), None);
        assert_eq!(Money::parse("--"), None);
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(Money::from_cents(1995).to_decimal_string(), "19.95");
        assert_eq!(Money::from_cents(500).to_decimal_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_decimal_string(), "-5.50");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
    }

    #[test]
    fn test_from_decimal_rounding() {
        assert_eq!(Money::from_decimal(19.95).cents(), 1995);
        assert_eq!(Money::from_decimal(0.1 + 0.2).cents(), 30);
        assert_eq!(Money::from_decimal(f64::INFINITY).cents(), 0);
    }

    #[test]
    fn test_percentage_discount() {
        let base = Money::from_cents(10000);
        assert_eq!(base.apply_percentage_discount(1000).cents(), 9000);
        assert_eq!(base.apply_percentage_discount(0).cents(), 10000);
    }

    #[test]
    fn test_percent_to_bps() {
        assert_eq!(percent_to_bps(12.5), 1250);
        assert_eq!(percent_to_bps(-3.0), 0);
        assert_eq!(percent_to_bps(250.0), 10000);
        assert_eq!(percent_to_bps(f64::NAN), 0);
    }

    #[test]
    fn test_arithmetic_saturates() {
        assert_eq!(Money::from_cents(1000) * i64::MAX, Money::from_cents(i64::MAX));
        assert_eq!(Money::from_cents(-1000) * i64::MAX, Money::from_cents(i64::MIN));
        assert_eq!(
            Money::from_cents(i64::MAX) + Money::from_cents(1),
            Money::from_cents(i64::MAX)
        );

        let mut total = Money::from_cents(i64::MAX - 1);
        total += Money::from_cents(10);
        assert_eq!(total, Money::from_cents(i64::MAX));
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_cents(-1).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_cents(42).clamp_non_negative().cents(), 42);
    }
}
