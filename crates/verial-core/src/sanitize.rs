//! # Field Sanitizer
//!
//! Type-aware coercion for loosely typed ERP values.
//!
//! ## Sanitize-then-Validate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Per-Field Pipeline                                  │
//! │                                                                         │
//! │   raw JSON value ──► sanitize(value, kind) ──► CleanValue               │
//! │                          │                        │                     │
//! │                          │ never fails            │ Empty / 0 when      │
//! │                          │                        │ unreadable          │
//! │                          ▼                        ▼                     │
//! │                    validate(value, kind) ──► bool (pure predicate)     │
//! │                                                                         │
//! │   The caller decides whether an Empty result is fatal. A blank         │
//! │   shipping phone is fine; a missing sku rejects the whole record.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use serde_json::json;
//! use verial_core::sanitize::{sanitize, validate, CleanValue, FieldKind};
//!
//! let price = sanitize(&json!("12,50"), FieldKind::Price);
//! assert_eq!(price.as_money().cents(), 1250);
//!
//! assert!(validate(&json!("Ana@Example.com"), FieldKind::Email));
//! assert_eq!(sanitize(&json!("nope"), FieldKind::Email), CleanValue::Empty);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::money::{parse_decimal, Money};
use crate::record::scalar_to_string;

// =============================================================================
// Compiled Patterns
// =============================================================================

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(\.[a-z0-9\-]+)*\.[a-z]{2,}$")
        .expect("EMAIL_REGEX pattern is valid and well-formed")
});

static SCRIPT_BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("SCRIPT_BLOCK_REGEX pattern is valid and well-formed")
});

static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<!--.*?-->").expect("COMMENT_REGEX pattern is valid and well-formed")
});

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(/)?\s*([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>")
        .expect("TAG_REGEX pattern is valid and well-formed")
});

static HREF_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("HREF_REGEX pattern is valid and well-formed")
});

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("WHITESPACE_REGEX pattern is valid and well-formed")
});

static MS_DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/Date\((-?\d+)([+-]\d{4})?\)/$")
        .expect("MS_DATE_REGEX pattern is valid and well-formed")
});

/// Tags kept by the html sanitizer. Everything else is stripped, content kept.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "b", "em", "i", "ul", "ol", "li", "a", "span", "h1", "h2", "h3", "h4",
    "h5", "h6",
];

// =============================================================================
// Field Kinds & Clean Values
// =============================================================================

/// How a raw value should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Sku,
    Price,
    Float,
    Int,
    Email,
    Html,
    Text,
    Date,
    DateTime,
    Postcode,
    Phone,
}

/// Output of [`sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub enum CleanValue {
    /// Nothing usable was found.
    Empty,
    Text(String),
    Money(Money),
    Float(f64),
    Int(i64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl CleanValue {
    /// Returns true for [`CleanValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, CleanValue::Empty)
    }

    /// Text form of the value (dates in ISO-8601, money as `"19.95"`).
    pub fn as_text(&self) -> Option<String> {
        match self {
            CleanValue::Empty => None,
            CleanValue::Text(s) => Some(s.clone()),
            CleanValue::Money(m) => Some(m.to_decimal_string()),
            CleanValue::Float(f) => Some(f.to_string()),
            CleanValue::Int(i) => Some(i.to_string()),
            CleanValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            CleanValue::DateTime(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }

    /// Monetary form; zero when the value is not money.
    pub fn as_money(&self) -> Money {
        match self {
            CleanValue::Money(m) => *m,
            CleanValue::Int(i) => Money::from_cents(i.saturating_mul(100)),
            CleanValue::Float(f) => Money::from_decimal(*f),
            _ => Money::zero(),
        }
    }

    /// Integer form; zero when the value is not numeric.
    pub fn as_int(&self) -> i64 {
        match self {
            CleanValue::Int(i) => *i,
            CleanValue::Float(f) => f.trunc() as i64,
            CleanValue::Money(m) => m.cents() / 100,
            _ => 0,
        }
    }

    /// Float form; zero when the value is not numeric.
    pub fn as_float(&self) -> f64 {
        match self {
            CleanValue::Float(f) => *f,
            CleanValue::Int(i) => *i as f64,
            CleanValue::Money(m) => m.as_decimal(),
            _ => 0.0,
        }
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Coerces a raw value into the requested kind. Never fails.
pub fn sanitize(value: &Value, kind: FieldKind) -> CleanValue {
    let cleaned = match kind {
        FieldKind::Sku => clean_sku(value).map(CleanValue::Text),
        FieldKind::Price => clean_money(value).map(CleanValue::Money),
        FieldKind::Float => clean_float(value).map(CleanValue::Float),
        FieldKind::Int => clean_int(value).map(CleanValue::Int),
        FieldKind::Email => clean_email(value).map(CleanValue::Text),
        FieldKind::Html => scalar_to_string(value)
            .map(|raw| clean_html(&raw))
            .filter(|s| !s.is_empty())
            .map(CleanValue::Text),
        FieldKind::Text => clean_text(value).map(CleanValue::Text),
        FieldKind::Date => clean_date(value).map(CleanValue::Date),
        FieldKind::DateTime => clean_datetime(value).map(CleanValue::DateTime),
        FieldKind::Postcode => clean_postcode(value).map(CleanValue::Text),
        FieldKind::Phone => clean_phone(value).map(CleanValue::Text),
    };
    cleaned.unwrap_or(CleanValue::Empty)
}

/// Pure predicate: would `value` survive [`sanitize`] unchanged in meaning?
///
/// ## Rules
/// - numeric kinds: readable as a number and, for `Price`/`Float`, not negative
/// - `Email`: matches the address shape after trimming and lower-casing
/// - `Phone`: only phone characters and at least one digit
/// - `Postcode`: only alphanumerics, space and dash
/// - everything else: sanitizes to a non-empty value
pub fn validate(value: &Value, kind: FieldKind) -> bool {
    match kind {
        FieldKind::Price | FieldKind::Float => raw_number(value).is_some_and(|n| n >= 0.0),
        FieldKind::Int => raw_number(value).is_some(),
        FieldKind::Email => scalar_to_string(value)
            .is_some_and(|s| EMAIL_REGEX.is_match(&s.to_lowercase())),
        FieldKind::Phone => scalar_to_string(value).is_some_and(|s| {
            s.chars().any(|c| c.is_ascii_digit())
                && s
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        }),
        FieldKind::Postcode => scalar_to_string(value).is_some_and(|s| {
            s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-'))
        }),
        other => !sanitize(value, other).is_empty(),
    }
}

// =============================================================================
// Typed Helpers
// =============================================================================

/// Trims and strips control characters. Numeric ids are rendered as text.
pub fn clean_sku(value: &Value) -> Option<String> {
    let raw = scalar_to_string(value)?;
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Reads money, clamping negatives to zero.
pub fn clean_money(value: &Value) -> Option<Money> {
    raw_number(value).map(|n| Money::from_decimal(n).clamp_non_negative())
}

/// Reads a non-negative float.
pub fn clean_float(value: &Value) -> Option<f64> {
    raw_number(value).map(|n| n.max(0.0))
}

/// Reads an integer, truncating any fraction.
pub fn clean_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        _ => raw_number(value).map(|f| f.trunc() as i64),
    }
}

/// Trims and lower-cases; `None` when the result is not shaped like an email.
pub fn clean_email(value: &Value) -> Option<String> {
    let email = scalar_to_string(value)?.to_lowercase();
    EMAIL_REGEX.is_match(&email).then_some(email)
}

/// Keeps a small allow-list of formatting tags and drops every attribute
/// except `href` on links.
pub fn clean_html(raw: &str) -> String {
    let without_scripts = SCRIPT_BLOCK_REGEX.replace_all(raw, "");
    let without_comments = COMMENT_REGEX.replace_all(&without_scripts, "");

    let rebuilt = TAG_REGEX.replace_all(&without_comments, |caps: &regex::Captures<'_>| {
        let closing = caps.get(1).is_some();
        let tag = caps[2].to_ascii_lowercase();
        if !ALLOWED_TAGS.contains(&tag.as_str()) {
            return String::new();
        }
        if closing {
            return format!("</{}>", tag);
        }
        if tag == "a" {
            if let Some(href) = safe_href(&caps[3]) {
                return format!("<a href=\"{}\">", href);
            }
        }
        format!("<{}>", tag)
    });

    rebuilt.trim().to_string()
}

/// Strips every tag, decodes the common entities and collapses whitespace.
pub fn clean_text(value: &Value) -> Option<String> {
    let raw = scalar_to_string(value)?;
    let without_scripts = SCRIPT_BLOCK_REGEX.replace_all(&raw, " ");
    let without_tags = TAG_REGEX.replace_all(&without_scripts, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let collapsed = WHITESPACE_REGEX.replace_all(&decoded, " ");
    let trimmed = collapsed.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parses any supported date shape, keeping only the calendar date.
pub fn clean_date(value: &Value) -> Option<NaiveDate> {
    let raw = scalar_to_string(value)?;
    parse_naive_date(&raw).or_else(|| parse_datetime(&raw).map(|dt| dt.date_naive()))
}

/// Parses any supported date shape into a UTC timestamp.
///
/// Date-only input becomes midnight UTC.
pub fn clean_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let raw = scalar_to_string(value)?;
    parse_datetime(&raw).or_else(|| {
        parse_naive_date(&raw)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

/// Upper-cases and keeps alphanumerics, space and dash.
pub fn clean_postcode(value: &Value) -> Option<String> {
    let raw = scalar_to_string(value)?;
    let cleaned: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-'))
        .collect();
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Keeps digits, a leading `+`, spaces, dashes and parentheses.
pub fn clean_phone(value: &Value) -> Option<String> {
    let raw = scalar_to_string(value)?;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '0'..='9' | ' ' | '-' | '(' | ')' => out.push(c),
            '+' if out.trim().is_empty() => {
                out.clear();
                out.push('+');
            }
            _ => {}
        }
    }
    let cleaned = WHITESPACE_REGEX.replace_all(out.trim(), " ").to_string();
    cleaned
        .chars()
        .any(|c| c.is_ascii_digit())
        .then_some(cleaned)
}

// =============================================================================
// Internals
// =============================================================================

fn raw_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

fn safe_href(attributes: &str) -> Option<String> {
    let caps = HREF_REGEX.captures(attributes)?;
    let href = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))?
        .as_str()
        .trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty() || lowered.starts_with("javascript:") || lowered.starts_with("data:") {
        return None;
    }
    Some(href.replace('"', "&quot;"))
}

fn parse_naive_date(raw: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw.trim(), fmt).ok())
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Some(caps) = MS_DATE_REGEX.captures(raw) {
        let millis: i64 = caps[1].parse().ok()?;
        return Utc.timestamp_millis_opt(millis).single();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| Utc.from_utc_datetime(&naive))
}

// =============================================================================
// Unit Tests
// =============================================================================
