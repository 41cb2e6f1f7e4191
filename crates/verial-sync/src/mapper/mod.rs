//! # Record Mappers
//!
//! Bidirectional translators between Verial records and store entities.
//!
//! ## Mapper Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   EntityType::Products  ──► ProductMapper   (async: resolves categories)│
//! │   EntityType::Orders    ──► OrderMapper     (pure)                      │
//! │   EntityType::Customers ──► CustomerMapper  (pure)                      │
//! │                                                                         │
//! │   to_normalized:  Verial record ──► Normalized*   (import direction)   │
//! │   to_external:    store record  ──► Verial record (export direction)   │
//! │                                                                         │
//! │   Every field goes through the sanitizer first; a record is either     │
//! │   mapped completely or rejected with a ValidationError.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each mapper declares its candidate field lists once, next to the code that
//! probes them. Verial names come first, store names after, so the same lists
//! also read store records in the export direction.

pub mod customer;
pub mod order;
pub mod product;

pub use customer::CustomerMapper;
pub use order::OrderMapper;
pub use product::{ProductDraft, ProductMapper, ProductReader};

use serde_json::Value;
use verial_core::order::Address;
use verial_core::record::scalar_to_string;
use verial_core::sanitize::{
    clean_datetime, clean_email, clean_float, clean_html, clean_int, clean_money, clean_phone,
    clean_postcode, clean_text,
};
use verial_core::{ExternalRecord, MapResult, Money, ValidationError};

// =============================================================================
// Shared Field Lists
// =============================================================================

/// Positive integer id of an order or customer.
pub(crate) const ID_FIELDS: &[&str] = &["Id", "id", "ID"];

const FIRST_NAME_FIELDS: &[&str] = &["Nombre", "first_name"];
const LAST_NAME_FIELDS: &[&str] = &["Apellido1", "last_name"];
const SECOND_LAST_NAME_FIELDS: &[&str] = &["Apellido2"];
const COMPANY_FIELDS: &[&str] = &["RazonSocial", "company"];
const ADDRESS_1_FIELDS: &[&str] = &["Direccion", "address_1"];
const ADDRESS_2_FIELDS: &[&str] = &["Direccion2", "address_2"];
const CITY_FIELDS: &[&str] = &["Localidad", "city"];
const STATE_FIELDS: &[&str] = &["Provincia", "state"];
const POSTCODE_FIELDS: &[&str] = &["CPostal", "postcode"];
const COUNTRY_FIELDS: &[&str] = &["Pais", "country"];
pub(crate) const EMAIL_FIELDS: &[&str] = &["Email", "email"];
pub(crate) const PHONE_FIELDS: &[&str] = &["Telefono", "Movil", "phone"];

// =============================================================================
// Probing Helpers
// =============================================================================

/// First candidate as plain text (tags stripped, whitespace collapsed).
pub(crate) fn text(record: &ExternalRecord, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| record.get(f))
        .find_map(clean_text)
}

/// First candidate as text, or an empty string.
pub(crate) fn text_or_empty(record: &ExternalRecord, fields: &[&str]) -> String {
    text(record, fields).unwrap_or_default()
}

/// First candidate as sanitized html.
pub(crate) fn html(record: &ExternalRecord, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|f| record.get(f))
        .filter_map(scalar_to_string)
        .map(|raw| clean_html(&raw))
        .find(|cleaned| !cleaned.is_empty())
}

/// First candidate readable as money (negatives clamped to zero).
pub(crate) fn money(record: &ExternalRecord, fields: &[&str]) -> Option<Money> {
    fields
        .iter()
        .filter_map(|f| record.get(f))
        .find_map(clean_money)
}

/// First candidate readable as an integer.
pub(crate) fn int(record: &ExternalRecord, fields: &[&str]) -> Option<i64> {
    fields.iter().filter_map(|f| record.get(f)).find_map(clean_int)
}

/// First candidate readable as a non-negative float.
pub(crate) fn float(record: &ExternalRecord, fields: &[&str]) -> Option<f64> {
    fields
        .iter()
        .filter_map(|f| record.get(f))
        .find_map(clean_float)
}

pub(crate) fn datetime(
    record: &ExternalRecord,
    fields: &[&str],
) -> Option<chrono::DateTime<chrono::Utc>> {
    fields
        .iter()
        .filter_map(|f| record.get(f))
        .find_map(clean_datetime)
}

/// Reads the record id, which must be a positive integer.
///
/// ## Errors
/// `InvalidId` when the id is missing, zero, negative or not numeric.
pub(crate) fn positive_id(record: &ExternalRecord) -> MapResult<i64> {
    let raw = record.first_scalar(ID_FIELDS).unwrap_or_default();
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::InvalidId { value: raw }),
    }
}

/// Optional positive integer reference (customer of an order, etc.).
pub(crate) fn optional_id(record: &ExternalRecord, fields: &[&str]) -> Option<i64> {
    int(record, fields).filter(|id| *id > 0)
}

/// Reads an email field.
///
/// Absent or blank is fine; present but malformed is `InvalidEmail`.
pub(crate) fn checked_email(record: &ExternalRecord) -> MapResult<Option<String>> {
    let Some(raw) = record.first_present(EMAIL_FIELDS) else {
        return Ok(None);
    };
    match clean_email(raw) {
        Some(email) => Ok(Some(email)),
        None => Err(ValidationError::InvalidEmail {
            value: scalar_to_string(raw).unwrap_or_default(),
        }),
    }
}

/// Iterates the object entries of a list, logging and dropping the rest.
pub(crate) fn object_entries<'a>(
    items: &'a [Value],
    what: &'static str,
) -> impl Iterator<Item = (usize, ExternalRecord)> + 'a {
    items
        .iter()
        .enumerate()
        .filter_map(move |(index, item)| match ExternalRecord::from_value_ref(item) {
            Ok(entry) => Some((index, entry)),
            Err(e) => {
                tracing::debug!(what, index, error = %e, "Dropping malformed entry");
                None
            }
        })
}

// =============================================================================
// Addresses
// =============================================================================

/// Maps an address block.
///
/// With `strict_email` a malformed email rejects the whole record; otherwise
/// it is dropped.
pub(crate) fn address(block: &ExternalRecord, strict_email: bool) -> MapResult<Address> {
    let email = match checked_email(block) {
        Ok(email) => email,
        Err(e) if strict_email => return Err(e),
        Err(_) => None,
    };

    let last_name = [text(block, LAST_NAME_FIELDS), text(block, SECOND_LAST_NAME_FIELDS)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Address {
        first_name: text_or_empty(block, FIRST_NAME_FIELDS),
        last_name,
        company: text_or_empty(block, COMPANY_FIELDS),
        address_1: text_or_empty(block, ADDRESS_1_FIELDS),
        address_2: text_or_empty(block, ADDRESS_2_FIELDS),
        city: text_or_empty(block, CITY_FIELDS),
        state: text_or_empty(block, STATE_FIELDS),
        postcode: block
            .first_present(POSTCODE_FIELDS)
            .and_then(clean_postcode)
            .unwrap_or_default(),
        country: text_or_empty(block, COUNTRY_FIELDS).to_uppercase(),
        email,
        phone: block
            .first_present(PHONE_FIELDS)
            .and_then(clean_phone)
            .unwrap_or_default(),
    })
}

/// Renders an address block with Verial field names.
pub(crate) fn address_to_external(address: &Address) -> ExternalRecord {
    let mut block = ExternalRecord::new();
    block.insert_present("Nombre", address.first_name.as_str());
    block.insert_present("Apellido1", address.last_name.as_str());
    block.insert_present("RazonSocial", address.company.as_str());
    block.insert_present("Direccion", address.address_1.as_str());
    block.insert_present("Direccion2", address.address_2.as_str());
    block.insert_present("Localidad", address.city.as_str());
    block.insert_present("Provincia", address.state.as_str());
    block.insert_present("CPostal", address.postcode.as_str());
    block.insert_present("Pais", address.country.as_str());
    if let Some(email) = &address.email {
        block.insert("Email", email.as_str());
    }
    block.insert_present("Telefono", address.phone.as_str());
    block
}

/// Renders money the way both sides expect it: `"19.95"`.
pub(crate) fn money_value(amount: Money) -> Value {
    Value::String(amount.to_decimal_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> ExternalRecord {
        ExternalRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_positive_id() {
        assert_eq!(positive_id(&record(json!({"Id": 42}))).unwrap(), 42);
        assert_eq!(positive_id(&record(json!({"id": "7"}))).unwrap(), 7);
        assert_eq!(
            positive_id(&record(json!({"Id": 0}))).unwrap_err().reason_code(),
            "invalid_id"
        );
        assert_eq!(
            positive_id(&record(json!({"Id": "abc"}))).unwrap_err().reason_code(),
            "invalid_id"
        );
        assert!(positive_id(&record(json!({}))).is_err());
    }

    #[test]
    fn test_checked_email() {
        assert_eq!(
            checked_email(&record(json!({"Email": " Ana@Example.COM "}))).unwrap(),
            Some("ana@example.com".to_string())
        );
        assert_eq!(checked_email(&record(json!({"Email": ""}))).unwrap(), None);
        assert_eq!(
            checked_email(&record(json!({"email": "not-an-email"})))
                .unwrap_err()
                .reason_code(),
            "invalid_email"
        );
    }

    #[test]
    fn test_address_mapping() {
        let block = record(json!({
            "Nombre": "Lucía",
            "Apellido1": "García",
            "Apellido2": "Pérez",
            "Direccion": "Calle Mayor 1",
            "Localidad": "Murcia",
            "CPostal": " 30001 ",
            "Pais": "es",
            "Telefono": "+34 968 00 00 00",
            "Email": "bad email",
        }));

        // Lenient: bad email dropped
        let lenient = address(&block, false).unwrap();
        assert_eq!(lenient.last_name, "García Pérez");
        assert_eq!(lenient.postcode, "30001");
        assert_eq!(lenient.country, "ES");
        assert_eq!(lenient.email, None);

        // Strict: bad email rejects
        assert!(address(&block, true).is_err());
    }
}
