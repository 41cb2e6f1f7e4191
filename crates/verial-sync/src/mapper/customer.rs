//! Verial client ⇄ WooCommerce customer.

use verial_core::order::Address;
use verial_core::sanitize::clean_phone;
use verial_core::{ExternalRecord, MapResult, NormalizedCustomer, RecordSyncStatus};

use super::{
    address, address_to_external, checked_email, datetime, object_entries, positive_id, text,
    text_or_empty, PHONE_FIELDS,
};

const FIRST_NAME_FIELDS: &[&str] = &["Nombre", "first_name"];
const LAST_NAME_FIELDS: &[&str] = &["Apellido1", "last_name"];
const SECOND_LAST_NAME_FIELDS: &[&str] = &["Apellido2"];
const COMPANY_FIELDS: &[&str] = &["RazonSocial", "company"];
const TAX_ID_FIELDS: &[&str] = &["NIF", "tax_id", "vat"];
const BILLING_FIELDS: &[&str] = &["billing"];
const SHIPPING_LIST_FIELDS: &[&str] = &["DireccionesEnvio"];
const SHIPPING_FIELDS: &[&str] = &["shipping"];
const CREATED_FIELDS: &[&str] = &["FechaAlta", "date_created"];

/// Maps customers in both directions.
#[derive(Debug, Clone, Default)]
pub struct CustomerMapper;

impl CustomerMapper {
    pub fn new() -> Self {
        CustomerMapper
    }

    /// Maps a customer record.
    ///
    /// ## Errors
    /// `InvalidId` for a missing or non-positive id, `InvalidEmail` for a
    /// present but malformed email (top level or billing block).
    pub fn to_normalized(&self, record: &ExternalRecord) -> MapResult<NormalizedCustomer> {
        let id = positive_id(record)?;
        let email = checked_email(record)?;

        // Verial keeps the billing address flat on the client
        let mut billing = match record.first_object(BILLING_FIELDS) {
            Some(block) => address(&block, true)?,
            None => address(record, true)?,
        };
        if billing.email.is_none() {
            billing.email = email.clone();
        }

        let shipping = match record.first_list(SHIPPING_LIST_FIELDS) {
            Some(list) => match object_entries(list, "shipping address").next() {
                Some((_, block)) => address(&block, false)?,
                None => Address::default(),
            },
            None => match record.first_object(SHIPPING_FIELDS) {
                Some(block) => address(&block, false)?,
                None => Address::default(),
            },
        };

        let last_name = [text(record, LAST_NAME_FIELDS), text(record, SECOND_LAST_NAME_FIELDS)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        Ok(NormalizedCustomer {
            id,
            email: email.or_else(|| billing.email.clone()),
            first_name: text(record, FIRST_NAME_FIELDS).unwrap_or_else(|| billing.first_name.clone()),
            last_name: if last_name.is_empty() {
                billing.last_name.clone()
            } else {
                last_name
            },
            company: text_or_empty(record, COMPANY_FIELDS),
            tax_id: text_or_empty(record, TAX_ID_FIELDS).to_uppercase(),
            phone: record
                .first_present(PHONE_FIELDS)
                .and_then(clean_phone)
                .unwrap_or_else(|| billing.phone.clone()),
            billing,
            shipping,
            created_at: datetime(record, CREATED_FIELDS),
            external_id: id.to_string(),
            sync_status: RecordSyncStatus::Pending,
        })
    }

    /// Maps a store customer into a Verial client.
    pub fn to_external(&self, platform: &ExternalRecord) -> MapResult<ExternalRecord> {
        let customer = self.to_normalized(platform)?;
        Ok(customer_to_external(&customer))
    }
}

/// Renders a normalized customer with Verial field names.
///
/// The billing address is flattened onto the client, the way Verial stores it.
pub fn customer_to_external(customer: &NormalizedCustomer) -> ExternalRecord {
    let mut out = address_to_external(&customer.billing);
    out.insert("Id", customer.id);
    out.insert_present("Nombre", customer.first_name.as_str());
    out.insert_present("Apellido1", customer.last_name.as_str());
    out.insert_present("RazonSocial", customer.company.as_str());
    out.insert_present("NIF", customer.tax_id.as_str());
    out.insert_present("Telefono", customer.phone.as_str());
    if let Some(email) = &customer.email {
        out.insert("Email", email.as_str());
    }
    if !customer.shipping.is_empty() {
        out.insert(
            "DireccionesEnvio",
            vec![address_to_external(&customer.shipping).into_value()],
        );
    }
    if let Some(created) = customer.created_at {
        out.insert("FechaAlta", created.to_rfc3339());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> ExternalRecord {
        ExternalRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_verial_client() {
        let customer = CustomerMapper::new()
            .to_normalized(&record(json!({
                "Id": 45,
                "Nombre": "Lucía",
                "Apellido1": "García",
                "Apellido2": "Pérez",
                "NIF": "12345678z",
                "Email": "LUCIA@example.com",
                "Telefono": "968 00 00 00",
                "Direccion": "Calle Mayor 1",
                "Localidad": "Murcia",
                "CPostal": "30001",
                "DireccionesEnvio": [
                    {"Direccion": "Polígono Oeste, nave 4", "Localidad": "Alcantarilla"},
                    {"Direccion": "otra"}
                ],
                "FechaAlta": "15/01/2020"
            })))
            .unwrap();

        assert_eq!(customer.id, 45);
        assert_eq!(customer.email.as_deref(), Some("lucia@example.com"));
        assert_eq!(customer.last_name, "García Pérez");
        assert_eq!(customer.tax_id, "12345678Z");
        assert_eq!(customer.billing.city, "Murcia");
        assert_eq!(customer.billing.email.as_deref(), Some("lucia@example.com"));
        assert_eq!(customer.shipping.city, "Alcantarilla");
        assert_eq!(customer.display_name(), "Lucía García Pérez");
        assert!(customer.created_at.is_some());
    }

    #[test]
    fn test_rejections() {
        let mapper = CustomerMapper::new();
        assert_eq!(
            mapper
                .to_normalized(&record(json!({"Nombre": "Sin id"})))
                .unwrap_err()
                .reason_code(),
            "invalid_id"
        );
        assert_eq!(
            mapper
                .to_normalized(&record(json!({"Id": 3, "Email": "nope"})))
                .unwrap_err()
                .reason_code(),
            "invalid_email"
        );
        assert_eq!(
            mapper
                .to_normalized(&record(json!({"id": 3, "billing": {"email": "@x.com"}})))
                .unwrap_err()
                .reason_code(),
            "invalid_email"
        );
    }

    #[test]
    fn test_platform_customer_to_external() {
        let out = CustomerMapper::new()
            .to_external(&record(json!({
                "id": 12,
                "email": "luis@example.com",
                "first_name": "Luis",
                "last_name": "Mora",
                "billing": {"first_name": "Luis", "last_name": "Mora", "company": "Mora SL", "city": "Valencia", "phone": "600 111 222"},
                "shipping": {"address_1": "Av. del Puerto 3", "city": "Valencia"}
            })))
            .unwrap();

        assert_eq!(out.get("Id"), Some(&json!(12)));
        assert_eq!(out.get("Nombre"), Some(&json!("Luis")));
        assert_eq!(out.get("Localidad"), Some(&json!("Valencia")));
        assert_eq!(out.get("Email"), Some(&json!("luis@example.com")));
        assert_eq!(out.get("Telefono"), Some(&json!("600 111 222")));
        assert_eq!(
            out.get("DireccionesEnvio").unwrap()[0]["Direccion"],
            json!("Av. del Puerto 3")
        );
    }
}
