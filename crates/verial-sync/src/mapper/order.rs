//! # Order Mapper
//!
//! Verial sales document ⇄ WooCommerce order.
//!
//! The mapper is pure. An order is rejected as a whole only for a bad id or
//! a malformed billing email; every line list is mapped independently and
//! malformed entries are dropped one by one.

use serde_json::Value;
use tracing::debug;
use verial_core::order::{Address, CouponLine, FeeLine, LineItem, ShippingLine};
use verial_core::sanitize::clean_sku;
use verial_core::{
    ExternalRecord, MapResult, Money, NormalizedOrder, OrderStatus, RecordSyncStatus,
};

use super::{
    address, address_to_external, datetime, int, money, money_value, object_entries,
    optional_id, positive_id, text, text_or_empty,
};

// =============================================================================
// Field Lists
// =============================================================================

const CUSTOMER_ID_FIELDS: &[&str] = &["ID_Cliente", "customer_id"];
const ERP_STATUS_FIELDS: &[&str] = &["Estado"];
const PLATFORM_STATUS_FIELDS: &[&str] = &["status"];
const CURRENCY_FIELDS: &[&str] = &["Moneda", "currency"];

const TOTAL_FIELDS: &[&str] = &["ImporteTotal", "Total", "total"];
const SUBTOTAL_FIELDS: &[&str] = &["BaseImponible", "Subtotal", "subtotal"];
const TAX_FIELDS: &[&str] = &["TotalImpuestos", "ImporteImpuestos", "total_tax"];
const SHIPPING_TOTAL_FIELDS: &[&str] = &["PreciosPortes", "Portes", "shipping_total"];
const DISCOUNT_FIELDS: &[&str] = &["ImporteDescuento", "Descuento", "discount_total"];

const BILLING_FIELDS: &[&str] = &["Cliente", "billing"];
const SHIPPING_ADDRESS_FIELDS: &[&str] = &["DireccionEnvio", "shipping"];

const CREATED_FIELDS: &[&str] = &["Fecha", "date_created", "created_at"];
const PAID_FIELDS: &[&str] = &["FechaPago", "date_paid"];
const NOTE_FIELDS: &[&str] = &["Observaciones", "customer_note", "note"];

const LINE_ITEM_FIELDS: &[&str] = &["Contenido", "line_items"];
const LINE_PRODUCT_FIELDS: &[&str] = &["ID_Articulo", "product_id"];
const LINE_SKU_FIELDS: &[&str] = &["ReferenciaBarras", "sku"];
const LINE_NAME_FIELDS: &[&str] = &["Descripcion", "name"];
const LINE_QUANTITY_FIELDS: &[&str] = &["Uds", "Cantidad", "quantity"];
const LINE_PRICE_FIELDS: &[&str] = &["Precio", "price"];
const LINE_SUBTOTAL_FIELDS: &[&str] = &["ImporteBruto", "subtotal"];
const LINE_TOTAL_FIELDS: &[&str] = &["ImporteLinea", "total"];
const LINE_TAX_FIELDS: &[&str] = &["ImporteImpuestos", "total_tax"];

const SHIPPING_LINE_FIELDS: &[&str] = &["LineasPortes", "shipping_lines"];
const METHOD_ID_FIELDS: &[&str] = &["Codigo", "method_id"];
const METHOD_TITLE_FIELDS: &[&str] = &["Descripcion", "method_title"];

const FEE_LINE_FIELDS: &[&str] = &["Recargos", "fee_lines"];
const FEE_NAME_FIELDS: &[&str] = &["Descripcion", "name"];

const COUPON_LINE_FIELDS: &[&str] = &["Cupones", "coupon_lines"];
const COUPON_CODE_FIELDS: &[&str] = &["Codigo", "code"];
const COUPON_DISCOUNT_FIELDS: &[&str] = &["Importe", "discount"];

const AMOUNT_FIELDS: &[&str] = &["Importe", "total"];

// =============================================================================
// Order Mapper
// =============================================================================

/// Maps orders in both directions.
#[derive(Debug, Clone)]
pub struct OrderMapper {
    default_currency: String,
}

impl OrderMapper {
    pub fn new(default_currency: impl Into<String>) -> Self {
        OrderMapper {
            default_currency: default_currency.into(),
        }
    }

    /// Maps an order record. Reads both Verial and WooCommerce field names.
    ///
    /// ## Errors
    /// - `InvalidId` when the id is not a positive integer
    /// - `InvalidEmail` when the billing email is present but malformed
    pub fn to_normalized(&self, record: &ExternalRecord) -> MapResult<NormalizedOrder> {
        let id = positive_id(record)?;

        // Verial sends the customer block nested; WooCommerce sends `billing`.
        // Older Verial documents carry the billing fields flat on the order.
        let billing = match record.first_object(BILLING_FIELDS) {
            Some(block) => address(&block, true)?,
            None => address(record, true)?,
        };
        let shipping_address = match record.first_object(SHIPPING_ADDRESS_FIELDS) {
            Some(block) => address(&block, false)?,
            None => Address::default(),
        };

        let line_items = record
            .first_list(LINE_ITEM_FIELDS)
            .map(|list| line_items(list))
            .unwrap_or_default();

        let mut order = NormalizedOrder {
            id,
            customer_id: optional_id(record, CUSTOMER_ID_FIELDS),
            status: status(record),
            currency: text(record, CURRENCY_FIELDS)
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| self.default_currency.clone()),
            total: money(record, TOTAL_FIELDS).unwrap_or_default(),
            subtotal: money(record, SUBTOTAL_FIELDS).unwrap_or_default(),
            tax: money(record, TAX_FIELDS).unwrap_or_default(),
            shipping: money(record, SHIPPING_TOTAL_FIELDS).unwrap_or_default(),
            discount: money(record, DISCOUNT_FIELDS).unwrap_or_default(),
            billing,
            shipping_address,
            line_items,
            shipping_lines: record
                .first_list(SHIPPING_LINE_FIELDS)
                .map(|list| shipping_lines(list))
                .unwrap_or_default(),
            fee_lines: record
                .first_list(FEE_LINE_FIELDS)
                .map(|list| fee_lines(list))
                .unwrap_or_default(),
            coupon_lines: record
                .first_list(COUPON_LINE_FIELDS)
                .map(|list| coupon_lines(list))
                .unwrap_or_default(),
            created_at: datetime(record, CREATED_FIELDS),
            paid_at: datetime(record, PAID_FIELDS),
            note: text(record, NOTE_FIELDS),
            external_id: id.to_string(),
            sync_status: RecordSyncStatus::Pending,
        };

        if order.total.is_zero() {
            order.total = order.lines_total().clamp_non_negative();
        }
        if order.subtotal.is_zero() {
            order.subtotal = order
                .line_items
                .iter()
                .fold(Money::zero(), |acc, line| acc + line.subtotal)
                .clamp_non_negative();
        }

        Ok(order)
    }

    /// Maps a store order into a Verial document.
    ///
    /// The store record goes through [`to_normalized`](Self::to_normalized)
    /// first, so the same rejections apply.
    pub fn to_external(&self, platform: &ExternalRecord) -> MapResult<ExternalRecord> {
        let order = self.to_normalized(platform)?;
        Ok(order_to_external(&order))
    }
}

/// Renders a normalized order with Verial field names.
pub fn order_to_external(order: &NormalizedOrder) -> ExternalRecord {
    let mut out = ExternalRecord::new();
    out.insert("Id", order.id);
    if let Some(customer) = order.customer_id {
        out.insert("ID_Cliente", customer);
    }
    out.insert("Estado", order.status.as_erp_code());
    out.insert("Moneda", order.currency.as_str());
    out.insert("ImporteTotal", money_value(order.total));
    out.insert("BaseImponible", money_value(order.subtotal));
    out.insert("TotalImpuestos", money_value(order.tax));
    out.insert("PreciosPortes", money_value(order.shipping));
    out.insert("ImporteDescuento", money_value(order.discount));
    out.insert("Cliente", address_to_external(&order.billing).into_value());
    if !order.shipping_address.is_empty() {
        out.insert(
            "DireccionEnvio",
            address_to_external(&order.shipping_address).into_value(),
        );
    }

    let lines: Vec<Value> = order
        .line_items
        .iter()
        .map(|line| {
            let mut entry = ExternalRecord::new();
            if let Some(product_id) = &line.product_id {
                entry.insert("ID_Articulo", product_id.as_str());
            }
            if let Some(sku) = &line.sku {
                entry.insert("ReferenciaBarras", sku.as_str());
            }
            entry.insert_present("Descripcion", line.name.as_str());
            entry.insert("Uds", line.quantity);
            entry.insert("Precio", money_value(line.unit_price));
            entry.insert("ImporteBruto", money_value(line.subtotal));
            entry.insert("ImporteLinea", money_value(line.total));
            entry.insert("ImporteImpuestos", money_value(line.tax));
            entry.into_value()
        })
        .collect();
    out.insert("Contenido", lines);

    let shipping: Vec<Value> = order
        .shipping_lines
        .iter()
        .map(|line| {
            let mut entry = ExternalRecord::new();
            entry.insert_present("Codigo", line.method_id.as_str());
            entry.insert_present("Descripcion", line.method_title.as_str());
            entry.insert("Importe", money_value(line.total));
            entry.into_value()
        })
        .collect();
    if !shipping.is_empty() {
        out.insert("LineasPortes", shipping);
    }

    let fees: Vec<Value> = order
        .fee_lines
        .iter()
        .map(|fee| {
            let mut entry = ExternalRecord::new();
            entry.insert_present("Descripcion", fee.name.as_str());
            entry.insert("Importe", money_value(fee.total));
            entry.into_value()
        })
        .collect();
    if !fees.is_empty() {
        out.insert("Recargos", fees);
    }

    let coupons: Vec<Value> = order
        .coupon_lines
        .iter()
        .map(|coupon| {
            let mut entry = ExternalRecord::new();
            entry.insert("Codigo", coupon.code.as_str());
            entry.insert("Importe", money_value(coupon.discount));
            entry.into_value()
        })
        .collect();
    if !coupons.is_empty() {
        out.insert("Cupones", coupons);
    }

    if let Some(created) = order.created_at {
        out.insert("Fecha", created.to_rfc3339());
    }
    if let Some(paid) = order.paid_at {
        out.insert("FechaPago", paid.to_rfc3339());
    }
    if let Some(note) = &order.note {
        out.insert("Observaciones", note.as_str());
    }

    out
}

// =============================================================================
// Line Lists
// =============================================================================

/// `Estado` (code or name) wins over the store's `status`.
fn status(record: &ExternalRecord) -> OrderStatus {
    if let Some(raw) = record.first_present(ERP_STATUS_FIELDS) {
        return OrderStatus::from_erp(raw);
    }
    text(record, PLATFORM_STATUS_FIELDS)
        .map(|raw| OrderStatus::from_platform(&raw))
        .unwrap_or_default()
}

fn line_items(list: &[Value]) -> Vec<LineItem> {
    object_entries(list, "line item")
        .filter_map(|(index, entry)| {
            let product_id = entry
                .first_scalar(LINE_PRODUCT_FIELDS)
                .filter(|id| id != "0");
            let sku = entry.first_present(LINE_SKU_FIELDS).and_then(clean_sku);
            let name = text_or_empty(&entry, LINE_NAME_FIELDS);

            if product_id.is_none() && sku.is_none() && name.is_empty() {
                debug!(index, "Dropping line item without product reference or name");
                return None;
            }

            // Negative quantities (returns) are not carried on a sale line
            let quantity = int(&entry, LINE_QUANTITY_FIELDS).unwrap_or(1).max(0);
            let unit_price = money(&entry, LINE_PRICE_FIELDS)
                .unwrap_or_default()
                .clamp_non_negative();
            let total = money(&entry, LINE_TOTAL_FIELDS)
                .unwrap_or_else(|| unit_price * quantity)
                .clamp_non_negative();

            Some(LineItem {
                product_id,
                sku,
                name,
                quantity,
                unit_price,
                subtotal: money(&entry, LINE_SUBTOTAL_FIELDS)
                    .map(Money::clamp_non_negative)
                    .unwrap_or(total),
                total,
                tax: money(&entry, LINE_TAX_FIELDS).unwrap_or_default(),
            })
        })
        .collect()
}

fn shipping_lines(list: &[Value]) -> Vec<ShippingLine> {
    object_entries(list, "shipping line")
        .filter_map(|(index, entry)| {
            let method_title = text_or_empty(&entry, METHOD_TITLE_FIELDS);
            let method_id = text_or_empty(&entry, METHOD_ID_FIELDS);
            if method_id.is_empty() && method_title.is_empty() {
                debug!(index, "Dropping shipping line without method");
                return None;
            }
            Some(ShippingLine {
                method_id,
                method_title,
                total: money(&entry, AMOUNT_FIELDS).unwrap_or_default(),
            })
        })
        .collect()
}

fn fee_lines(list: &[Value]) -> Vec<FeeLine> {
    object_entries(list, "fee line")
        .filter_map(|(index, entry)| {
            let Some(name) = text(&entry, FEE_NAME_FIELDS) else {
                debug!(index, "Dropping fee line without name");
                return None;
            };
            Some(FeeLine {
                name,
                total: money(&entry, AMOUNT_FIELDS).unwrap_or_default(),
            })
        })
        .collect()
}

fn coupon_lines(list: &[Value]) -> Vec<CouponLine> {
    object_entries(list, "coupon line")
        .filter_map(|(index, entry)| {
            let Some(code) = text(&entry, COUPON_CODE_FIELDS) else {
                debug!(index, "Dropping coupon without code");
                return None;
            };
            Some(CouponLine {
                code,
                discount: money(&entry, COUPON_DISCOUNT_FIELDS).unwrap_or_default(),
            })
        })
        .collect()
}
