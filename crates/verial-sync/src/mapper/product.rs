//! # Product Mapper
//!
//! Verial article ⇄ WooCommerce product.
//!
//! ## Import Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        to_normalized(record)                            │
//! │                                                                         │
//! │  1. SKU        ReferenciaBarras → numeric Id → configured sku fields   │
//! │                none → MissingSku (nothing else is read)                │
//! │                                                                         │
//! │  2. Fields     name, descriptions, PVP, stock, dimensions              │
//! │                                                                         │
//! │  3. Attributes Atributos: {name, value} or {name, values: [...]}       │
//! │                                                                         │
//! │  4. Variations Variaciones: own sku (or parent-var-N), own attributes  │
//! │                (or the synthetic "Variante" = sku), axis on the parent │
//! │                                                                         │
//! │  5. Bundle     Pack + Componentes with at least one resolvable sku     │
//! │                                                                         │
//! │  6. Categories ID_Categoria + ID_CategoriaWeb1..4 through the          │
//! │                CategoryResolver, uncategorized when none resolve       │
//! │                                                                         │
//! │  7. Overrides  typed host overrides applied last                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 1-5 are pure and live in [`ProductReader`]; only category
//! resolution touches the store.

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use verial_core::catalog::{
    Bundle, BundleComponent, Dimensions, NormalizedVariation, ProductAttribute,
    VariationAttribute, VERIAL_PRODUCT_ID_META,
};
use verial_core::sanitize::{clean_sku, clean_text};
use verial_core::{
    ExternalRecord, MapResult, NormalizedProduct, ProductOverrides, ProductType,
    RecordSyncStatus, StockStatus, ValidationError, SYNTHETIC_VARIATION_ATTRIBUTE,
};

use super::{float, html, int, money, money_value, object_entries, text, ID_FIELDS};
use crate::cache::BatchCache;
use crate::category::{CategoryRef, CategoryResolver};
use crate::config::MappingSettings;

// =============================================================================
// Field Lists
// =============================================================================

const BARCODE_FIELDS: &[&str] = &["ReferenciaBarras"];
const NAME_FIELDS: &[&str] = &["Nombre", "name"];
const NAME_FALLBACK_FIELDS: &[&str] = &["DescripcionLarga", "Descripcion"];
const DESCRIPTION_FIELDS: &[&str] = &["DescripcionLarga", "description"];
const SHORT_DESCRIPTION_FIELDS: &[&str] = &["Descripcion", "short_description"];
const PRICE_FIELDS: &[&str] = &["PVP", "Precio", "price", "regular_price"];
const SALE_PRICE_FIELDS: &[&str] = &["sale_price"];
const STOCK_FIELDS: &[&str] = &["Stock", "stock_quantity", "Existencias"];
const WEIGHT_FIELDS: &[&str] = &["Peso", "weight"];
const LENGTH_FIELDS: &[&str] = &["Grueso", "length"];
const WIDTH_FIELDS: &[&str] = &["Ancho", "width"];
const HEIGHT_FIELDS: &[&str] = &["Alto", "height"];
const DIMENSION_BLOCK_FIELDS: &[&str] = &["dimensions"];
const TYPE_FIELDS: &[&str] = &["Tipo", "type"];

const ATTRIBUTE_FIELDS: &[&str] = &["Atributos", "attributes"];
const ATTRIBUTE_NAME_FIELDS: &[&str] = &["Nombre", "name"];
const ATTRIBUTE_VALUE_FIELDS: &[&str] = &["Valor", "value", "option"];
const ATTRIBUTE_VALUES_FIELDS: &[&str] = &["Valores", "values", "options"];

const VARIATION_FIELDS: &[&str] = &["Variaciones", "variations"];

const BUNDLE_FIELDS: &[&str] = &["Pack", "bundle"];
const COMPONENT_FIELDS: &[&str] = &["Componentes", "components"];
const COMPONENT_SKU_FIELDS: &[&str] = &["ReferenciaBarras", "sku", "Referencia"];
const COMPONENT_QUANTITY_FIELDS: &[&str] = &["Cantidad", "Unidades", "quantity"];

const CATEGORY_ID_FIELD: &str = "ID_Categoria";
const CATEGORY_NAME_FIELD: &str = "NombreCategoria";
const WEB_CATEGORY_SLOTS: usize = 4;
const CATEGORY_LIST_FIELDS: &[&str] = &["categories", "Categorias"];
const CATEGORY_ENTRY_ID_FIELDS: &[&str] = &["id", "Id"];
const CATEGORY_ENTRY_NAME_FIELDS: &[&str] = &["name", "Nombre"];

const META_FIELDS: &[&str] = &["meta_data"];

// =============================================================================
// Product Reader (pure)
// =============================================================================

/// A product before category resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    /// Mapped product; `category_ids` is still empty.
    pub product: NormalizedProduct,
    /// Category slots in record order.
    pub categories: Vec<CategoryRef>,
}

/// Reads Verial article records into [`ProductDraft`]s.
#[derive(Debug, Clone)]
pub struct ProductReader {
    sku_fields: Vec<String>,
}

impl ProductReader {
    pub fn new(sku_fields: Vec<String>) -> Self {
        ProductReader { sku_fields }
    }

    pub fn from_settings(settings: &MappingSettings) -> Self {
        Self::new(settings.sku_fields.clone())
    }

    /// Resolves the sku: barcode, then a positive numeric id, then the
    /// configured fields. First non-empty value wins.
    pub fn resolve_sku(&self, record: &ExternalRecord) -> Option<String> {
        if let Some(sku) = record.first_present(BARCODE_FIELDS).and_then(clean_sku) {
            return Some(sku);
        }
        if let Some(id) = numeric_id(record) {
            return Some(id.to_string());
        }
        self.sku_fields
            .iter()
            .filter_map(|field| record.get(field))
            .find_map(clean_sku)
    }

    /// Maps everything except categories.
    ///
    /// ## Errors
    /// `MissingSku` when no sku candidate holds a value.
    pub fn read(&self, record: &ExternalRecord) -> MapResult<ProductDraft> {
        let sku = self.resolve_sku(record).ok_or(ValidationError::MissingSku)?;

        let name = text(record, NAME_FIELDS)
            .or_else(|| text(record, NAME_FALLBACK_FIELDS))
            .unwrap_or_else(|| sku.clone());

        let price = money(record, PRICE_FIELDS).unwrap_or_default();
        let sale_price = money(record, SALE_PRICE_FIELDS).filter(|sale| *sale < price);
        let stock_quantity = int(record, STOCK_FIELDS).unwrap_or(0);

        let external_id = record.first_scalar(ID_FIELDS).unwrap_or_else(|| sku.clone());
        let mut meta = BTreeMap::new();
        meta.insert(VERIAL_PRODUCT_ID_META.to_string(), external_id.clone());

        let mut product = NormalizedProduct {
            sku,
            name,
            description: html(record, DESCRIPTION_FIELDS),
            short_description: html(record, SHORT_DESCRIPTION_FIELDS),
            product_type: ProductType::Simple,
            price,
            sale_price,
            stock_quantity,
            stock_status: StockStatus::from_quantity(stock_quantity),
            dimensions: dimensions(record),
            category_ids: Vec::new(),
            attributes: record
                .first_list(ATTRIBUTE_FIELDS)
                .map(|list| read_attributes(list))
                .unwrap_or_default(),
            variations: Vec::new(),
            bundle: None,
            external_id,
            meta,
            sync_status: RecordSyncStatus::Pending,
            last_sync: Utc::now(),
        };

        if is_variable(record) {
            let variations = record
                .first_list(VARIATION_FIELDS)
                .map(|list| self.read_variations(list, &mut product))
                .unwrap_or_default();
            if variations.is_empty() {
                debug!(sku = %product.sku, "Variable product without valid variations, mapping as simple");
            } else {
                product.product_type = ProductType::Variable;
                product.variations = variations;
            }
        }

        if let Some(bundle) = read_bundle(record, &product.name) {
            if product.product_type == ProductType::Simple {
                product.product_type = ProductType::Bundle;
            }
            product.bundle = Some(bundle);
        }

        Ok(ProductDraft {
            product,
            categories: category_slots(record),
        })
    }

    /// Maps each variation, adding its attributes to the parent as variation
    /// axes.
    fn read_variations(
        &self,
        list: &[Value],
        parent: &mut NormalizedProduct,
    ) -> Vec<NormalizedVariation> {
        let mut variations = Vec::with_capacity(list.len());

        for (index, entry) in object_entries(list, "variation") {
            let sku = self
                .resolve_sku(&entry)
                .unwrap_or_else(|| format!("{}-var-{}", parent.sku, index + 1));

            let mut attributes = variation_attributes(&entry);
            if attributes.is_empty() {
                attributes.push(VariationAttribute {
                    name: SYNTHETIC_VARIATION_ATTRIBUTE.to_string(),
                    value: sku.clone(),
                });
            }
            for attribute in &attributes {
                merge_attribute(
                    &mut parent.attributes,
                    &attribute.name,
                    [attribute.value.clone()],
                    true,
                );
            }

            let price = money(&entry, PRICE_FIELDS).unwrap_or(parent.price);
            let stock_quantity = int(&entry, STOCK_FIELDS).unwrap_or(0);

            variations.push(NormalizedVariation {
                sale_price: money(&entry, SALE_PRICE_FIELDS).filter(|sale| *sale < price),
                price,
                stock_quantity,
                stock_status: StockStatus::from_quantity(stock_quantity),
                attributes,
                dimensions: dimensions(&entry),
                external_id: entry.first_scalar(ID_FIELDS),
                sku,
            });
        }

        variations
    }
}

// =============================================================================
// Product Mapper
// =============================================================================

/// Product mapper: [`ProductReader`] plus category resolution and overrides.
#[derive(Clone)]
pub struct ProductMapper {
    reader: ProductReader,
    categories: CategoryResolver,
    uncategorized: i64,
}

impl ProductMapper {
    pub fn new(settings: &MappingSettings, categories: CategoryResolver) -> Self {
        ProductMapper {
            reader: ProductReader::from_settings(settings),
            categories,
            uncategorized: settings.uncategorized_category_id,
        }
    }

    pub fn reader(&self) -> &ProductReader {
        &self.reader
    }

    /// Maps a Verial article into a store product.
    ///
    /// ## Errors
    /// `MissingSku`; category failures degrade to the uncategorized term.
    pub async fn to_normalized(
        &self,
        record: &ExternalRecord,
        overrides: &ProductOverrides,
        cache: &mut BatchCache,
    ) -> MapResult<NormalizedProduct> {
        let ProductDraft {
            mut product,
            categories,
        } = self.reader.read(record)?;

        let mut category_ids = self.categories.resolve_all(&categories, cache).await;
        if category_ids.is_empty() {
            category_ids.push(self.uncategorized);
        }
        product.category_ids = category_ids;

        if !overrides.is_empty() {
            debug!(sku = %product.sku, "Applying product overrides");
            overrides.apply(&mut product);
        }

        Ok(product)
    }

    /// Maps a store product back into a Verial article.
    ///
    /// Lossy: only the fields Verial stores are carried. Returns an empty
    /// record when the store product has no sku.
    pub fn to_external(&self, platform: &ExternalRecord) -> ExternalRecord {
        product_to_external(platform)
    }
}

/// See [`ProductMapper::to_external`].
pub fn product_to_external(platform: &ExternalRecord) -> ExternalRecord {
    let Some(sku) = platform.first_present(&["sku"]).and_then(clean_sku) else {
        return ExternalRecord::new();
    };

    let mut out = ExternalRecord::new();
    if let Some(id) = verial_id_from_meta(platform) {
        out.insert("Id", id);
    }
    out.insert("ReferenciaBarras", sku);
    if let Some(name) = text(platform, &["name"]) {
        out.insert("Nombre", name);
    }
    if let Some(description) = html(platform, &["description"]) {
        out.insert("DescripcionLarga", description);
    }
    if let Some(short) = text(platform, &["short_description"]) {
        out.insert("Descripcion", short);
    }
    out.insert(
        "PVP",
        money_value(money(platform, &["regular_price", "price"]).unwrap_or_default()),
    );
    if let Some(stock) = int(platform, &["stock_quantity"]) {
        out.insert("Stock", stock);
    }

    let dims = dimensions(platform);
    for (field, value) in [
        ("Peso", dims.weight),
        ("Grueso", dims.length),
        ("Ancho", dims.width),
        ("Alto", dims.height),
    ] {
        if value > 0.0 {
            out.insert(field, value);
        }
    }

    out
}

// =============================================================================
// Helpers
// =============================================================================

fn numeric_id(record: &ExternalRecord) -> Option<u64> {
    record
        .first_scalar(ID_FIELDS)
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|id| *id > 0)
}

fn is_variable(record: &ExternalRecord) -> bool {
    let flagged = text(record, TYPE_FIELDS)
        .and_then(|raw| ProductType::parse(&raw))
        .is_some_and(|t| t == ProductType::Variable);
    flagged || record.first_list(VARIATION_FIELDS).is_some()
}

fn dimensions(record: &ExternalRecord) -> Dimensions {
    let nested = record.first_object(DIMENSION_BLOCK_FIELDS);
    let read = |fields: &[&str]| {
        float(record, fields)
            .or_else(|| nested.as_ref().and_then(|block| float(block, fields)))
            .unwrap_or(0.0)
    };

    Dimensions {
        weight: read(WEIGHT_FIELDS),
        length: read(LENGTH_FIELDS),
        width: read(WIDTH_FIELDS),
        height: read(HEIGHT_FIELDS),
    }
}

/// Reads `{name, value}` / `{name, values}` entries into attributes.
fn read_attributes(list: &[Value]) -> Vec<ProductAttribute> {
    let mut attributes = Vec::new();
    for (index, entry) in object_entries(list, "attribute") {
        let Some(name) = text(&entry, ATTRIBUTE_NAME_FIELDS) else {
            debug!(index, "Skipping attribute without a name");
            continue;
        };
        let values = attribute_values(&entry);
        if values.is_empty() {
            debug!(index, attribute = %name, "Skipping attribute without values");
            continue;
        }
        merge_attribute(&mut attributes, &name, values, false);
    }
    attributes
}

fn attribute_values(entry: &ExternalRecord) -> Vec<String> {
    match entry.first_list(ATTRIBUTE_VALUES_FIELDS) {
        Some(list) => list.iter().filter_map(clean_text).collect(),
        None => text(entry, ATTRIBUTE_VALUE_FIELDS).into_iter().collect(),
    }
}

/// A variation's attributes, as a list of entries or a `{name: value}` map.
fn variation_attributes(entry: &ExternalRecord) -> Vec<VariationAttribute> {
    if let Some(list) = entry.first_list(ATTRIBUTE_FIELDS) {
        return object_entries(list, "variation attribute")
            .filter_map(|(_, item)| {
                let name = text(&item, ATTRIBUTE_NAME_FIELDS)?;
                let value = text(&item, ATTRIBUTE_VALUE_FIELDS)?;
                Some(VariationAttribute { name, value })
            })
            .collect();
    }

    match entry.first_object(ATTRIBUTE_FIELDS).map(ExternalRecord::into_value) {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(name, value)| {
                let name = clean_text(&Value::String(name.clone()))?;
                let value = clean_text(value)?;
                Some(VariationAttribute { name, value })
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Adds values to the attribute called `name`, creating it when missing.
fn merge_attribute(
    attributes: &mut Vec<ProductAttribute>,
    name: &str,
    values: impl IntoIterator<Item = String>,
    is_variation: bool,
) {
    let index = match attributes.iter().position(|a| a.name == name) {
        Some(index) => index,
        None => {
            attributes.push(ProductAttribute {
                name: name.to_string(),
                values: Vec::new(),
                is_variation,
            });
            attributes.len() - 1
        }
    };

    let attribute = &mut attributes[index];
    for value in values {
        attribute.add_value(value);
    }
    attribute.is_variation |= is_variation;
}

/// `Pack` as an object holding the components, or as a flag with the
/// components at the top level.
fn read_bundle(record: &ExternalRecord, product_name: &str) -> Option<Bundle> {
    let (name, components) = match record.first_present(BUNDLE_FIELDS)? {
        Value::Object(_) => {
            let pack = record.first_object(BUNDLE_FIELDS)?;
            (
                text(&pack, NAME_FIELDS),
                pack.first_list(COMPONENT_FIELDS).cloned(),
            )
        }
        flag if is_truthy(flag) => (None, record.first_list(COMPONENT_FIELDS).cloned()),
        _ => return None,
    };

    let components: Vec<BundleComponent> = object_entries(&components?, "bundle component")
        .filter_map(|(index, entry)| {
            let Some(sku) = entry.first_present(COMPONENT_SKU_FIELDS).and_then(clean_sku) else {
                debug!(index, "Skipping bundle component without sku");
                return None;
            };
            let quantity = int(&entry, COMPONENT_QUANTITY_FIELDS)
                .unwrap_or(1)
                .clamp(1, u32::MAX as i64) as u32;
            Some(BundleComponent { sku, quantity })
        })
        .collect();

    if components.is_empty() {
        return None;
    }

    Some(Bundle {
        name: name.unwrap_or_else(|| product_name.to_string()),
        components,
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "si" | "sí" | "yes" | "s"
        ),
        _ => false,
    }
}

/// Primary slot, four web slots, then a `categories` list.
fn category_slots(record: &ExternalRecord) -> Vec<CategoryRef> {
    let mut slots = Vec::with_capacity(WEB_CATEGORY_SLOTS + 1);
    slots.push(CategoryRef::new(
        record.first_scalar(&[CATEGORY_ID_FIELD]),
        record.first_scalar(&[CATEGORY_NAME_FIELD]),
    ));

    for slot in 1..=WEB_CATEGORY_SLOTS {
        let id_field = format!("ID_CategoriaWeb{}", slot);
        let name_field = format!("NombreCategoriaWeb{}", slot);
        slots.push(CategoryRef::new(
            record.first_scalar(&[id_field.as_str()]),
            record.first_scalar(&[name_field.as_str()]),
        ));
    }

    if let Some(list) = record.first_list(CATEGORY_LIST_FIELDS) {
        for (_, entry) in object_entries(list, "category") {
            slots.push(CategoryRef::new(
                entry.first_scalar(CATEGORY_ENTRY_ID_FIELDS),
                entry.first_scalar(CATEGORY_ENTRY_NAME_FIELDS),
            ));
        }
    }

    slots.retain(|slot| !slot.is_empty());
    slots
}

/// `_verial_product_id` from a store product's `meta_data` list.
fn verial_id_from_meta(platform: &ExternalRecord) -> Option<String> {
    let list = platform.first_list(META_FIELDS)?;
    object_entries(list, "meta")
        .find(|(_, entry)| entry.first_scalar(&["key"]).as_deref() == Some(VERIAL_PRODUCT_ID_META))
        .and_then(|(_, entry)| entry.first_scalar(&["value"]))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use verial_core::Money;

    fn reader() -> ProductReader {
        ProductReader::from_settings(&MappingSettings::default())
    }

    fn record(value: Value) -> ExternalRecord {
        ExternalRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_sku_rejected() {
        let err = reader()
            .read(&record(json!({"Nombre": "Sin referencia", "PVP": 10})))
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingSku);

        // Id 0 is not a usable sku either
        assert!(reader().read(&record(json!({"Id": 0, "Nombre": "x"}))).is_err());
    }

    #[test]
    fn test_sku_priority() {
        let r = reader();
        assert_eq!(
            r.resolve_sku(&record(json!({"ReferenciaBarras": "8412345678905", "Id": 12, "sku": "A"}))),
            Some("8412345678905".into())
        );
        assert_eq!(
            r.resolve_sku(&record(json!({"ReferenciaBarras": " ", "Id": 12, "sku": "A"}))),
            Some("12".into())
        );
        assert_eq!(
            r.resolve_sku(&record(json!({"Id": "abc", "Referencia": "REF-9"}))),
            Some("REF-9".into())
        );
    }

    #[test]
    fn test_simple_product_fields() {
        let draft = reader()
            .read(&record(json!({
                "Id": 101,
                "ReferenciaBarras": "8410000000001",
                "Nombre": "Aceite <b>virgen</b> extra",
                "DescripcionLarga": "<p onclick=\"x()\">Primera presión</p><script>alert(1)</script>",
                "PVP": "12,50",
                "Stock": 4,
                "Peso": "1,2",
                "ID_Categoria": 3,
                "NombreCategoria": "Aceites",
                "ID_CategoriaWeb2": 8,
                "NombreCategoriaWeb2": "Gourmet",
            })))
            .unwrap();

        let p = &draft.product;
        assert_eq!(p.sku, "8410000000001");
        assert_eq!(p.name, "Aceite virgen extra");
        assert_eq!(p.description.as_deref(), Some("<p>Primera presión</p>"));
        assert_eq!(p.price, Money::from_cents(1250));
        assert_eq!(p.stock_status, StockStatus::InStock);
        assert!((p.dimensions.weight - 1.2).abs() < 1e-9);
        assert_eq!(p.product_type, ProductType::Simple);
        assert_eq!(p.external_id, "101");
        assert_eq!(p.meta.get(VERIAL_PRODUCT_ID_META).map(String::as_str), Some("101"));
        assert!(p.category_ids.is_empty());

        assert_eq!(draft.categories.len(), 2);
        assert_eq!(draft.categories[0].external_id.as_deref(), Some("3"));
        assert_eq!(draft.categories[1].name.as_deref(), Some("Gourmet"));
    }

    #[test]
    fn test_name_and_id_fallbacks() {
        let p = reader()
            .read(&record(json!({"sku": "X-1", "Descripcion": "Tornillo 4mm"})))
            .unwrap()
            .product;
        assert_eq!(p.name, "Tornillo 4mm");
        assert_eq!(p.external_id, "X-1");

        let p = reader().read(&record(json!({"sku": "X-2"}))).unwrap().product;
        assert_eq!(p.name, "X-2");
        assert_eq!(p.stock_status, StockStatus::OutOfStock);
    }

    #[test]
    fn test_attributes_both_shapes() {
        let p = reader()
            .read(&record(json!({
                "sku": "CAM-1",
                "Atributos": [
                    {"Nombre": "Material", "Valor": "Algodón"},
                    {"name": "Talla", "values": ["S", "M", "M"]},
                    {"Valor": "sin nombre"},
                    "basura"
                ]
            })))
            .unwrap()
            .product;

        assert_eq!(p.attributes.len(), 2);
        assert_eq!(p.attributes[0].values, vec!["Algodón"]);
        assert_eq!(p.attributes[1].values, vec!["S", "M"]);
        assert!(p.attributes.iter().all(|a| !a.is_variation));
    }

    #[test]
    fn test_variable_product_with_synthetic_discriminator() {
        let p = reader()
            .read(&record(json!({
                "Id": 500,
                "ReferenciaBarras": "CAM-500",
                "Nombre": "Camiseta",
                "PVP": 15,
                "Variaciones": [
                    {"ReferenciaBarras": "CAM-500-R", "Atributos": [{"Nombre": "Color", "Valor": "Rojo"}], "Stock": 3},
                    {"Stock": 0}
                ]
            })))
            .unwrap()
            .product;

        assert_eq!(p.product_type, ProductType::Variable);
        assert_eq!(p.variations.len(), 2);

        let second = &p.variations[1];
        assert_eq!(second.sku, "CAM-500-var-2");
        assert_eq!(
            second.attributes,
            vec![VariationAttribute {
                name: SYNTHETIC_VARIATION_ATTRIBUTE.into(),
                value: "CAM-500-var-2".into()
            }]
        );
        assert_eq!(second.price, Money::from_cents(1500));

        let color = p.attributes.iter().find(|a| a.name == "Color").unwrap();
        assert!(color.is_variation);
        let axis = p
            .attributes
            .iter()
            .find(|a| a.name == SYNTHETIC_VARIATION_ATTRIBUTE)
            .unwrap();
        assert!(axis.is_variation);
        assert_eq!(axis.values, vec!["CAM-500-var-2"]);
    }

    #[test]
    fn test_variable_without_valid_variations_is_simple() {
        let p = reader()
            .read(&record(json!({"sku": "V-1", "Tipo": "variable", "Variaciones": ["x", 3]})))
            .unwrap()
            .product;
        assert_eq!(p.product_type, ProductType::Simple);
        assert!(p.variations.is_empty());
    }

    #[test]
    fn test_bundle_requires_a_component_sku() {
        let p = reader()
            .read(&record(json!({
                "sku": "PACK-1",
                "Nombre": "Lote navidad",
                "Pack": {"Componentes": [
                    {"ReferenciaBarras": "A", "Cantidad": 0},
                    {"sku": "B", "Cantidad": 3},
                    {"Cantidad": 2}
                ]}
            })))
            .unwrap()
            .product;

        assert_eq!(p.product_type, ProductType::Bundle);
        let bundle = p.bundle.unwrap();
        assert_eq!(bundle.name, "Lote navidad");
        assert_eq!(
            bundle.components,
            vec![
                BundleComponent { sku: "A".into(), quantity: 1 },
                BundleComponent { sku: "B".into(), quantity: 3 },
            ]
        );

        let p = reader()
            .read(&record(json!({"sku": "PACK-2", "Pack": true, "Componentes": [{"Cantidad": 2}]})))
            .unwrap()
            .product;
        assert_eq!(p.product_type, ProductType::Simple);
        assert!(p.bundle.is_none());
    }

    #[test]
    fn test_read_is_idempotent() {
        let input = record(json!({
            "Id": 9,
            "Nombre": "Queso",
            "PVP": 7.5,
            "Atributos": [{"Nombre": "Curación", "Valor": "Semi"}],
            "Variaciones": [{"Stock": 1}, {"Stock": 2}]
        }));
        let first = reader().read(&input).unwrap();
        let second = reader().read(&input).unwrap();
        assert!(first.product.same_content(&second.product));
        assert_eq!(first.categories, second.categories);
    }

    #[test]
    fn test_to_external() {
        let platform = record(json!({
            "id": 77,
            "sku": "8410000000001",
            "name": "Aceite",
            "regular_price": "12.50",
            "stock_quantity": 4,
            "dimensions": {"length": "10", "width": "5", "height": ""},
            "meta_data": [{"key": "_verial_product_id", "value": "101"}]
        }));

        let out = product_to_external(&platform);
        assert_eq!(out.get("Id"), Some(&json!("101")));
        assert_eq!(out.get("ReferenciaBarras"), Some(&json!("8410000000001")));
        assert_eq!(out.get("PVP"), Some(&json!("12.50")));
        assert_eq!(out.get("Stock"), Some(&json!(4)));
        assert_eq!(out.get("Grueso"), Some(&json!(10.0)));
        assert_eq!(out.get("Alto"), None);

        assert!(product_to_external(&record(json!({"name": "sin sku"}))).is_empty());
    }
}
