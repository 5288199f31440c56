use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sabueso_core::{DomainError, DomainResult, ProductId, serde_ext::double_option};

/// Catalog product.
///
/// `stock` is the cached balance of the product's movement ledger. It is
/// read-only from the catalog's point of view: neither [`NewProduct`] nor
/// [`ProductUpdate`] can set it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub sku: String,
    pub barcode: Option<String>,
    pub stock: i64,
    /// Prices in cents.
    pub retail_price: i64,
    pub wholesale_price: i64,
    /// Weights in grams.
    pub weight: i32,
    pub extra_weight: i32,
    pub brand_id: i64,
    pub animal_id: i64,
    pub product_line_id: Option<i64>,
    pub sub_product_line_id: Option<i64>,
    pub animal_age_id: Option<i64>,
    pub animal_size_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

/// Product creation request.
///
/// `initial_stock` is not written to the product row; the catalog records it
/// as a `purchase_in` movement in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sku: String,
    pub barcode: Option<String>,
    pub retail_price: i64,
    pub wholesale_price: i64,
    pub weight: i32,
    #[serde(default)]
    pub extra_weight: i32,
    pub brand_id: i64,
    pub animal_id: i64,
    pub product_line_id: Option<i64>,
    pub sub_product_line_id: Option<i64>,
    pub animal_age_id: Option<i64>,
    pub animal_size_id: Option<i64>,
    #[serde(default)]
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn normalized(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        ensure_non_negative("retail_price", self.retail_price)?;
        ensure_non_negative("wholesale_price", self.wholesale_price)?;
        ensure_non_negative("weight", i64::from(self.weight))?;
        ensure_non_negative("extra_weight", i64::from(self.extra_weight))?;
        ensure_non_negative("initial_stock", self.initial_stock)?;
        ensure_positive("brand_id", self.brand_id)?;
        ensure_positive("animal_id", self.animal_id)?;

        Ok(Self {
            name,
            description: self.description.trim().to_string(),
            sku: self.sku.trim().to_string(),
            barcode: self.barcode.map(|b| validate_barcode(&b)).transpose()?,
            ..self
        })
    }
}

/// Partial product edit. Stock is deliberately absent: balance changes go
/// through the movement ledger only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    /// `Some(None)` clears the barcode.
    #[serde(default, deserialize_with = "double_option")]
    pub barcode: Option<Option<String>>,
    pub retail_price: Option<i64>,
    pub wholesale_price: Option<i64>,
    pub weight: Option<i32>,
    pub extra_weight: Option<i32>,
    pub brand_id: Option<i64>,
    pub animal_id: Option<i64>,
    /// `Some(None)` detaches the product from its line.
    #[serde(default, deserialize_with = "double_option")]
    pub product_line_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub sub_product_line_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub animal_age_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub animal_size_id: Option<Option<i64>>,
    pub is_deleted: Option<bool>,
}

impl ProductUpdate {
    pub fn normalized(self) -> DomainResult<Self> {
        if self == Self::default() {
            return Err(DomainError::validation("no fields to update"));
        }
        let name = match self.name {
            Some(n) if n.trim().is_empty() => {
                return Err(DomainError::validation("name cannot be empty"));
            }
            other => other.map(|n| n.trim().to_string()),
        };
        if let Some(p) = self.retail_price {
            ensure_non_negative("retail_price", p)?;
        }
        if let Some(p) = self.wholesale_price {
            ensure_non_negative("wholesale_price", p)?;
        }
        if let Some(w) = self.weight {
            ensure_non_negative("weight", i64::from(w))?;
        }
        if let Some(w) = self.extra_weight {
            ensure_non_negative("extra_weight", i64::from(w))?;
        }
        if let Some(id) = self.brand_id {
            ensure_positive("brand_id", id)?;
        }
        if let Some(id) = self.animal_id {
            ensure_positive("animal_id", id)?;
        }
        for (field, id) in [
            ("product_line_id", self.product_line_id),
            ("sub_product_line_id", self.sub_product_line_id),
            ("animal_age_id", self.animal_age_id),
            ("animal_size_id", self.animal_size_id),
        ] {
            if let Some(Some(id)) = id {
                ensure_positive(field, id)?;
            }
        }
        let barcode = match self.barcode {
            Some(Some(b)) => Some(Some(validate_barcode(&b)?)),
            other => other,
        };

        Ok(Self {
            name,
            barcode,
            ..self
        })
    }

    /// Apply the edit to an in-memory product (used by the in-memory catalog).
    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(v) = &self.name {
            product.name = v.clone();
        }
        if let Some(v) = &self.description {
            product.description = v.clone();
        }
        if let Some(v) = &self.sku {
            product.sku = v.clone();
        }
        if let Some(v) = &self.barcode {
            product.barcode = v.clone();
        }
        if let Some(v) = self.retail_price {
            product.retail_price = v;
        }
        if let Some(v) = self.wholesale_price {
            product.wholesale_price = v;
        }
        if let Some(v) = self.weight {
            product.weight = v;
        }
        if let Some(v) = self.extra_weight {
            product.extra_weight = v;
        }
        if let Some(v) = self.brand_id {
            product.brand_id = v;
        }
        if let Some(v) = self.animal_id {
            product.animal_id = v;
        }
        if let Some(v) = self.product_line_id {
            product.product_line_id = v;
        }
        if let Some(v) = self.sub_product_line_id {
            product.sub_product_line_id = v;
        }
        if let Some(v) = self.animal_age_id {
            product.animal_age_id = v;
        }
        if let Some(v) = self.animal_size_id {
            product.animal_size_id = v;
        }
        if let Some(v) = self.is_deleted {
            product.is_deleted = v;
        }
        product.updated_at = now;
    }
}

/// Barcodes are EAN-8 .. ITF-14 style: 8 to 14 ASCII digits.
pub fn validate_barcode(raw: &str) -> DomainResult<String> {
    let code = raw.trim();
    if !(8..=14).contains(&code.len()) || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::validation("barcode must be 8 to 14 digits"));
    }
    Ok(code.to_string())
}

fn ensure_non_negative(field: &str, value: i64) -> DomainResult<()> {
    if value < 0 {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

fn ensure_positive(field: &str, value: i64) -> DomainResult<()> {
    if value <= 0 {
        return Err(DomainError::validation(format!("{field} must be a positive integer")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_new_product() -> NewProduct {
        NewProduct {
            name: " Old Prince Cordero ".to_string(),
            description: "Cordero patagonico".to_string(),
            sku: "OP-COR-15".to_string(),
            barcode: Some("7791234567890".to_string()),
            retail_price: 6_000_000,
            wholesale_price: 4_000_000,
            weight: 15_000,
            extra_weight: 0,
            brand_id: 1,
            animal_id: 1,
            product_line_id: None,
            sub_product_line_id: None,
            animal_age_id: None,
            animal_size_id: None,
            initial_stock: 100,
        }
    }

    #[test]
    fn new_product_is_trimmed() {
        let p = sample_new_product().normalized().unwrap();
        assert_eq!(p.name, "Old Prince Cordero");
        assert_eq!(p.initial_stock, 100);
    }

    #[test]
    fn new_product_rejects_negative_initial_stock() {
        let err = NewProduct {
            initial_stock: -1,
            ..sample_new_product()
        }
        .normalized()
        .unwrap_err();
        assert_eq!(err, DomainError::validation("initial_stock cannot be negative"));
    }

    #[test]
    fn new_product_requires_brand_and_animal() {
        let err = NewProduct {
            brand_id: 0,
            ..sample_new_product()
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(ProductUpdate::default().normalized().is_err());
    }

    #[test]
    fn update_can_clear_barcode() {
        let update = ProductUpdate {
            barcode: Some(None),
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(update.barcode, Some(None));
    }

    #[test]
    fn update_sets_and_clears_optional_references() {
        let update: ProductUpdate = serde_json::from_str(
            r#"{ "product_line_id": 2, "animal_age_id": null }"#,
        )
        .unwrap();
        let update = update.normalized().unwrap();
        assert_eq!(update.product_line_id, Some(Some(2)));
        assert_eq!(update.animal_age_id, Some(None));
        assert_eq!(update.animal_size_id, None);

        let err = ProductUpdate {
            sub_product_line_id: Some(Some(0)),
            ..Default::default()
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn apply_to_never_changes_stock() {
        let now = Utc::now();
        let mut product = Product {
            id: ProductId::from_raw(1),
            name: "A".to_string(),
            description: String::new(),
            sku: String::new(),
            barcode: None,
            stock: 42,
            retail_price: 1,
            wholesale_price: 1,
            weight: 1,
            extra_weight: 0,
            brand_id: 1,
            animal_id: 1,
            product_line_id: None,
            sub_product_line_id: None,
            animal_age_id: None,
            animal_size_id: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        ProductUpdate {
            name: Some("B".to_string()),
            retail_price: Some(99),
            ..Default::default()
        }
        .apply_to(&mut product, now);

        assert_eq!(product.name, "B");
        assert_eq!(product.retail_price, 99);
        assert_eq!(product.stock, 42);
    }

    #[test]
    fn barcode_validation() {
        assert_eq!(validate_barcode(" 12345678 ").unwrap(), "12345678");
        assert!(validate_barcode("1234567").is_err());
        assert!(validate_barcode("123456789012345").is_err());
        assert!(validate_barcode("12345abc").is_err());
    }

    proptest! {
        #[test]
        fn any_digit_string_of_valid_length_is_a_barcode(code in "[0-9]{8,14}") {
            prop_assert_eq!(validate_barcode(&code).unwrap(), code);
        }
    }
}
