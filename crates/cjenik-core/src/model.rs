//! Canonical in-memory model shared by every chain source.
//!
//! A [`Store`] owns the [`Product`] observations made at that location on a
//! given day. Both are plain value types; the database layer keys everything
//! off `(chain, store_id)` and the effective barcode, so nothing here holds a
//! back-pointer or a generated id.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round a monetary value to exactly two fractional digits, half-up.
///
/// This is the single normalization applied before prices are compared or
/// stored; `10.995` becomes `11.00`.
#[must_use]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute the barcode a product is cataloged under.
///
/// Upstream barcodes are kept verbatim only when they look like a real
/// EAN-style code: decimal digits, at least 8 of them. Everything else
/// (empty strings, internal PLU codes, dirty scanner output) falls back to
/// the synthetic `"{chain}:{product_id}"` form so the product still gets a
/// stable catalog identity.
#[must_use]
pub fn effective_barcode(barcode: &str, chain: &str, product_id: &str) -> String {
    if barcode.len() >= 8 && barcode.bytes().all(|b| b.is_ascii_digit()) {
        barcode.to_string()
    } else {
        format!("{chain}:{product_id}")
    }
}

/// Reasons a [`Product`] fails validation at the database boundary.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidProduct {
    #[error("product has empty product_id")]
    EmptyProductId,

    #[error("product {product_id} has no retail price")]
    MissingPrice { product_id: String },

    #[error("product {product_id} has negative {field}: {value}")]
    NegativeDecimal {
        product_id: String,
        field: &'static str,
        value: Decimal,
    },
}

/// A single product observation as published by one chain on one day.
///
/// `price` is `Option` even though a valid observation always carries one:
/// the CSV reader substitutes zero for a missing price (a long-standing
/// quirk of the archive format), while the reconciler refuses such rows via
/// [`Product::validate`]. Keeping the absence observable lets both policies
/// coexist.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Product {
    /// Chain-local product identifier, never empty for a valid product.
    pub product_id: String,
    /// Display name.
    pub product: String,
    pub brand: String,
    pub category: String,
    /// Unit of measure, e.g. "kg" or "kom".
    pub unit: String,
    /// Amount, e.g. "500g" or "1L".
    pub quantity: String,
    pub packaging: String,
    /// Upstream barcode; may be empty or invalid. See [`effective_barcode`].
    pub barcode: String,

    pub price: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    /// Lowest price in the last 30 days.
    pub best_price_30: Option<Decimal>,
    /// Reference price, usually anchored to 2025-05-02.
    pub anchor_price: Option<Decimal>,
    /// Promotional price during a special form of sale.
    pub special_price: Option<Decimal>,
    /// Initial price for newly added products, where published.
    pub initial_price: Option<Decimal>,

    /// Date of the reference price, as published (free-form).
    pub anchor_price_date: Option<String>,
    pub date_added: Option<NaiveDate>,
}

impl Product {
    /// Check the invariants the reconciler relies on: a non-empty id, a
    /// present retail price, and no negative money anywhere.
    ///
    /// # Errors
    ///
    /// Returns the first violated [`InvalidProduct`] invariant.
    pub fn validate(&self) -> Result<(), InvalidProduct> {
        if self.product_id.is_empty() {
            return Err(InvalidProduct::EmptyProductId);
        }
        let Some(price) = self.price else {
            return Err(InvalidProduct::MissingPrice {
                product_id: self.product_id.clone(),
            });
        };
        let fields: [(&'static str, Option<Decimal>); 6] = [
            ("price", Some(price)),
            ("unit_price", self.unit_price),
            ("best_price_30", self.best_price_30),
            ("anchor_price", self.anchor_price),
            ("special_price", self.special_price),
            ("initial_price", self.initial_price),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                if value.is_sign_negative() && !value.is_zero() {
                    return Err(InvalidProduct::NegativeDecimal {
                        product_id: self.product_id.clone(),
                        field,
                        value,
                    });
                }
            }
        }
        Ok(())
    }

    /// Barcode this product is cataloged under, per [`effective_barcode`].
    #[must_use]
    pub fn catalog_barcode(&self, chain: &str) -> String {
        effective_barcode(&self.barcode, chain, &self.product_id)
    }
}

/// A physical store location and the products observed there.
///
/// `(chain, store_id)` uniquely identifies a store across the whole system.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Store {
    /// Chain slug, lowercase (e.g. "zabac").
    pub chain: String,
    /// Chain-local store identifier.
    pub store_id: String,
    pub name: String,
    /// E.g. "supermarket", "hipermarket".
    pub store_type: String,
    pub city: String,
    pub street_address: String,
    pub zipcode: String,
    pub items: Vec<Product>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid test decimal")
    }

    #[test]
    fn round2_half_up_at_midpoint() {
        assert_eq!(round2(dec("10.995")), dec("11.00"));
        assert_eq!(round2(dec("10.994")), dec("10.99"));
        assert_eq!(round2(dec("1.005")), dec("1.01"));
    }

    #[test]
    fn round2_preserves_two_place_values() {
        assert_eq!(round2(dec("1.99")), dec("1.99"));
        assert_eq!(round2(dec("0")), dec("0.00"));
    }

    #[test]
    fn effective_barcode_keeps_valid_ean() {
        assert_eq!(effective_barcode("12345678", "acme", "P1"), "12345678");
        assert_eq!(
            effective_barcode("3859888000001", "acme", "P1"),
            "3859888000001"
        );
    }

    #[test]
    fn effective_barcode_synthesizes_for_short_or_non_digit() {
        assert_eq!(effective_barcode("", "acme", "P1"), "acme:P1");
        assert_eq!(effective_barcode("1234567", "acme", "P1"), "acme:P1");
        assert_eq!(effective_barcode("12AB5678", "acme", "P1"), "acme:P1");
        assert_eq!(effective_barcode("1234 5678", "acme", "P1"), "acme:P1");
    }

    #[test]
    fn validate_rejects_missing_price() {
        let product = Product {
            product_id: "P1".to_string(),
            ..Product::default()
        };
        assert_eq!(
            product.validate(),
            Err(InvalidProduct::MissingPrice {
                product_id: "P1".to_string()
            })
        );
    }

    #[test]
    fn validate_rejects_empty_product_id() {
        let product = Product {
            price: Some(dec("1.99")),
            ..Product::default()
        };
        assert_eq!(product.validate(), Err(InvalidProduct::EmptyProductId));
    }

    #[test]
    fn validate_rejects_negative_optional_decimal() {
        let product = Product {
            product_id: "P1".to_string(),
            price: Some(dec("1.99")),
            special_price: Some(dec("-0.01")),
            ..Product::default()
        };
        assert!(matches!(
            product.validate(),
            Err(InvalidProduct::NegativeDecimal {
                field: "special_price",
                ..
            })
        ));
    }

    #[test]
    fn validate_accepts_zero_price() {
        let product = Product {
            product_id: "P1".to_string(),
            price: Some(Decimal::ZERO),
            ..Product::default()
        };
        assert_eq!(product.validate(), Ok(()));
    }

    #[test]
    fn catalog_barcode_uses_chain_and_product_id() {
        let product = Product {
            product_id: "P1".to_string(),
            barcode: "n/a".to_string(),
            price: Some(dec("1.00")),
            ..Product::default()
        };
        assert_eq!(product.catalog_barcode("zabac"), "zabac:P1");
    }
}
