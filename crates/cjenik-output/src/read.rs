//! Rehydrate stores-with-products from a canonical CSV directory.
//!
//! Inverse of [`crate::write`]: reads `<csv_root>/<date>/<chain>/` back into
//! the in-memory model so the pipeline can run against an existing archive
//! instead of the chain's web surface. All columns are read as raw strings
//! and converted here; unknown columns are ignored and missing optional
//! columns default to empty.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use cjenik_core::{Product, Store};

use crate::OutputError;

#[derive(Debug, Deserialize)]
struct RawStoreRecord {
    #[serde(default)]
    store_id: String,
    #[serde(default, rename = "type")]
    store_type: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    zipcode: String,
}

#[derive(Debug, Deserialize)]
struct RawProductRecord {
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    barcode: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    brand: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct RawPriceRecord {
    #[serde(default)]
    store_id: String,
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    unit_price: String,
    #[serde(default)]
    best_price_30: String,
    #[serde(default)]
    anchor_price: String,
    #[serde(default)]
    special_price: String,
}

/// A decimal cell that fails to parse is absent, never zero.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<Decimal>().ok()
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, OutputError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    row = index + 1,
                    error = %err,
                    "skipping malformed CSV row"
                );
            }
        }
    }
    Ok(rows)
}

/// Load one chain's stores-with-products from `<csv_root>/<date>/<chain>/`.
///
/// Returns `Ok(None)` when the chain directory does not exist for that date
/// (the caller treats this as "nothing published", not an error). Price rows
/// referencing an unknown store or product are skipped. A missing retail
/// price defaults to zero — the archive format has always allowed it, even
/// though the database layer refuses such rows.
///
/// # Errors
///
/// Returns [`OutputError`] for any I/O failure other than the absent chain
/// directory.
pub fn load_chain(
    csv_root: &Path,
    chain: &str,
    date: NaiveDate,
) -> Result<Option<Vec<Store>>, OutputError> {
    let dir = csv_root
        .join(date.format("%Y-%m-%d").to_string())
        .join(chain);
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut stores: HashMap<String, Store> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for raw in read_rows::<RawStoreRecord>(&dir.join("stores.csv"))? {
        if raw.store_id.is_empty() {
            continue;
        }
        order.push(raw.store_id.clone());
        stores.insert(
            raw.store_id.clone(),
            Store {
                chain: chain.to_string(),
                store_id: raw.store_id.clone(),
                // stores.csv carries no display name; the id stands in.
                name: raw.store_id,
                store_type: raw.store_type,
                city: raw.city,
                street_address: raw.address,
                zipcode: raw.zipcode,
                items: Vec::new(),
            },
        );
    }

    let mut products: HashMap<String, RawProductRecord> = HashMap::new();
    for raw in read_rows::<RawProductRecord>(&dir.join("products.csv"))? {
        if raw.product_id.is_empty() {
            continue;
        }
        products.insert(raw.product_id.clone(), raw);
    }

    for raw in read_rows::<RawPriceRecord>(&dir.join("prices.csv"))? {
        if raw.store_id.is_empty() || raw.product_id.is_empty() {
            continue;
        }
        let Some(store) = stores.get_mut(&raw.store_id) else {
            continue;
        };
        let Some(meta) = products.get(&raw.product_id) else {
            continue;
        };

        store.items.push(Product {
            product_id: raw.product_id.clone(),
            product: meta.name.clone(),
            brand: meta.brand.clone(),
            category: meta.category.clone(),
            unit: meta.unit.clone(),
            quantity: meta.quantity.clone(),
            barcode: meta.barcode.clone(),
            price: Some(parse_decimal(&raw.price).unwrap_or(Decimal::ZERO)),
            unit_price: parse_decimal(&raw.unit_price),
            best_price_30: parse_decimal(&raw.best_price_30),
            anchor_price: parse_decimal(&raw.anchor_price),
            special_price: parse_decimal(&raw.special_price),
            ..Product::default()
        });
    }

    Ok(Some(
        order
            .into_iter()
            .filter_map(|id| stores.remove(&id))
            .collect(),
    ))
}
