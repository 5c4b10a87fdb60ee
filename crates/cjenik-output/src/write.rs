//! Serialize a chain's stores into the canonical three-file CSV layout.
//!
//! The row types below ARE the file schemas: field order is column order and
//! `serde(rename)` fixes the header names, so a column-set mismatch between
//! rows and schema cannot be constructed. Files are UTF-8 without BOM, LF
//! line endings, minimally quoted (the `csv` crate defaults).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Serialize;

use cjenik_core::Store;

use crate::OutputError;

/// One row of `stores.csv`.
#[derive(Debug, Serialize)]
pub struct StoreRecord {
    pub store_id: String,
    #[serde(rename = "type")]
    pub store_type: String,
    pub address: String,
    pub city: String,
    pub zipcode: String,
}

/// One row of `products.csv`, de-duplicated by `"{chain}:{product_id}"`.
#[derive(Debug, Serialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub unit: String,
    pub quantity: String,
}

/// One row of `prices.csv`. Absent optional decimals serialize as the empty
/// string, never `0` and never a literal `None`.
#[derive(Debug, Serialize)]
pub struct PriceRecord {
    pub store_id: String,
    pub product_id: String,
    pub price: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub best_price_30: Option<Decimal>,
    pub anchor_price: Option<Decimal>,
    pub special_price: Option<Decimal>,
}

/// Flatten stores into the three row lists.
///
/// Products are keyed by `"{chain}:{product_id}"`; the first occurrence wins
/// and later sightings of the same key are dropped from `products.csv` (they
/// still produce price rows). An empty upstream barcode is replaced by the
/// synthetic key so every written product carries some identity.
#[must_use]
pub fn transform_stores(
    stores: &[Store],
) -> (Vec<StoreRecord>, Vec<ProductRecord>, Vec<PriceRecord>) {
    let mut store_rows = Vec::with_capacity(stores.len());
    let mut product_rows = Vec::new();
    let mut seen_products: HashSet<String> = HashSet::new();
    let mut price_rows = Vec::new();

    for store in stores {
        store_rows.push(StoreRecord {
            store_id: store.store_id.clone(),
            store_type: store.store_type.clone(),
            address: store.street_address.clone(),
            city: store.city.clone(),
            zipcode: store.zipcode.clone(),
        });

        for product in &store.items {
            let key = format!("{}:{}", store.chain, product.product_id);
            if seen_products.insert(key.clone()) {
                let barcode = if product.barcode.is_empty() {
                    key
                } else {
                    product.barcode.clone()
                };
                product_rows.push(ProductRecord {
                    product_id: product.product_id.clone(),
                    barcode,
                    name: product.product.clone(),
                    brand: product.brand.clone(),
                    category: product.category.clone(),
                    unit: product.unit.clone(),
                    quantity: product.quantity.clone(),
                });
            }
            price_rows.push(PriceRecord {
                store_id: store.store_id.clone(),
                product_id: product.product_id.clone(),
                price: product.price,
                unit_price: product.unit_price,
                best_price_30: product.best_price_30,
                anchor_price: product.anchor_price,
                special_price: product.special_price,
            });
        }
    }

    (store_rows, product_rows, price_rows)
}

fn save_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), OutputError> {
    if rows.is_empty() {
        tracing::warn!(path = %path.display(), "no data rows, skipping file");
        return Ok(());
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write `stores.csv`, `products.csv` and `prices.csv` for one chain.
///
/// Creates `chain_dir` if needed. A file with zero data rows is skipped
/// entirely rather than written with only a header.
///
/// # Errors
///
/// Returns [`OutputError`] on any filesystem or CSV serialization failure;
/// a partially written set is left on disk and overwritten on re-run.
pub fn save_chain(chain_dir: &Path, stores: &[Store]) -> Result<(), OutputError> {
    fs::create_dir_all(chain_dir)?;
    let (store_rows, product_rows, price_rows) = transform_stores(stores);
    save_csv(&chain_dir.join("stores.csv"), &store_rows)?;
    save_csv(&chain_dir.join("products.csv"), &product_rows)?;
    save_csv(&chain_dir.join("prices.csv"), &price_rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cjenik_core::Product;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid test decimal")
    }

    fn sample_store() -> Store {
        Store {
            chain: "zabac".to_string(),
            store_id: "PJ-2".to_string(),
            name: "Žabac PJ-2".to_string(),
            store_type: "Supermarket".to_string(),
            city: "Zagreb".to_string(),
            street_address: "Tratinska 80a".to_string(),
            zipcode: "10000".to_string(),
            items: vec![
                Product {
                    product_id: "100".to_string(),
                    product: "Mlijeko 2,8%".to_string(),
                    brand: "Dukat".to_string(),
                    category: "mlijeko".to_string(),
                    unit: "L".to_string(),
                    quantity: "1".to_string(),
                    barcode: "38598880001".to_string(),
                    price: Some(dec("1.49")),
                    unit_price: Some(dec("1.49")),
                    best_price_30: Some(dec("1.39")),
                    ..Product::default()
                },
                Product {
                    product_id: "200".to_string(),
                    product: "Kruh polubijeli".to_string(),
                    barcode: String::new(),
                    price: Some(dec("1.10")),
                    ..Product::default()
                },
            ],
        }
    }

    #[test]
    fn save_chain_writes_three_files_with_expected_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chain_dir = dir.path().join("zabac");
        save_chain(&chain_dir, &[sample_store()]).expect("save_chain");

        let stores = std::fs::read_to_string(chain_dir.join("stores.csv")).expect("stores.csv");
        assert!(stores.starts_with("store_id,type,address,city,zipcode\n"));
        assert!(stores.contains("PJ-2,Supermarket,Tratinska 80a,Zagreb,10000"));

        let products =
            std::fs::read_to_string(chain_dir.join("products.csv")).expect("products.csv");
        assert!(products.starts_with("product_id,barcode,name,brand,category,unit,quantity\n"));

        let prices = std::fs::read_to_string(chain_dir.join("prices.csv")).expect("prices.csv");
        assert!(prices.starts_with(
            "store_id,product_id,price,unit_price,best_price_30,anchor_price,special_price\n"
        ));
    }

    #[test]
    fn absent_decimals_render_as_empty_string() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chain_dir = dir.path().join("zabac");
        save_chain(&chain_dir, &[sample_store()]).expect("save_chain");

        let prices = std::fs::read_to_string(chain_dir.join("prices.csv")).expect("prices.csv");
        // Product 200 has only a retail price; the four optional columns are empty.
        assert!(prices.contains("PJ-2,200,1.10,,,,\n"));
        assert!(!prices.contains("None"));
    }

    #[test]
    fn empty_barcode_becomes_synthetic_key() {
        let (_, product_rows, _) = transform_stores(&[sample_store()]);
        let product = product_rows
            .iter()
            .find(|p| p.product_id == "200")
            .expect("product 200 present");
        assert_eq!(product.barcode, "zabac:200");
    }

    #[test]
    fn products_are_deduplicated_first_occurrence_wins() {
        let mut second = sample_store();
        second.store_id = "PJ-4".to_string();
        second.items[0].product = "different name".to_string();

        let (store_rows, product_rows, price_rows) =
            transform_stores(&[sample_store(), second]);
        assert_eq!(store_rows.len(), 2);
        assert_eq!(product_rows.len(), 2, "same key counted once");
        assert_eq!(price_rows.len(), 4, "every observation keeps a price row");
        let product = product_rows
            .iter()
            .find(|p| p.product_id == "100")
            .expect("product 100 present");
        assert_eq!(product.name, "Mlijeko 2,8%", "first occurrence wins");
    }

    #[test]
    fn zero_row_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let chain_dir = dir.path().join("empty");
        save_chain(&chain_dir, &[]).expect("save_chain");
        assert!(!chain_dir.join("stores.csv").exists());
        assert!(!chain_dir.join("products.csv").exists());
        assert!(!chain_dir.join("prices.csv").exists());
    }

    #[test]
    fn decimal_scale_is_preserved_as_written() {
        let mut store = sample_store();
        store.items[0].price = Some(dec("2.50"));
        let (_, _, price_rows) = transform_stores(&[store]);
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&price_rows[0]).expect("serialize");
        let bytes = writer.into_inner().expect("into_inner");
        let line = String::from_utf8(bytes).expect("utf8");
        assert!(line.contains(",2.50,"), "trailing zero kept: {line}");
    }
}
