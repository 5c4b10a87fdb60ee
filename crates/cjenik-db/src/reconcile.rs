//! Transactional reconciliation of one crawl batch into the price history.
//!
//! One call = one `(date, chain, stores)` batch = one transaction. The four
//! upsert passes run in foreign-key order (chains → products → stores →
//! store-products) so each layer can cache and flush once before the next
//! layer consumes its generated ids, then the price pass walks store by
//! store. Any error rolls the whole batch back.
//!
//! The price history is sparse: a new `product_prices` row is written only
//! when at least one of the five price fields differs from the most recent
//! prior row, and a re-run on the same date mutates that date's row in place
//! instead of inserting. Running the same batch twice is therefore a no-op.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use cjenik_core::{round2, Product, Store};

use crate::DbError;

/// Counters describing what one reconciliation call changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub chains_created: u64,
    pub stores_created: u64,
    pub products_created: u64,
    pub store_products_created: u64,
    pub prices_added: u64,
    pub prices_updated: u64,
    pub duplicates_skipped: u64,
    pub invalid_skipped: u64,
}

impl ReconcileStats {
    /// True when the call wrote nothing (the idempotent re-run case).
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.chains_created == 0
            && self.stores_created == 0
            && self.products_created == 0
            && self.store_products_created == 0
            && self.prices_added == 0
            && self.prices_updated == 0
    }
}

/// The five price fields of one observation, normalized to two fractional
/// digits half-up. Equality of two `PriceFields` is exactly the "price
/// unchanged" test; an absent field never equals `0.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PriceFields {
    price: Decimal,
    unit_price: Option<Decimal>,
    best_price_30: Option<Decimal>,
    anchor_price: Option<Decimal>,
    special_price: Option<Decimal>,
}

impl PriceFields {
    fn from_product(product: &Product, price: Decimal) -> Self {
        Self {
            price: round2(price),
            unit_price: product.unit_price.map(round2),
            best_price_30: product.best_price_30.map(round2),
            anchor_price: product.anchor_price.map(round2),
            special_price: product.special_price.map(round2),
        }
    }

    fn from_row(row: &LatestPriceRow) -> Self {
        Self {
            price: round2(row.price),
            unit_price: row.unit_price.map(round2),
            best_price_30: row.best_price_30.map(round2),
            anchor_price: row.anchor_price.map(round2),
            special_price: row.special_price.map(round2),
        }
    }
}

/// The most recent `product_prices` row (by `valid_date <= batch date`) for
/// one store-product.
#[derive(Debug, sqlx::FromRow)]
struct LatestPriceRow {
    id: i64,
    store_product_id: i64,
    valid_date: NaiveDate,
    price: Decimal,
    unit_price: Option<Decimal>,
    best_price_30: Option<Decimal>,
    anchor_price: Option<Decimal>,
    special_price: Option<Decimal>,
}

/// Reconcile one batch into the database.
///
/// Idempotent: a second call with identical input changes nothing. Products
/// failing validation are skipped with a warning and never create a
/// store-product for that observation; within-batch duplicate
/// `(store_id, product_id)` pairs are honored once (first occurrence wins)
/// and counted in `duplicates_skipped`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure; the transaction is
/// fully rolled back.
pub async fn reconcile(
    pool: &PgPool,
    date: NaiveDate,
    chain_slug: &str,
    stores: &[Store],
) -> Result<ReconcileStats, DbError> {
    let mut stats = ReconcileStats::default();
    let mut tx = pool.begin().await?;

    // Observations that fail validation never reach any pass.
    let mut valid_items: Vec<Vec<&Product>> = Vec::with_capacity(stores.len());
    for store in stores {
        let mut items = Vec::with_capacity(store.items.len());
        for product in &store.items {
            match product.validate() {
                Ok(()) => items.push(product),
                Err(err) => {
                    stats.invalid_skipped += 1;
                    tracing::warn!(
                        chain = chain_slug,
                        store_id = %store.store_id,
                        error = %err,
                        "skipping invalid product observation"
                    );
                }
            }
        }
        valid_items.push(items);
    }

    // Snapshot caches; rows created below are inserted into them so later
    // lookups within this call see them.
    let chain_rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, slug FROM chains")
        .fetch_all(&mut *tx)
        .await?;
    let mut chains: HashMap<String, i64> = chain_rows
        .into_iter()
        .map(|(id, slug)| (slug, id))
        .collect();

    let mut known_barcodes: HashSet<String> =
        sqlx::query_scalar::<_, String>("SELECT barcode FROM products")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

    // Chain.
    let chain_id = if let Some(&id) = chains.get(chain_slug) {
        id
    } else {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO chains (name, slug) VALUES ($1, $1) RETURNING id")
                .bind(chain_slug)
                .fetch_one(&mut *tx)
                .await?;
        tracing::info!(chain = chain_slug, "adding new chain");
        chains.insert(chain_slug.to_string(), id);
        stats.chains_created += 1;
        id
    };

    // Products. First sighting fixes the descriptive fields; later chains
    // carrying richer data do not upgrade the catalog record.
    for items in &valid_items {
        for product in items {
            let barcode = product.catalog_barcode(chain_slug);
            if known_barcodes.insert(barcode.clone()) {
                sqlx::query(
                    "INSERT INTO products \
                         (barcode, ext_name, ext_brand, ext_category, ext_unit, ext_quantity) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&barcode)
                .bind(&product.product)
                .bind(&product.brand)
                .bind(&product.category)
                .bind(&product.unit)
                .bind(&product.quantity)
                .execute(&mut *tx)
                .await?;
                stats.products_created += 1;
            }
        }
    }

    // Stores. Existing rows get their descriptive fields overwritten from
    // the latest input.
    let store_rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, ext_store_id FROM stores WHERE chain_id = $1")
            .bind(chain_id)
            .fetch_all(&mut *tx)
            .await?;
    let mut store_ids: HashMap<String, i64> = store_rows
        .into_iter()
        .map(|(id, ext_store_id)| (ext_store_id, id))
        .collect();

    for store in stores {
        if let Some(&id) = store_ids.get(&store.store_id) {
            sqlx::query(
                "UPDATE stores SET \
                     ext_name = $1, ext_store_type = $2, ext_street_address = $3, \
                     ext_city = $4, ext_zipcode = $5 \
                 WHERE id = $6",
            )
            .bind(&store.name)
            .bind(&store.store_type)
            .bind(&store.street_address)
            .bind(&store.city)
            .bind(&store.zipcode)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        } else {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO stores \
                     (chain_id, ext_store_id, ext_name, ext_store_type, \
                      ext_street_address, ext_city, ext_zipcode) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING id",
            )
            .bind(chain_id)
            .bind(&store.store_id)
            .bind(&store.name)
            .bind(&store.store_type)
            .bind(&store.street_address)
            .bind(&store.city)
            .bind(&store.zipcode)
            .fetch_one(&mut *tx)
            .await?;
            tracing::info!(chain = chain_slug, store_id = %store.store_id, "adding new store");
            store_ids.insert(store.store_id.clone(), id);
            stats.stores_created += 1;
        }
    }

    // Store-products, loaded for exactly the stores touched in this call.
    // An existing link keeps its first-sighting barcode even if the chain
    // starts publishing a different one.
    let mut touched: Vec<i64> = stores
        .iter()
        .filter_map(|store| store_ids.get(&store.store_id).copied())
        .collect();
    touched.sort_unstable();
    touched.dedup();

    let sp_rows: Vec<(i64, i64, String)> = sqlx::query_as(
        "SELECT id, store_id, ext_product_id FROM store_products WHERE store_id = ANY($1)",
    )
    .bind(&touched)
    .fetch_all(&mut *tx)
    .await?;
    let mut store_products: HashMap<(i64, String), i64> = sp_rows
        .into_iter()
        .map(|(id, store_id, ext_product_id)| ((store_id, ext_product_id), id))
        .collect();

    for (store, items) in stores.iter().zip(&valid_items) {
        let Some(&store_db_id) = store_ids.get(&store.store_id) else {
            continue;
        };
        for product in items {
            let key = (store_db_id, product.product_id.clone());
            if store_products.contains_key(&key) {
                continue;
            }
            let barcode = product.catalog_barcode(chain_slug);
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO store_products (store_id, barcode, ext_product_id) \
                 VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(store_db_id)
            .bind(&barcode)
            .bind(&product.product_id)
            .fetch_one(&mut *tx)
            .await?;
            store_products.insert(key, id);
            stats.store_products_created += 1;
        }
    }

    // Prices, store by store. One query fetches the latest prior row per
    // store-product; the unique (store_product_id, valid_date) constraint
    // makes the DISTINCT ON tie-break unreachable.
    let mut processed: HashSet<(i64, String)> = HashSet::new();
    for (store, items) in stores.iter().zip(&valid_items) {
        let Some(&store_db_id) = store_ids.get(&store.store_id) else {
            continue;
        };
        let mut sp_ids: Vec<i64> = items
            .iter()
            .filter_map(|product| {
                store_products
                    .get(&(store_db_id, product.product_id.clone()))
                    .copied()
            })
            .collect();
        sp_ids.sort_unstable();
        sp_ids.dedup();
        if sp_ids.is_empty() {
            continue;
        }

        let latest_rows: Vec<LatestPriceRow> = sqlx::query_as(
            "SELECT DISTINCT ON (store_product_id) \
                 id, store_product_id, valid_date, price, \
                 unit_price, best_price_30, anchor_price, special_price \
             FROM product_prices \
             WHERE store_product_id = ANY($1) AND valid_date <= $2 \
             ORDER BY store_product_id, valid_date DESC",
        )
        .bind(&sp_ids)
        .bind(date)
        .fetch_all(&mut *tx)
        .await?;
        let latest: HashMap<i64, LatestPriceRow> = latest_rows
            .into_iter()
            .map(|row| (row.store_product_id, row))
            .collect();

        let mut added: u64 = 0;
        let mut updated: u64 = 0;
        for product in items {
            let key = (store_db_id, product.product_id.clone());
            if !processed.insert(key.clone()) {
                stats.duplicates_skipped += 1;
                tracing::warn!(
                    chain = chain_slug,
                    store_id = %store.store_id,
                    product_id = %product.product_id,
                    "skipping duplicate product observation"
                );
                continue;
            }
            let Some(&sp_id) = store_products.get(&key) else {
                continue;
            };
            let Some(price) = product.price else {
                continue;
            };
            let incoming = PriceFields::from_product(product, price);

            match latest.get(&sp_id) {
                Some(row) if row.valid_date == date => {
                    if PriceFields::from_row(row) != incoming {
                        sqlx::query(
                            "UPDATE product_prices SET \
                                 price = $1, unit_price = $2, best_price_30 = $3, \
                                 anchor_price = $4, special_price = $5 \
                             WHERE id = $6",
                        )
                        .bind(incoming.price)
                        .bind(incoming.unit_price)
                        .bind(incoming.best_price_30)
                        .bind(incoming.anchor_price)
                        .bind(incoming.special_price)
                        .bind(row.id)
                        .execute(&mut *tx)
                        .await?;
                        updated += 1;
                    }
                }
                Some(row) if PriceFields::from_row(row) == incoming => {
                    // Price unchanged since the last prior date; sparse
                    // history records nothing.
                }
                _ => {
                    sqlx::query(
                        "INSERT INTO product_prices \
                             (store_product_id, valid_date, price, unit_price, \
                              best_price_30, anchor_price, special_price) \
                         VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    )
                    .bind(sp_id)
                    .bind(date)
                    .bind(incoming.price)
                    .bind(incoming.unit_price)
                    .bind(incoming.best_price_30)
                    .bind(incoming.anchor_price)
                    .bind(incoming.special_price)
                    .execute(&mut *tx)
                    .await?;
                    added += 1;
                }
            }
        }

        if added > 0 || updated > 0 {
            tracing::info!(
                chain = chain_slug,
                store_id = %store.store_id,
                observations = items.len(),
                prices_updated = updated,
                prices_added = added,
                "store reconciled"
            );
        }
        stats.prices_added += added;
        stats.prices_updated += updated;
    }

    tx.commit().await?;
    Ok(stats)
}
