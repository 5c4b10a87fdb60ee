//! The per-date pipeline: fetch every chain, write canonical CSVs, optionally
//! reconcile into the database, and package the day into a ZIP.
//!
//! Chains run sequentially and failures stay contained: a chain that fetches
//! nothing (or whose database write fails) is logged and skipped, while
//! filesystem failures abort the whole date. The alternate entry point
//! [`run_from_csv`] replaces the web fetch with the CSV reader so an existing
//! archive can be replayed, typically into the database.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::PgPool;

use cjenik_core::{AppConfig, Store};
use cjenik_sources::ChainSource;

/// Per-chain crawl statistics, logged after each chain completes.
#[derive(Debug)]
struct ChainStats {
    elapsed_secs: f64,
    stores: usize,
    products: usize,
    prices: usize,
}

impl ChainStats {
    fn collect(stores: &[Store], started: Instant) -> Self {
        let distinct: HashSet<&str> = stores
            .iter()
            .flat_map(|store| store.items.iter().map(|p| p.product_id.as_str()))
            .collect();
        Self {
            elapsed_secs: started.elapsed().as_secs_f64(),
            stores: stores.len(),
            products: distinct.len(),
            prices: stores.iter().map(|store| store.items.len()).sum(),
        }
    }
}

/// Connect the reconciliation pool and bring the schema up to date.
async fn open_db(config: &AppConfig) -> anyhow::Result<PgPool> {
    config
        .require_database_url()
        .context("database writes requested")?;
    let pool = cjenik_db::connect_pool_from_config(config)
        .await
        .context("failed to connect to database")?;
    let applied = cjenik_db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations");
    }
    Ok(pool)
}

/// Write one chain's CSVs and optionally reconcile it into the database.
///
/// A database failure is contained: the chain's CSV output stays on disk,
/// the error is logged, and the pipeline moves on. A CSV write failure is
/// returned — it poisons the whole date.
async fn process_chain(
    date_dir: &Path,
    pool: Option<&PgPool>,
    date: NaiveDate,
    slug: &str,
    stores: &[Store],
    started: Instant,
) -> anyhow::Result<()> {
    cjenik_output::save_chain(&date_dir.join(slug), stores)
        .with_context(|| format!("failed to write CSV output for {slug}"))?;

    if let Some(pool) = pool {
        match cjenik_db::reconcile(pool, date, slug, stores).await {
            Ok(stats) => {
                tracing::info!(
                    chain = slug,
                    stores_created = stats.stores_created,
                    products_created = stats.products_created,
                    prices_added = stats.prices_added,
                    prices_updated = stats.prices_updated,
                    duplicates_skipped = stats.duplicates_skipped,
                    invalid_skipped = stats.invalid_skipped,
                    "database reconciliation complete"
                );
            }
            Err(err) => {
                tracing::error!(chain = slug, error = %err, "database reconciliation failed");
            }
        }
    }

    let stats = ChainStats::collect(stores, started);
    tracing::info!(
        chain = slug,
        elapsed_secs = stats.elapsed_secs,
        stores = stats.stores,
        products = stats.products,
        prices = stats.prices,
        "chain complete"
    );
    Ok(())
}

fn date_paths(root: &Path, date: NaiveDate) -> (PathBuf, PathBuf) {
    let date_str = date.format("%Y-%m-%d").to_string();
    (root.join(&date_str), root.join(format!("{date_str}.zip")))
}

fn finish_archive(date_dir: &Path, zip_path: &Path, date: NaiveDate) -> anyhow::Result<PathBuf> {
    cjenik_output::copy_archive_info(date_dir).context("failed to write archive notice")?;
    cjenik_output::create_archive(date_dir, zip_path)
        .with_context(|| format!("failed to create archive for {date}"))?;
    tracing::info!(zip = %zip_path.display(), %date, "archive created");
    Ok(zip_path.to_path_buf())
}

/// Crawl `chains` (or all registered chains) for `date` under `root`.
///
/// Returns the path of the created ZIP.
///
/// # Errors
///
/// Fails on filesystem/archive errors and on database connection problems
/// when `process_db` is set; per-chain fetch and reconciliation failures are
/// only logged.
pub async fn run(
    config: &AppConfig,
    root: &Path,
    date: NaiveDate,
    chains: Option<&[String]>,
    process_db: bool,
) -> anyhow::Result<PathBuf> {
    let sources = cjenik_sources::registry(config).context("failed to build chain registry")?;
    let selected: Vec<_> = sources
        .into_iter()
        .filter(|source| chains.map_or(true, |list| list.iter().any(|c| c == source.slug())))
        .collect();

    let (date_dir, zip_path) = date_paths(root, date);
    std::fs::create_dir_all(&date_dir)
        .with_context(|| format!("failed to create {}", date_dir.display()))?;

    let pool = if process_db {
        Some(open_db(config).await?)
    } else {
        None
    };

    for source in &selected {
        let slug = source.slug();
        tracing::info!(chain = slug, %date, "starting crawl");
        let started = Instant::now();

        let stores = match source.fetch(date).await {
            Ok(stores) => stores,
            Err(err) => {
                tracing::error!(chain = slug, %date, error = %err, "crawl failed");
                continue;
            }
        };
        if stores.is_empty() {
            tracing::error!(chain = slug, %date, "no stores imported");
            continue;
        }

        process_chain(&date_dir, pool.as_ref(), date, slug, &stores, started).await?;
    }

    finish_archive(&date_dir, &zip_path, date)
}

/// Like [`run`], but rehydrates each chain from `csv_dir/<date>/<chain>/`
/// instead of crawling the web. Chains without input for the date are
/// skipped, not errors.
///
/// # Errors
///
/// Same failure containment as [`run`]; unreadable CSV input is fatal.
pub async fn run_from_csv(
    config: &AppConfig,
    root: &Path,
    date: NaiveDate,
    chains: Option<&[String]>,
    csv_dir: &Path,
    process_db: bool,
) -> anyhow::Result<PathBuf> {
    let slugs: Vec<String> = match chains {
        Some(list) => list.to_vec(),
        None => cjenik_sources::registry(config)
            .context("failed to build chain registry")?
            .iter()
            .map(|source| source.slug().to_string())
            .collect(),
    };

    let (date_dir, zip_path) = date_paths(root, date);
    std::fs::create_dir_all(&date_dir)
        .with_context(|| format!("failed to create {}", date_dir.display()))?;

    let pool = if process_db {
        Some(open_db(config).await?)
    } else {
        None
    };

    for slug in &slugs {
        let started = Instant::now();
        let loaded = cjenik_output::load_chain(csv_dir, slug, date)
            .with_context(|| format!("failed to read CSV input for {slug}"))?;
        let Some(stores) = loaded else {
            tracing::info!(chain = %slug, %date, "no CSV input, skipping");
            continue;
        };
        if stores.is_empty() {
            tracing::warn!(chain = %slug, %date, "CSV input holds no stores, skipping");
            continue;
        }

        process_chain(&date_dir, pool.as_ref(), date, slug, &stores, started).await?;
    }

    finish_archive(&date_dir, &zip_path, date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: None,
            timezone: "Europe/Zagreb".to_string(),
            log_level: "info".to_string(),
            http_timeout_secs: 5,
            user_agent: "cjenik-test/0.1".to_string(),
            db_max_connections: 1,
            db_min_connections: 1,
            db_acquire_timeout_secs: 1,
        }
    }

    fn write_csv_fixture(csv_root: &Path, date: &str, chain: &str) {
        let dir = csv_root.join(date).join(chain);
        std::fs::create_dir_all(&dir).expect("create fixture dir");
        std::fs::write(
            dir.join("stores.csv"),
            "store_id,type,address,city,zipcode\nS1,supermarket,Ilica 1,Zagreb,10000\n",
        )
        .expect("stores.csv");
        std::fs::write(
            dir.join("products.csv"),
            "product_id,barcode,name,brand,category,unit,quantity\nP1,12345678,Mlijeko,Dukat,mlijeko,L,1\n",
        )
        .expect("products.csv");
        std::fs::write(
            dir.join("prices.csv"),
            "store_id,product_id,price,unit_price,best_price_30,anchor_price,special_price\nS1,P1,1.99,1.99,,,\n",
        )
        .expect("prices.csv");
    }

    #[tokio::test]
    async fn run_from_csv_produces_output_tree_and_zip() {
        let input = tempfile::tempdir().expect("input dir");
        let output = tempfile::tempdir().expect("output dir");
        write_csv_fixture(input.path(), "2025-05-10", "zabac");

        let date = NaiveDate::from_ymd_opt(2025, 5, 10).expect("valid date");
        let chains = vec!["zabac".to_string()];
        let zip_path = run_from_csv(
            &test_config(),
            output.path(),
            date,
            Some(&chains),
            input.path(),
            false,
        )
        .await
        .expect("run_from_csv");

        assert_eq!(zip_path, output.path().join("2025-05-10.zip"));
        assert!(zip_path.is_file());

        let date_dir = output.path().join("2025-05-10");
        assert!(date_dir.join("zabac").join("stores.csv").is_file());
        assert!(date_dir.join("zabac").join("products.csv").is_file());
        assert!(date_dir.join("zabac").join("prices.csv").is_file());
        assert!(date_dir.join("archive-info.txt").is_file());

        let prices = std::fs::read_to_string(date_dir.join("zabac").join("prices.csv"))
            .expect("prices.csv");
        assert!(prices.contains("S1,P1,1.99,1.99,,,"));
    }

    #[tokio::test]
    async fn run_from_csv_skips_chains_without_input() {
        let input = tempfile::tempdir().expect("input dir");
        let output = tempfile::tempdir().expect("output dir");
        write_csv_fixture(input.path(), "2025-05-10", "zabac");

        let date = NaiveDate::from_ymd_opt(2025, 5, 10).expect("valid date");
        let chains = vec!["zabac".to_string(), "jadranka_trgovina".to_string()];
        let zip_path = run_from_csv(
            &test_config(),
            output.path(),
            date,
            Some(&chains),
            input.path(),
            false,
        )
        .await
        .expect("run_from_csv tolerates missing chains");

        assert!(zip_path.is_file());
        let date_dir = output.path().join("2025-05-10");
        assert!(date_dir.join("zabac").is_dir());
        assert!(!date_dir.join("jadranka_trgovina").exists());
    }
}
