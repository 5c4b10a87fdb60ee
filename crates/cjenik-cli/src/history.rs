//! Historical backfill: iterate a date range and crawl the days that are
//! not on disk yet.

use std::path::Path;

use chrono::NaiveDate;

use cjenik_core::AppConfig;

use crate::pipeline;

/// Crawl every day in `[start, end]`, inclusive.
///
/// A day whose date directory or ZIP already exists under `root` is skipped.
/// Database processing is never requested here — historical data is replayed
/// into the database later via `crawl --from-csv-dir`. Per-day failures are
/// logged and do not abort the range.
///
/// # Errors
///
/// Only fails on errors outside the per-day loop (none today); kept fallible
/// for symmetry with [`pipeline::run`].
pub async fn run_range(
    config: &AppConfig,
    root: &Path,
    start: NaiveDate,
    end: NaiveDate,
    chains: Option<&[String]>,
) -> anyhow::Result<()> {
    let mut day = start;
    while day <= end {
        let date_str = day.format("%Y-%m-%d").to_string();
        if root.join(&date_str).exists() || root.join(format!("{date_str}.zip")).exists() {
            tracing::info!(date = %date_str, "already archived, skipping");
        } else {
            tracing::info!(date = %date_str, "fetching price data");
            match pipeline::run(config, root, day, chains, false).await {
                Ok(zip_path) => tracing::info!(zip = %zip_path.display(), "day complete"),
                Err(err) => tracing::error!(date = %date_str, error = %err, "day failed"),
            }
        }
        let Some(next) = day.succ_opt() else { break };
        day = next;
    }
    Ok(())
}
