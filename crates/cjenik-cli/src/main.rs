mod history;
mod pipeline;

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// The price transparency regulation took effect on this date; no chain
/// publishes price lists from before it.
const DEFAULT_HISTORY_START: NaiveDate = match NaiveDate::from_ymd_opt(2025, 5, 2) {
    Some(date) => date,
    None => panic!("invalid default history start date"),
};

#[derive(Debug, Parser)]
#[command(name = "cjenik")]
#[command(about = "Croatian retail price crawler and price-history importer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl retail chains for one date, write CSVs and a dated ZIP
    Crawl(CrawlArgs),
    /// Fetch historical price data, skipping days already archived
    History(HistoryArgs),
    /// Database management commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Args)]
struct CrawlArgs {
    /// Output directory path where data will be stored (required unless -l/--list)
    output_root: Option<PathBuf>,

    /// Date for which to crawl (YYYY-MM-DD, defaults to today)
    #[arg(short = 'd', long)]
    date: Option<NaiveDate>,

    /// Comma-separated list of retail chains to crawl (defaults to all)
    #[arg(short = 'c', long)]
    chains: Option<String>,

    /// Reconcile the crawled data into the database
    #[arg(short = 's', long = "sql")]
    sql: bool,

    /// Drop existing database tables and exit (or drop before crawling if combined)
    #[arg(long)]
    dropdb: bool,

    /// Directory with date/chain CSV subfolders; load data from CSV instead
    /// of crawling the web
    #[arg(long, value_name = "DIR")]
    from_csv_dir: Option<PathBuf>,

    /// List supported retail chains and exit (output_root is not required)
    #[arg(short = 'l', long)]
    list: bool,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    /// Directory where data will be stored
    output_root: Option<PathBuf>,

    /// Start date (YYYY-MM-DD), defaults to the law effective date
    #[arg(short = 's', long)]
    start_date: Option<NaiveDate>,

    /// End date (YYYY-MM-DD), defaults to today
    #[arg(short = 'e', long)]
    end_date: Option<NaiveDate>,

    /// Comma-separated list of retail chains to fetch (defaults to all)
    #[arg(short = 'c', long)]
    chains: Option<String>,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Test the database connection
    Ping,
    /// Run pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        let level = std::env::var("CJENIK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level)
    })?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Crawl(args) => run_crawl(args).await,
        Commands::History(args) => run_history(args).await,
        Commands::Db { command } => match command {
            DbCommands::Ping => run_db_ping().await,
            DbCommands::Migrate => run_db_migrate().await,
        },
    }
}

async fn run_crawl(args: CrawlArgs) -> anyhow::Result<()> {
    if args.from_csv_dir.is_some() {
        if args.list {
            bail!("--from-csv-dir cannot be used with --list");
        }
        if args.dropdb {
            bail!("--from-csv-dir cannot be used with --dropdb");
        }
        if args.output_root.is_none() {
            bail!("output_root is required when using --from-csv-dir");
        }
    }

    let config = load_config()?;

    if args.dropdb {
        let pool = cjenik_db::connect_pool_from_config(&config)
            .await
            .context("failed to connect to database")?;
        cjenik_db::drop_schema(&pool)
            .await
            .context("failed to drop database tables")?;
        tracing::info!("dropped all tables in database");
        if args.output_root.is_none() && !args.list && !args.sql {
            return Ok(());
        }
    }

    let sources = cjenik_sources::registry(&config).context("failed to build chain registry")?;
    let available: Vec<&'static str> = sources.iter().map(|source| source.slug()).collect();

    if args.list {
        println!("Supported retail chains:");
        for slug in &available {
            println!("  - {slug}");
        }
        return Ok(());
    }

    let Some(output_root) = args.output_root else {
        bail!("output_root is required; use --help for more info");
    };
    if output_root.is_file() {
        bail!("output path '{}' is a file", output_root.display());
    }
    std::fs::create_dir_all(&output_root)
        .with_context(|| format!("failed to create {}", output_root.display()))?;

    let chains = parse_chain_list(args.chains.as_deref(), &available)?;
    let date = args.date.unwrap_or_else(|| chrono::Local::now().date_naive());

    let chains_txt = chains
        .as_ref()
        .map_or_else(|| "all retail chains".to_string(), |list| list.join(", "));
    tracing::info!(chains = %chains_txt, %date, "fetching price data");

    let zip_path = if let Some(csv_dir) = args.from_csv_dir {
        pipeline::run_from_csv(
            &config,
            &output_root,
            date,
            chains.as_deref(),
            &csv_dir,
            args.sql,
        )
        .await?
    } else {
        pipeline::run(&config, &output_root, date, chains.as_deref(), args.sql).await?
    };
    println!("{}", zip_path.display());
    Ok(())
}

async fn run_history(args: HistoryArgs) -> anyhow::Result<()> {
    let Some(output_root) = args.output_root else {
        bail!("output_root is required; use --help for more info");
    };
    if output_root.is_file() {
        bail!("output path '{}' is a file", output_root.display());
    }
    std::fs::create_dir_all(&output_root)
        .with_context(|| format!("failed to create {}", output_root.display()))?;

    let config = load_config()?;
    let sources = cjenik_sources::registry(&config).context("failed to build chain registry")?;
    let available: Vec<&'static str> = sources.iter().map(|source| source.slug()).collect();
    let chains = parse_chain_list(args.chains.as_deref(), &available)?;

    let start = args.start_date.unwrap_or(DEFAULT_HISTORY_START);
    let end = args
        .end_date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    if start > end {
        bail!("start-date must be on or before end-date");
    }

    history::run_range(&config, &output_root, start, end, chains.as_deref()).await
}

async fn run_db_ping() -> anyhow::Result<()> {
    let config = load_config()?;
    let pool = cjenik_db::connect_pool_from_config(&config)
        .await
        .context("failed to connect to database")?;
    cjenik_db::ping(&pool).await.context("database ping failed")?;
    println!("database is healthy");
    Ok(())
}

async fn run_db_migrate() -> anyhow::Result<()> {
    let config = load_config()?;
    let pool = cjenik_db::connect_pool_from_config(&config)
        .await
        .context("failed to connect to database")?;
    let applied = cjenik_db::run_migrations(&pool).await?;
    if applied == 0 {
        println!("0 pending migrations — database is up to date");
    } else {
        println!("applied {applied} migration(s) successfully");
    }
    Ok(())
}

fn load_config() -> anyhow::Result<cjenik_core::AppConfig> {
    cjenik_core::load_app_config_from_env().context("invalid configuration")
}

/// Split and validate a `-c chain,chain,…` list against the registry.
fn parse_chain_list(
    spec: Option<&str>,
    available: &[&'static str],
) -> anyhow::Result<Option<Vec<String>>> {
    let Some(spec) = spec else {
        return Ok(None);
    };
    let chains: Vec<String> = spec
        .split(',')
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .collect();
    for slug in &chains {
        if !available.iter().any(|known| *known == slug.as_str()) {
            bail!(
                "unknown chain '{slug}'; available chains: {}",
                available.join(", ")
            );
        }
    }
    Ok(Some(chains))
}
