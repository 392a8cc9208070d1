//! Stock monitor CLI
//!
//! Local execution entry point. For AWS Lambda, use `stock-monitor-lambda`.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stock_monitor::{
    error::{AppError, Result},
    models::{Config, Variant},
    pipeline,
    services::{HtmlObserver, ProductObserver},
    storage::{self, RecordStore},
    utils::{http, url::display_name},
};

/// Watches storefront product pages for price and stock changes
#[derive(Parser, Debug)]
#[command(name = "stock-monitor", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "monitor.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile every product in the sitemap once (default)
    Run,

    /// Scrape one product page and print what was read, without storing it
    Observe {
        /// Product page URL
        url: String,
    },

    /// Print the change log of a product
    History {
        /// Product page URL
        url: String,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// File config (if present) overlaid with the environment.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_if_present(path)?;
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let summary = pipeline::run_monitor(&config).await?;
            if summary.failed > 0 {
                log::warn!("{} product(s) could not be reconciled", summary.failed);
            }
        }

        Command::Observe { url } => {
            let client = http::create_async_client(&config.http)?;
            let observer = HtmlObserver::new(client, config.observer.clone())?;
            let observation = observer.observe(&url).await?;

            println!("{}", display_name(&url));
            for variant in Variant::ALL {
                let state = observation.variant(variant);
                println!(
                    "  {:<10} price={} stock={}",
                    variant.as_str(),
                    state.price,
                    state.stock
                );
            }
        }

        Command::History { url } => {
            let client = http::create_async_client(&config.http)?;
            let store = storage::open(&config.storage, &client)?;

            let Some(record) = store.find_by_url(&url).await? else {
                return Err(AppError::validation(format!("no record for {url}")));
            };

            println!(
                "{} (id {}, first seen {})",
                display_name(&record.url),
                record.id,
                record.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            let history = store.history(&record.id).await?;
            if history.is_empty() {
                println!("  no changes recorded");
            }
            for entry in history {
                println!(
                    "  {}  {:<16} {} -> {}",
                    entry.changed_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.changed_field.as_str(),
                    entry.old_value,
                    entry.new_value
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if let Err(e) = config.require_feed_url() {
                log::warn!("{}", e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
