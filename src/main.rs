use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use coinpanel::aggregator::{Aggregator, DefaultAdapterFactory};
use coinpanel::cache::{FxRateCache, JsonFileStore, SnapshotCache};
use coinpanel::clock::{Clock, SystemClock};
use coinpanel::config::AppConfig;
use coinpanel::prices::{CryptoCompareOracle, DefiLlamaOracle, FrankfurterOracle, PriceResolver};

#[derive(Parser)]
#[command(name = "coinpanel", version, about = "Aggregate crypto holdings across exchanges and chains")]
struct Cli {
    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and display all holdings.
    Assets {
        /// Bypass the snapshot cache and refetch everything.
        #[arg(long)]
        refresh: bool,
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Drop the cached snapshot.
    ClearCache,
    /// Show the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coinpanel=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load_or_default(&config_path)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = SnapshotCache::new(
        Arc::new(JsonFileStore::new(AppConfig::default_snapshot_path())),
        config.cache.snapshot_ttl,
        clock.clone(),
    );

    match cli.command {
        Command::Assets { refresh, json } => {
            let resolver = Arc::new(PriceResolver::new(
                Arc::new(DefiLlamaOracle::new()),
                Arc::new(CryptoCompareOracle::new()),
            ));
            let factory = Arc::new(DefaultAdapterFactory::new(clock.clone())?);
            let aggregator = Aggregator::new(factory, resolver, cache, clock.clone());

            let outcome = aggregator.aggregate(&config, refresh).await?;
            for warning in &outcome.warnings {
                eprintln!("warning: {}: {}", warning.source, warning.message);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.holdings)?);
                return Ok(());
            }

            if outcome.holdings.is_empty() {
                println!("No holdings. Add exchanges or wallets to {}", config_path.display());
                return Ok(());
            }
            println!(
                "{:<28} {:>18} {:>14} {:>14}  {}",
                "ASSET", "AMOUNT", "PRICE", "VALUE", "SOURCE"
            );
            for h in &outcome.holdings {
                println!(
                    "{:<28} {:>18.8} {:>14.4} {:>14.2}  {}",
                    h.symbol, h.amount, h.price, h.value_usd, h.source
                );
            }

            let total_usd: f64 = outcome.holdings.iter().map(|h| h.value_usd).sum();
            let currency = config.display_currency.to_uppercase();
            if currency == "USD" || currency.is_empty() {
                println!("\nTotal: {total_usd:.2} USD");
            } else {
                let fx = FxRateCache::new(
                    Arc::new(FrankfurterOracle::new()),
                    config.cache.fx_ttl,
                    clock,
                );
                match fx.rate(&currency).await {
                    Ok(rate) => {
                        println!("\nTotal: {total_usd:.2} USD ({:.2} {currency})", total_usd * rate)
                    }
                    Err(err) => {
                        eprintln!("warning: fx rate unavailable: {err}");
                        println!("\nTotal: {total_usd:.2} USD");
                    }
                }
            }
            if outcome.from_cache {
                println!("(cached at {})", outcome.timestamp.to_rfc3339());
            }
        }
        Command::ClearCache => {
            cache.clear().await?;
            println!("Snapshot cache cleared.");
        }
        Command::Config => {
            println!("config file: {}", config_path.display());
            println!("snapshot:    {}", AppConfig::default_snapshot_path().display());
            println!("exchanges:   {}", config.exchanges.len());
            println!("wallets:     {}", config.wallets.len());
            println!(
                "filter:      hide_small_assets={} threshold={}",
                config.filter.hide_small_assets, config.filter.small_assets_threshold
            );
            println!("display:     {}", config.display_currency);
        }
    }
    Ok(())
}
