//! trailguard: keeps a wallet in SOL while the price holds up and parks it
//! in USDC once the price falls through a trailing stop.
//!
//! Subcommands:
//! - `run`: monitor the price and swap automatically until Ctrl+C
//! - `status`: show wallet balances and the position they imply
//! - `price`: show the current price against the configured stop

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use trailguard::api::{
    BalanceReader, JupiterClient, JupiterPriceFeed, JupiterSwapExecutor, PriceSource, SolanaClient,
};
use trailguard::config::AppConfig;
use trailguard::execution::{self, Providers};
use trailguard::strategy::{initial_position, ThresholdTracker};
use trailguard::telemetry;

#[derive(Parser, Debug)]
#[command(name = "trailguard")]
#[command(
    about = "Trailing stop-loss agent that flips a Solana wallet between SOL and USDC",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to config/default.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor the price and swap on threshold crossings
    Run,
    /// Print wallet balances and the derived position
    Status,
    /// Print the current price and configured stop
    Price,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.verbose {
        config.logging.filter = config
            .logging
            .filter
            .replace("trailguard=info", "trailguard=debug");
    }
    let _guards = telemetry::init(&config.logging)?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Status => status(config).await,
        Commands::Price => price(config).await,
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("🚀 trailguard starting");

    let jupiter = JupiterClient::new(&config.providers).context("creating Jupiter client")?;
    let wallet = wallet(&config)?;
    tracing::info!("Wallet: {}", wallet.pubkey());

    let providers = Providers {
        price: Arc::new(JupiterPriceFeed::new(jupiter.clone(), config.pair.a.clone())),
        balances: Arc::new(wallet.clone()),
        executor: Arc::new(JupiterSwapExecutor::new(jupiter, wallet)),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("⚠️  Received Ctrl+C, shutting down..."),
                Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
            }
            cancel.cancel();
        });
    }

    execution::start(config.strategy, config.pair, providers, cancel)
        .await
        .context("monitor failed to start")?;

    tracing::info!("👋 trailguard stopped");
    Ok(())
}

async fn status(config: AppConfig) -> anyhow::Result<()> {
    let wallet = wallet(&config)?;
    let balance_a = wallet
        .get_balance(&config.pair.a)
        .await
        .with_context(|| format!("reading {} balance", config.pair.a.symbol))?;
    let balance_b = wallet
        .get_balance(&config.pair.b)
        .await
        .with_context(|| format!("reading {} balance", config.pair.b.symbol))?;

    let position = initial_position(balance_b, config.strategy.materiality_threshold);
    let (price, threshold) = current_stop(&config).await?;

    println!("Wallet:    {}", wallet.pubkey());
    println!("{:<10} {:.6}", format!("{}:", config.pair.a.symbol), balance_a);
    println!("{:<10} {:.6}", format!("{}:", config.pair.b.symbol), balance_b);
    println!("Price:     ${:.4}", price);
    println!("Stop:      ${:.2}", threshold);
    println!("Position:  {}", position);
    Ok(())
}

async fn price(config: AppConfig) -> anyhow::Result<()> {
    let (price, threshold) = current_stop(&config).await?;

    println!("{} price: ${:.4}", config.pair.a.symbol, price);
    println!("Stop:      ${:.2}", threshold);
    if price < threshold {
        println!(
            "Price is below the stop: a {} holder would be swapped into {}",
            config.pair.a.symbol, config.pair.b.symbol
        );
    }
    Ok(())
}

/// Current price and the stop a freshly started monitor would compare it to
async fn current_stop(config: &AppConfig) -> anyhow::Result<(f64, f64)> {
    let jupiter = JupiterClient::new(&config.providers).context("creating Jupiter client")?;
    let feed = JupiterPriceFeed::new(jupiter, config.pair.a.clone());
    let price = feed
        .get_price()
        .await
        .with_context(|| format!("fetching {} price", config.pair.a.symbol))?;

    let mut tracker = ThresholdTracker::from_config(&config.strategy);
    Ok((price, tracker.update(price)))
}

fn wallet(config: &AppConfig) -> anyhow::Result<SolanaClient> {
    let private_key = AppConfig::private_key()?;
    SolanaClient::new(&config.providers, &private_key).context("loading wallet from PRIVATE_KEY")
}
