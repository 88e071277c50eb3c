mod config;
mod errors;
mod execution;
mod models;
mod server;

use clap::Parser;
use config::Config;
use errors::Result;
use execution::{
    NonceSource, OrderSigner, PositionSizer, SignAction, SignalProcessor, VenueClient,
};
use server::AppState;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "Hyperliquid Signal Bot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Webhook-driven trading bot for Hyperliquid perpetuals", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = Args::parse();

    // Configuration failures are fatal: the process must never serve trading
    // routes with a partial or defaulted setup
    let mut config = Config::load_from_file(&args.config)?;
    config.expand_env_vars()?;

    init_logging(&config.logging.level)?;

    info!(
        "Starting Hyperliquid Signal Bot v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        symbol = %config.trading.symbol,
        testnet = config.general.testnet,
        "Configured"
    );

    let signer = OrderSigner::new(&config.general.private_key, !config.general.testnet)?;
    info!("Wallet address: {:?}", signer.address());

    let venue = Arc::new(VenueClient::new(config.general.api_url())?);

    // Resolve the instrument once at startup; an unknown symbol is a config
    // error, not something to discover on the first signal
    let asset_index = venue.resolve_asset_index(&config.trading.symbol).await?;
    info!(
        symbol = %config.trading.symbol,
        asset_index,
        "Resolved instrument"
    );

    let wallet_address = signer.address();
    let processor = SignalProcessor::new(
        Arc::clone(&venue),
        PositionSizer::new(config.trading.clone()),
        Arc::new(signer),
        NonceSource::wall_clock(),
        config.trading.clone(),
        asset_index,
    );

    let state = Arc::new(AppState {
        processor,
        venue,
        wallet_address,
        symbol: config.trading.symbol.clone(),
        testnet: config.general.testnet,
        webhook_secret: config.webhook.secret.clone(),
    });

    server::serve(state, config.general.port).await
}

/// Initialize logging based on configuration
fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| errors::SignalBotError::ConfigError(format!("Failed to set logger: {}", e)))?;

    Ok(())
}
