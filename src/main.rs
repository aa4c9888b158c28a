//! EVM transaction bot
//!
//! Loads the configuration and account credentials, wires the chain client,
//! quota ledger, metrics and status display together and runs the
//! multi-account scheduler until it fails or Ctrl-C is received.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evm_tx_bot::account_loop::LoopContext;
use evm_tx_bot::config::Config;
use evm_tx_bot::errors::{BotError, BotResult};
use evm_tx_bot::ledger::SledLedger;
use evm_tx_bot::metrics::Metrics;
use evm_tx_bot::rpc::AlloyChainClient;
use evm_tx_bot::scheduler::Scheduler;
use evm_tx_bot::status::{run_display, StatusReporter};
use evm_tx_bot::wallet::{Credential, LocalWallet, TxSigner};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "EVM_TX_BOT_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;

    info!("Starting EVM transaction bot v{}", env!("CARGO_PKG_VERSION"));

    info!("Loading configuration from: {}", args.config);
    let config = Arc::new(load_config(&args.config)?);

    let signers = load_signers(&config)?;
    let usable = signers.iter().filter(|signer| signer.is_ok()).count();
    info!("Loaded {} of {} account(s)", usable, signers.len());

    let client = Arc::new(AlloyChainClient::new(&config.rpc).context("Failed to create RPC client")?);
    info!("RPC endpoint: {} (chain id {})", config.rpc.url, config.rpc.chain_id);

    let ledger = Arc::new(
        SledLedger::open(&config.ledger.path)
            .with_context(|| format!("Failed to open ledger at {}", config.ledger.path.display()))?,
    );
    let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);

    let (reporter, status_rx) = StatusReporter::channel();
    let display = tokio::spawn(run_display(status_rx, config.rpc.symbol.clone()));

    let scheduler = Scheduler::new(LoopContext {
        client,
        ledger,
        metrics: metrics.clone(),
        reporter,
        config,
    });

    let outcome = tokio::select! {
        result = scheduler.run(signers) => result.context("Scheduler stopped"),
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    display.abort();
    info!("Final metrics:\n{}", metrics.render());

    if let Err(err) = &outcome {
        error!("{:#}", err);
    }
    info!("Shutting down");
    outcome
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_filter = if verbose {
        "evm_tx_bot=debug,status=info,info"
    } else {
        "evm_tx_bot=info,status=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .context("Failed to initialize logging")?;
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path).with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        Ok(Config::default())
    }
}

/// Classify every credential and derive its signer.
///
/// A credential that cannot be used is reported per account; only a missing
/// credential source is fatal.
fn load_signers(config: &Config) -> Result<Vec<BotResult<Arc<dyn TxSigner>>>> {
    let credentials = config.load_credentials().context("Failed to load account credentials")?;
    Ok(credentials
        .iter()
        .enumerate()
        .map(|(index, raw)| -> BotResult<Arc<dyn TxSigner>> {
            let wallet = Credential::parse(raw, index)
                .and_then(|credential| {
                    let wallet = LocalWallet::from_credential(&credential)?;
                    info!("Account {}: {} loaded from {}", index + 1, wallet.address(), credential.kind());
                    Ok(wallet)
                })
                .map_err(|err| {
                    warn!("Account {}: {}", index + 1, err);
                    BotError::Configuration(format!("account {}: {}", index + 1, err))
                })?;
            Ok(Arc::new(wallet) as Arc<dyn TxSigner>)
        })
        .collect())
}
