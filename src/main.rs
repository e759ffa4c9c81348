//! Swap client daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ─▶ ClientConfig ─┬─▶ logging / metrics
//!                                ├─▶ HttpCounterparty ───────────────┐
//!                                └─▶ Onchain ─┬─▶ BTC coordinator ◀──┤ fallback
//!                                             └─▶ L-BTC coordinator ◀┘
//!                                                    │ block epochs
//!                                                    ▼
//!                                         JsonSwapStore (refund / claim scan)
//! ```
//!
//! The daemon keeps the chain layer warm and reports swaps that became
//! refundable or claimable on every new block. Driving them is up to the
//! lifecycle manager embedding this crate.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use swap_client::chain::types::Currency;
use swap_client::config::{load_config, ClientConfig};
use swap_client::counterparty::{CounterpartyApi, HttpCounterparty};
use swap_client::lifecycle::{signals, Shutdown};
use swap_client::observability::{logging, metrics};
use swap_client::onchain::build_onchain;
use swap_client::swap::{JsonSwapStore, KeyIssuer, SwapStore};

#[derive(Parser)]
#[command(name = "swap-client")]
#[command(about = "Atomic swap client daemon", long_about = None)]
struct Args {
    /// Path to the TOML configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "swap-client starting");

    tracing::info!(
        network = %config.network,
        data_dir = %config.data_dir.display(),
        counterparty = %config.counterparty_url(),
        retry_attempts = config.onchain.retry_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    std::fs::create_dir_all(&config.data_dir)?;
    let store: Arc<dyn SwapStore> = Arc::new(JsonSwapStore::open(config.data_dir.join("swaps.json"))?);
    KeyIssuer::new(store.clone()).ensure_mnemonic().await?;

    let counterparty: Arc<dyn CounterpartyApi> = Arc::new(HttpCounterparty::new(
        &config.counterparty_url(),
        config.counterparty.timeout(),
    )?);

    let shutdown = Shutdown::new();
    let onchain = build_onchain(&config, Some(counterparty), shutdown.clone())?;
    onchain.start_block_listeners(config.onchain.block_poll()).await;

    for currency in [Currency::Btc, Currency::Liquid] {
        let epochs = onchain.subscribe_blocks(currency)?;
        tokio::spawn(report_due_swaps(store.clone(), epochs, shutdown.clone()));
    }

    signals::wait_for_signal(&shutdown).await;
    tracing::info!("Shutting down");
    onchain.disconnect().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Log swaps that can be refunded or claimed at each new block.
async fn report_due_swaps(
    store: Arc<dyn SwapStore>,
    mut epochs: tokio::sync::broadcast::Receiver<swap_client::chain::types::BlockEpoch>,
    shutdown: Shutdown,
) {
    loop {
        let epoch = tokio::select! {
            _ = shutdown.cancelled() => return,
            epoch = epochs.recv() => epoch,
        };
        let epoch = match epoch {
            Ok(epoch) => epoch,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Block reporter lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        let refundable = store
            .query_refundable_swaps(epoch.currency, epoch.height)
            .map(|s| s.len())
            .unwrap_or_default()
            + store
                .query_refundable_chain_swaps(epoch.currency, epoch.height)
                .map(|s| s.len())
                .unwrap_or_default();
        let claimable = store
            .query_claimable_reverse_swaps(epoch.currency)
            .map(|s| s.len())
            .unwrap_or_default()
            + store
                .query_claimable_chain_swaps(epoch.currency)
                .map(|s| s.len())
                .unwrap_or_default();

        if refundable > 0 || claimable > 0 {
            tracing::info!(
                currency = %epoch.currency,
                height = epoch.height,
                refundable,
                claimable,
                "Swaps due"
            );
        }
    }
}
