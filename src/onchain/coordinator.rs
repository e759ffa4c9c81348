//! Per-currency coordinator on top of the multi-source aggregator.
//!
//! # Responsibilities
//! - Enforce the fee floor and the secondary fee fallback
//! - Retry transaction and confirmation lookups with a fixed delay
//! - Compute transaction fees (input prevouts on BTC, fee output on Liquid)
//! - Locate lockup outputs and check their amount and confirmation
//! - Track the tip height through a supervised block listener
//!
//! # Design Decisions
//! - Retry loops and the block listener share the coordinator's shutdown
//!   token; triggering it ends both promptly
//! - Broadcasts are never retried

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::chain::aggregator::MultiSourceAggregator;
use crate::chain::source::NamedSource;
use crate::chain::types::{BlockEpoch, ChainError, Currency, Network, Output};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::onchain::transaction::ChainTransaction;
use crate::onchain::types::{OnchainError, OnchainResult, OutputArgs, OutputResult};
use crate::resilience::backoff::poll_backoff;
use crate::resilience::{retry_fixed, with_timeout, RetryPolicy};

/// Upper bound of the extra pause a failing block listener takes.
const MAX_LISTENER_BACKOFF: Duration = Duration::from_secs(60);

/// Minimum fee rate in sat/vbyte.
pub fn default_fee_floor(currency: Currency) -> f64 {
    match currency {
        Currency::Btc => 2.0,
        Currency::Liquid => 0.1,
    }
}

/// How often the block listener polls: a tenth of the block time, every
/// second on regtest.
pub fn default_block_poll_interval(currency: Currency, network: Network) -> Duration {
    if network == Network::Regtest {
        return Duration::from_secs(1);
    }
    Duration::from_secs_f64(currency.block_time_minutes() * 60.0 / 10.0)
}

pub struct CurrencyCoordinator {
    currency: Currency,
    network: Network,
    aggregator: MultiSourceAggregator,
    fee_fallback: Option<NamedSource>,
    fee_floor: f64,
    retry: RetryPolicy,
    call_timeout: Duration,
    height: AtomicU32,
    epochs: broadcast::Sender<BlockEpoch>,
    shutdown: Shutdown,
}

impl CurrencyCoordinator {
    pub fn new(network: Network, aggregator: MultiSourceAggregator, shutdown: Shutdown) -> Self {
        let currency = aggregator.currency();
        let (epochs, _) = broadcast::channel(16);
        Self {
            currency,
            network,
            aggregator,
            fee_fallback: None,
            fee_floor: default_fee_floor(currency),
            retry: RetryPolicy::default(),
            call_timeout: crate::chain::aggregator::DEFAULT_CALL_TIMEOUT,
            height: AtomicU32::new(0),
            epochs,
            shutdown,
        }
    }

    pub fn with_fee_floor(mut self, fee_floor: f64) -> Self {
        self.fee_floor = fee_floor;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Secondary source asked only for fee estimates, after the aggregator.
    pub fn with_fee_fallback(mut self, source: NamedSource) -> Self {
        self.fee_fallback = Some(source);
        self
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn aggregator(&self) -> &MultiSourceAggregator {
        &self.aggregator
    }

    pub fn fee_floor(&self) -> f64 {
        self.fee_floor
    }

    /// Fee rate in sat/vbyte, never below the floor.
    pub async fn estimate_fee(&self) -> OnchainResult<f64> {
        let fee = match self.aggregator.estimate_fee().await {
            Ok(fee) => fee,
            Err(e) => {
                let Some(fallback) = &self.fee_fallback else {
                    return Err(e.into());
                };
                tracing::debug!(currency = %self.currency, source = %fallback.name, "Using fee fallback");
                with_timeout(self.call_timeout, fallback.source.estimate_fee()).await?
            }
        };
        Ok(fee.max(self.fee_floor))
    }

    /// Latest height seen by the block listener, fetched when none was seen yet.
    pub async fn block_height(&self) -> OnchainResult<u32> {
        let cached = self.height.load(Ordering::SeqCst);
        if cached != 0 {
            return Ok(cached);
        }
        let height = self.aggregator.block_height().await?;
        self.update_height(height);
        Ok(height)
    }

    pub fn subscribe_blocks(&self) -> broadcast::Receiver<BlockEpoch> {
        self.epochs.subscribe()
    }

    fn update_height(&self, height: u32) {
        let previous = self.height.swap(height, Ordering::SeqCst);
        if previous != height {
            metrics::record_block_height(self.currency, height);
            let _ = self.epochs.send(BlockEpoch {
                currency: self.currency,
                height,
            });
        }
    }

    /// Poll the tip until the shutdown token fires.
    pub fn spawn_block_listener(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.run_block_listener(interval).await })
    }

    async fn run_block_listener(&self, interval: Duration) {
        tracing::info!(currency = %self.currency, interval_ms = interval.as_millis() as u64, "Block listener started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut failures = 0u32;
        loop {
            let pause = poll_backoff(failures, interval, MAX_LISTENER_BACKOFF);
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(currency = %self.currency, "Block listener stopped");
                    return;
                }
                _ = async {
                    tokio::time::sleep(pause).await;
                    ticker.tick().await
                } => {
                    match self.aggregator.block_height().await {
                        Ok(height) => {
                            failures = 0;
                            self.update_height(height);
                        }
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            tracing::warn!(currency = %self.currency, failures, error = %e, "Could not fetch block height");
                        }
                    }
                }
            }
        }
    }

    fn policy(&self, retry: bool) -> RetryPolicy {
        if retry {
            self.retry
        } else {
            RetryPolicy::NONE
        }
    }

    pub async fn get_transaction(
        &self,
        tx_id: &str,
        blinding_key: Option<&[u8]>,
        retry: bool,
    ) -> OnchainResult<ChainTransaction> {
        if tx_id.is_empty() {
            return Err(OnchainError::EmptyTransactionId);
        }
        let hex = retry_fixed(
            self.policy(retry),
            &self.shutdown,
            "raw_transaction",
            ChainError::is_unsupported,
            || self.aggregator.raw_transaction(tx_id),
        )
        .await?;
        ChainTransaction::from_hex(self.currency, &hex, blinding_key)
    }

    pub async fn is_confirmed(&self, tx_id: &str, retry: bool) -> OnchainResult<bool> {
        if tx_id.is_empty() {
            return Err(OnchainError::EmptyTransactionId);
        }
        Ok(retry_fixed(
            self.policy(retry),
            &self.shutdown,
            "is_confirmed",
            ChainError::is_unsupported,
            || self.aggregator.is_confirmed(tx_id),
        )
        .await?)
    }

    /// Fee paid by `tx` in satoshis.
    pub async fn transaction_fee(&self, tx: &ChainTransaction) -> OnchainResult<u64> {
        let ChainTransaction::Btc(btc) = tx else {
            return tx.liquid_fee();
        };

        let mut parents: HashMap<bitcoin::Txid, bitcoin::Transaction> = HashMap::new();
        let mut input_sum: u64 = 0;
        for input in &btc.input {
            let prev = input.previous_output;
            if !parents.contains_key(&prev.txid) {
                let parent = self
                    .get_transaction(&prev.txid.to_string(), None, false)
                    .await
                    .map_err(|e| OnchainError::InputFetch(e.to_string()))?;
                let ChainTransaction::Btc(parent) = parent else {
                    return Err(OnchainError::InputFetch(format!("{} is not a BTC transaction", prev.txid)));
                };
                parents.insert(prev.txid, parent);
            }
            let value = parents
                .get(&prev.txid)
                .and_then(|parent| parent.output.get(prev.vout as usize))
                .map(|out| out.value.to_sat())
                .ok_or_else(|| OnchainError::InputFetch(format!("{} has no output {}", prev.txid, prev.vout)))?;
            input_sum += value;
        }

        let output_sum: u64 = btc.output.iter().map(|out| out.value.to_sat()).sum();
        Ok(input_sum.saturating_sub(output_sum))
    }

    /// Find the output of `args.transaction_id` paying `args.address`.
    pub async fn locate_output(&self, args: &OutputArgs) -> OnchainResult<OutputResult> {
        let transaction = self
            .get_transaction(&args.transaction_id, args.blinding_key.as_deref(), true)
            .await?;

        let (vout, value) = transaction
            .find_output(self.network, &args.address)?
            .ok_or_else(|| OnchainError::OutputNotFound(args.address.clone()))?;

        if args.expected_amount != 0 && value < args.expected_amount {
            return Err(OnchainError::AmountTooLow {
                value,
                expected: args.expected_amount,
            });
        }

        if args.require_confirmed {
            match self.is_confirmed(&args.transaction_id, false).await {
                Ok(true) => {}
                Ok(false) => return Err(OnchainError::NotConfirmed),
                Err(e) if e.is_unsupported() => {
                    tracing::debug!(currency = %self.currency, "Confirmation check unsupported, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(OutputResult {
            transaction,
            vout,
            value,
        })
    }

    pub async fn broadcast_transaction(&self, tx: &ChainTransaction) -> OnchainResult<String> {
        Ok(self.aggregator.broadcast(&tx.to_hex()).await?)
    }

    pub async fn unspent_outputs(&self, address: &str) -> OnchainResult<Vec<Output>> {
        Ok(self.aggregator.unspent_outputs(address).await?)
    }

    /// Stop retry loops and the block listener.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub async fn disconnect(&self) {
        self.aggregator.disconnect().await;
    }
}
