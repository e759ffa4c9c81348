//! `Onchain` facade: routes by currency and owns the wallet registry.
//!
//! # Responsibilities
//! - Hold one coordinator per configured currency
//! - Keep the wallet list (copy-on-write, safe to iterate while it changes)
//! - Start the block listeners and tear everything down on shutdown

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::chain::types::{BlockEpoch, Currency, Network};
use crate::lifecycle::Shutdown;
use crate::onchain::coordinator::{default_block_poll_interval, CurrencyCoordinator};
use crate::onchain::transaction::ChainTransaction;
use crate::onchain::types::{OnchainError, OnchainResult, OutputArgs, OutputResult};
use crate::onchain::wallet::{Id, Wallet, WalletChecker, WalletError};

pub const DEFAULT_WALLET_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Onchain {
    network: Network,
    btc: Option<Arc<CurrencyCoordinator>>,
    liquid: Option<Arc<CurrencyCoordinator>>,
    wallets: ArcSwap<Vec<Arc<dyn Wallet>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Shutdown,
    wallet_disconnect_timeout: Duration,
}

impl Onchain {
    /// `shutdown` must be the token the coordinators were built with.
    pub fn new(
        network: Network,
        btc: Option<Arc<CurrencyCoordinator>>,
        liquid: Option<Arc<CurrencyCoordinator>>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            network,
            btc,
            liquid,
            wallets: ArcSwap::from_pointee(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            shutdown,
            wallet_disconnect_timeout: DEFAULT_WALLET_DISCONNECT_TIMEOUT,
        }
    }

    pub fn with_wallet_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.wallet_disconnect_timeout = timeout;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn coordinator(&self, currency: Currency) -> OnchainResult<&Arc<CurrencyCoordinator>> {
        let coordinator = match currency {
            Currency::Btc => self.btc.as_ref(),
            Currency::Liquid => self.liquid.as_ref(),
        };
        coordinator.ok_or(OnchainError::CurrencyNotConfigured(currency))
    }

    fn coordinators(&self) -> impl Iterator<Item = &Arc<CurrencyCoordinator>> {
        self.btc.iter().chain(self.liquid.iter())
    }

    /// Spawn one block listener per coordinator. `poll` overrides the
    /// per-currency default interval.
    pub async fn start_block_listeners(&self, poll: Option<Duration>) {
        let mut listeners = self.listeners.lock().await;
        for coordinator in self.coordinators() {
            let interval =
                poll.unwrap_or_else(|| default_block_poll_interval(coordinator.currency(), self.network));
            listeners.push(coordinator.spawn_block_listener(interval));
        }
    }

    pub fn subscribe_blocks(&self, currency: Currency) -> OnchainResult<broadcast::Receiver<BlockEpoch>> {
        Ok(self.coordinator(currency)?.subscribe_blocks())
    }

    pub async fn estimate_fee(&self, currency: Currency) -> OnchainResult<f64> {
        self.coordinator(currency)?.estimate_fee().await
    }

    pub async fn get_block_height(&self, currency: Currency) -> OnchainResult<u32> {
        self.coordinator(currency)?.block_height().await
    }

    pub async fn get_transaction(
        &self,
        currency: Currency,
        tx_id: &str,
        blinding_key: Option<&[u8]>,
        retry: bool,
    ) -> OnchainResult<ChainTransaction> {
        self.coordinator(currency)?
            .get_transaction(tx_id, blinding_key, retry)
            .await
    }

    pub async fn get_transaction_fee(&self, tx: &ChainTransaction) -> OnchainResult<u64> {
        self.coordinator(tx.currency())?.transaction_fee(tx).await
    }

    pub async fn is_transaction_confirmed(&self, currency: Currency, tx_id: &str, retry: bool) -> OnchainResult<bool> {
        self.coordinator(currency)?.is_confirmed(tx_id, retry).await
    }

    pub async fn locate_output(&self, args: &OutputArgs) -> OnchainResult<OutputResult> {
        self.coordinator(args.currency)?.locate_output(args).await
    }

    pub async fn broadcast_transaction(&self, tx: &ChainTransaction) -> OnchainResult<String> {
        self.coordinator(tx.currency())?.broadcast_transaction(tx).await
    }

    pub fn add_wallet(&self, wallet: Arc<dyn Wallet>) {
        let info = wallet.info();
        tracing::info!(wallet = %info.name, id = info.id, currency = %info.currency, "Adding wallet");
        self.wallets.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().filter(|w| w.info().id != info.id).cloned());
            next.push(wallet.clone());
            next
        });
    }

    pub fn remove_wallet(&self, id: Id) {
        self.wallets.rcu(|current| {
            current
                .iter()
                .filter(|w| w.info().id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    pub fn get_wallets(&self, checker: &WalletChecker) -> Vec<Arc<dyn Wallet>> {
        self.wallets
            .load()
            .iter()
            .filter(|w| checker.allows(&w.info()))
            .cloned()
            .collect()
    }

    /// First ready wallet that `checker` allows.
    pub fn get_any_wallet(&self, checker: &WalletChecker) -> OnchainResult<Arc<dyn Wallet>> {
        self.get_wallets(checker)
            .into_iter()
            .find(|w| w.ready())
            .ok_or_else(|| WalletError::NotFound(checker.to_string()).into())
    }

    /// Stop listeners, then disconnect sources and wallets. Wallets get a
    /// bounded amount of time.
    pub async fn disconnect(&self) {
        self.shutdown.trigger();

        let listeners: Vec<_> = self.listeners.lock().await.drain(..).collect();
        for result in join_all(listeners).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Block listener ended abnormally");
            }
        }

        join_all(self.coordinators().map(|c| c.disconnect())).await;

        let wallets = self.wallets.load_full();
        let disconnects = join_all(wallets.iter().map(|wallet| async move {
            if let Err(e) = wallet.disconnect().await {
                tracing::warn!(wallet = %wallet.info().name, error = %e, "Wallet disconnect failed");
            }
        }));
        if tokio::time::timeout(self.wallet_disconnect_timeout, disconnects)
            .await
            .is_err()
        {
            tracing::warn!(
                timeout_secs = self.wallet_disconnect_timeout.as_secs(),
                "Wallet disconnect timed out"
            );
        }
        tracing::info!("Onchain disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::wallet::{MockWallet, WalletInfo};

    fn wallet(id: Id, currency: Currency, ready: bool) -> Arc<dyn Wallet> {
        let mut mock = MockWallet::new();
        mock.expect_info().returning(move || WalletInfo {
            id,
            name: format!("wallet-{}", id),
            currency,
            readonly: false,
            tenant_id: 1,
        });
        mock.expect_ready().return_const(ready);
        Arc::new(mock)
    }

    fn onchain() -> Onchain {
        Onchain::new(Network::Regtest, None, None, Shutdown::new())
    }

    #[test]
    fn test_wallet_registry() {
        let onchain = onchain();
        onchain.add_wallet(wallet(1, Currency::Btc, true));
        onchain.add_wallet(wallet(2, Currency::Liquid, true));

        let liquid = WalletChecker {
            currency: Some(Currency::Liquid),
            ..Default::default()
        };
        assert_eq!(onchain.get_wallets(&liquid).len(), 1);
        assert_eq!(onchain.get_any_wallet(&liquid).unwrap().info().id, 2);

        onchain.remove_wallet(2);
        assert!(onchain.get_any_wallet(&liquid).is_err());
        assert_eq!(onchain.get_wallets(&WalletChecker::default()).len(), 1);
    }

    #[test]
    fn test_unready_wallet_is_skipped() {
        let onchain = onchain();
        onchain.add_wallet(wallet(1, Currency::Btc, false));
        assert!(onchain.get_any_wallet(&WalletChecker::by_id(1)).is_err());
    }

    #[tokio::test]
    async fn test_missing_currency() {
        let err = onchain().estimate_fee(Currency::Liquid).await.unwrap_err();
        assert_eq!(err.to_string(), "no onchain support for L-BTC");
    }
}
