//! Wiring of sources, aggregators and coordinators from configuration.

use std::sync::Arc;

use crate::chain::aggregator::MultiSourceAggregator;
use crate::chain::counterparty::CounterpartySource;
use crate::chain::esplora::EsploraSource;
use crate::chain::source::{ChainDataSource, NamedSource};
use crate::chain::types::{ChainResult, Currency};
use crate::config::schema::ClientConfig;
use crate::counterparty::CounterpartyApi;
use crate::lifecycle::Shutdown;
use crate::onchain::coordinator::CurrencyCoordinator;
use crate::onchain::manager::Onchain;
use crate::resilience::RetryPolicy;

/// Name of the counterparty fallback in logs and metrics.
pub const COUNTERPARTY_SOURCE: &str = "counterparty";

/// Build the coordinator of one currency.
pub fn build_coordinator(
    config: &ClientConfig,
    currency: Currency,
    counterparty: Option<Arc<dyn CounterpartyApi>>,
    shutdown: Shutdown,
) -> ChainResult<CurrencyCoordinator> {
    let mut primaries = Vec::new();
    for source in config.sources(currency) {
        let esplora = EsploraSource::new(&source.url, source.kind.into())?;
        tracing::info!(currency = %currency, source = %source.name(), url = %source.url, "Using chain data source");
        primaries.push(NamedSource::new(source.name(), Arc::new(esplora) as Arc<dyn ChainDataSource>));
    }

    let fallback = counterparty
        .filter(|_| config.currency(currency).use_counterparty_fallback)
        .map(|api| {
            NamedSource::new(
                COUNTERPARTY_SOURCE,
                Arc::new(CounterpartySource::new(api, currency)) as Arc<dyn ChainDataSource>,
            )
        });

    let aggregator =
        MultiSourceAggregator::new(currency, primaries, fallback, config.onchain.source_timeout())?;
    let retries = config.onchain.retry_attempts.saturating_sub(1);
    Ok(CurrencyCoordinator::new(config.network, aggregator, shutdown)
        .with_fee_floor(config.fee_floor(currency))
        .with_retry(RetryPolicy::new(retries, config.onchain.retry_delay())))
}

/// Build the [`Onchain`] facade with one coordinator per currency.
pub fn build_onchain(
    config: &ClientConfig,
    counterparty: Option<Arc<dyn CounterpartyApi>>,
    shutdown: Shutdown,
) -> ChainResult<Onchain> {
    let btc = build_coordinator(config, Currency::Btc, counterparty.clone(), shutdown.clone())?;
    let liquid = build_coordinator(config, Currency::Liquid, counterparty, shutdown.clone())?;
    Ok(Onchain::new(config.network, Some(Arc::new(btc)), Some(Arc::new(liquid)), shutdown)
        .with_wallet_disconnect_timeout(config.onchain.wallet_disconnect_timeout()))
}
