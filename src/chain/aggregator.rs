//! Combines several independent chain data sources for one currency.
//!
//! # Responsibilities
//! - Hold the ordered primary sources plus an optional fallback
//! - Apply a distinct combination policy per operation
//! - Bound every single source call by a timeout and record its outcome
//!
//! # Policies
//! ```text
//! raw_transaction   all sources, in order, first success
//! estimate_fee      all sources, in order, first success, else NoFeeFound
//! unspent_outputs   all sources, in order, first non-empty list
//! broadcast         all sources, concurrently, first txid wins
//! is_confirmed      primaries concurrently, any `true` wins; fallback only
//!                   when every primary errored
//! block_height      primaries concurrently, maximum answer; fallback only
//!                   when every primary errored
//! disconnect        every source, best effort
//! ```
//!
//! The fallback is the counterparty itself. It must never be able to assert
//! a confirmation or a height on its own while any primary answers.

use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::chain::source::NamedSource;
use crate::chain::types::{ChainError, ChainResult, Currency, Output, SourceFailure};
use crate::observability::metrics;
use crate::resilience::with_timeout;

/// Collapse per-source failures. When every source only lacked the
/// capability the result stays [`ChainError::Unsupported`].
fn all_failed(failures: Vec<SourceFailure>) -> ChainError {
    if !failures.is_empty() && failures.iter().all(|f| f.error.is_unsupported()) {
        let what = failures
            .into_iter()
            .next()
            .map(|f| f.error.to_string())
            .unwrap_or_default();
        return ChainError::Unsupported(what);
    }
    ChainError::AllSourcesFailed(failures)
}

/// Default bound on a single source call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct MultiSourceAggregator {
    currency: Currency,
    primaries: Vec<NamedSource>,
    fallback: Option<NamedSource>,
    call_timeout: Duration,
}

impl MultiSourceAggregator {
    /// Create an aggregator. At least one source, primary or fallback, is
    /// required.
    pub fn new(
        currency: Currency,
        primaries: Vec<NamedSource>,
        fallback: Option<NamedSource>,
        call_timeout: Duration,
    ) -> ChainResult<Self> {
        if primaries.is_empty() && fallback.is_none() {
            return Err(ChainError::NoSources(currency));
        }
        Ok(Self {
            currency,
            primaries,
            fallback,
            call_timeout,
        })
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Primaries in configured order, then the fallback if present.
    pub fn all_sources(&self) -> impl Iterator<Item = &NamedSource> {
        self.primaries.iter().chain(self.fallback.iter())
    }

    pub fn source_names(&self) -> Vec<String> {
        self.all_sources().map(|s| s.name.clone()).collect()
    }

    async fn timed<T, Fut>(&self, name: &str, op: &'static str, fut: Fut) -> ChainResult<T>
    where
        Fut: Future<Output = ChainResult<T>>,
    {
        let start = Instant::now();
        let result = with_timeout(self.call_timeout, fut).await;
        metrics::record_source_call(self.currency, name, op, result.is_ok());
        metrics::record_source_latency(self.currency, name, op, start.elapsed());
        result
    }

    pub async fn raw_transaction(&self, tx_id: &str) -> ChainResult<String> {
        let mut failures = Vec::new();
        for source in self.all_sources() {
            match self
                .timed(&source.name, "raw_transaction", source.source.raw_transaction(tx_id))
                .await
            {
                Ok(hex) => return Ok(hex),
                Err(e) => {
                    tracing::debug!(
                        currency = %self.currency,
                        source = %source.name,
                        tx_id,
                        error = %e,
                        "Could not fetch transaction"
                    );
                    failures.push(SourceFailure {
                        name: source.name.clone(),
                        error: e,
                    });
                }
            }
        }
        Err(all_failed(failures))
    }

    pub async fn estimate_fee(&self) -> ChainResult<f64> {
        for source in self.all_sources() {
            match self
                .timed(&source.name, "estimate_fee", source.source.estimate_fee())
                .await
            {
                Ok(fee) => return Ok(fee),
                Err(e) if e.is_unsupported() => {}
                Err(e) => tracing::warn!(
                    currency = %self.currency,
                    source = %source.name,
                    error = %e,
                    "Fee estimation failed"
                ),
            }
        }
        Err(ChainError::NoFeeFound)
    }

    pub async fn unspent_outputs(&self, address: &str) -> ChainResult<Vec<Output>> {
        let mut failures = Vec::new();
        let mut answered = false;
        for source in self.all_sources() {
            match self
                .timed(&source.name, "unspent_outputs", source.source.unspent_outputs(address))
                .await
            {
                Ok(outputs) if !outputs.is_empty() => return Ok(outputs),
                Ok(_) => answered = true,
                Err(e) => failures.push(SourceFailure {
                    name: source.name.clone(),
                    error: e,
                }),
            }
        }
        if answered {
            Ok(Vec::new())
        } else {
            Err(all_failed(failures))
        }
    }

    /// Broadcast through every source at once. Sources that are still busy
    /// when the first id arrives keep running in the background.
    pub async fn broadcast(&self, tx_hex: &str) -> ChainResult<String> {
        let mut tasks: FuturesUnordered<_> = self
            .all_sources()
            .map(|source| {
                let name = source.name.clone();
                let inner = source.source.clone();
                let hex = tx_hex.to_string();
                let call_timeout = self.call_timeout;
                let currency = self.currency;
                let task_name = name.clone();
                let handle = tokio::spawn(async move {
                    let result = with_timeout(call_timeout, inner.broadcast(&hex)).await;
                    metrics::record_source_call(currency, &task_name, "broadcast", result.is_ok());
                    result
                });
                async move { (name, handle.await) }
            })
            .collect();

        let mut failures = Vec::new();
        while let Some((name, joined)) = tasks.next().await {
            match joined {
                Ok(Ok(tx_id)) => {
                    tracing::info!(currency = %self.currency, source = %name, tx_id = %tx_id, "Broadcast transaction");
                    metrics::record_broadcast(self.currency, true);
                    return Ok(tx_id);
                }
                Ok(Err(e)) => {
                    tracing::warn!(currency = %self.currency, source = %name, error = %e, "Broadcast failed");
                    failures.push(SourceFailure { name, error: e });
                }
                Err(e) => failures.push(SourceFailure {
                    name,
                    error: ChainError::Task(e.to_string()),
                }),
            }
        }

        metrics::record_broadcast(self.currency, false);
        Err(all_failed(failures))
    }

    pub async fn is_confirmed(&self, tx_id: &str) -> ChainResult<bool> {
        let mut pending: FuturesUnordered<_> = self
            .primaries
            .iter()
            .map(|source| async move {
                let result = self
                    .timed(&source.name, "is_confirmed", source.source.is_confirmed(tx_id))
                    .await;
                (source, result)
            })
            .collect();

        let mut answered = false;
        let mut failures = Vec::new();
        while let Some((source, result)) = pending.next().await {
            match result {
                Ok(true) => return Ok(true),
                Ok(false) => answered = true,
                Err(e) => {
                    tracing::debug!(
                        currency = %self.currency,
                        source = %source.name,
                        tx_id,
                        error = %e,
                        "Confirmation check failed"
                    );
                    failures.push(SourceFailure {
                        name: source.name.clone(),
                        error: e,
                    });
                }
            }
        }
        drop(pending);

        if answered {
            return Ok(false);
        }

        let Some(fallback) = &self.fallback else {
            return Err(all_failed(failures));
        };
        tracing::debug!(currency = %self.currency, tx_id, "All primary sources failed, asking fallback");
        match self
            .timed(&fallback.name, "is_confirmed", fallback.source.is_confirmed(tx_id))
            .await
        {
            Ok(confirmed) => Ok(confirmed),
            Err(e) => {
                failures.push(SourceFailure {
                    name: fallback.name.clone(),
                    error: e,
                });
                Err(all_failed(failures))
            }
        }
    }

    pub async fn block_height(&self) -> ChainResult<u32> {
        let results = join_all(self.primaries.iter().map(|source| async move {
            let result = self
                .timed(&source.name, "block_height", source.source.block_height())
                .await;
            (source, result)
        }))
        .await;

        let mut best: Option<u32> = None;
        let mut failures = Vec::new();
        for (source, result) in results {
            match result {
                Ok(height) => best = Some(best.map_or(height, |b| b.max(height))),
                Err(e) => {
                    tracing::debug!(currency = %self.currency, source = %source.name, error = %e, "Block height failed");
                    failures.push(SourceFailure {
                        name: source.name.clone(),
                        error: e,
                    });
                }
            }
        }

        if let Some(height) = best {
            return Ok(height);
        }

        let Some(fallback) = &self.fallback else {
            return Err(all_failed(failures));
        };
        match self
            .timed(&fallback.name, "block_height", fallback.source.block_height())
            .await
        {
            Ok(height) => Ok(height),
            Err(e) => {
                failures.push(SourceFailure {
                    name: fallback.name.clone(),
                    error: e,
                });
                Err(all_failed(failures))
            }
        }
    }

    pub async fn disconnect(&self) {
        join_all(self.all_sources().map(|s| s.source.disconnect())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::source::{ChainDataSource, MockChainDataSource};
    use std::sync::Arc;

    fn named(name: &str, mock: MockChainDataSource) -> NamedSource {
        NamedSource::new(name, Arc::new(mock) as Arc<dyn ChainDataSource>)
    }

    fn aggregator(primaries: Vec<NamedSource>, fallback: Option<NamedSource>) -> MultiSourceAggregator {
        MultiSourceAggregator::new(Currency::Btc, primaries, fallback, Duration::from_secs(1)).unwrap()
    }

    fn height(h: u32) -> MockChainDataSource {
        let mut mock = MockChainDataSource::new();
        mock.expect_block_height().returning(move || Ok(h));
        mock
    }

    fn height_err() -> MockChainDataSource {
        let mut mock = MockChainDataSource::new();
        mock.expect_block_height()
            .returning(|| Err(ChainError::Http("down".into())));
        mock
    }

    #[test]
    fn test_requires_a_source() {
        let err = MultiSourceAggregator::new(Currency::Liquid, vec![], None, DEFAULT_CALL_TIMEOUT).unwrap_err();
        assert!(matches!(err, ChainError::NoSources(Currency::Liquid)));
    }

    #[test]
    fn test_fallback_is_last() {
        let agg = aggregator(
            vec![named("a", MockChainDataSource::new()), named("b", MockChainDataSource::new())],
            Some(named("fallback", MockChainDataSource::new())),
        );
        assert_eq!(agg.source_names(), vec!["a", "b", "fallback"]);
    }

    #[tokio::test]
    async fn test_block_height_takes_max_of_primaries() {
        let mut fallback = MockChainDataSource::new();
        fallback.expect_block_height().never();
        let agg = aggregator(
            vec![named("a", height_err()), named("b", height(100)), named("c", height(101))],
            Some(named("fallback", fallback)),
        );
        assert_eq!(agg.block_height().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn test_block_height_uses_fallback_when_primaries_fail() {
        let agg = aggregator(
            vec![named("a", height_err()), named("b", height_err())],
            Some(named("fallback", height(102))),
        );
        assert_eq!(agg.block_height().await.unwrap(), 102);
    }

    #[tokio::test]
    async fn test_raw_transaction_first_success_in_order() {
        let mut a = MockChainDataSource::new();
        a.expect_raw_transaction()
            .returning(|_| Err(ChainError::NotFound("tx".into())));
        let mut b = MockChainDataSource::new();
        b.expect_raw_transaction().returning(|_| Ok("bb".into()));
        let mut c = MockChainDataSource::new();
        c.expect_raw_transaction().never();

        let agg = aggregator(vec![named("a", a), named("b", b)], Some(named("c", c)));
        assert_eq!(agg.raw_transaction("id").await.unwrap(), "bb");
    }

    #[tokio::test]
    async fn test_is_confirmed_true_beats_errors() {
        let mut a = MockChainDataSource::new();
        a.expect_is_confirmed()
            .returning(|_| Err(ChainError::Http("down".into())));
        let mut b = MockChainDataSource::new();
        b.expect_is_confirmed().returning(|_| Ok(true));
        let mut fallback = MockChainDataSource::new();
        fallback.expect_is_confirmed().never();

        let agg = aggregator(vec![named("a", a), named("b", b)], Some(named("fallback", fallback)));
        assert!(agg.is_confirmed("id").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_confirmed_fallback_cannot_override_primary_false() {
        let mut a = MockChainDataSource::new();
        a.expect_is_confirmed().returning(|_| Ok(false));
        let mut b = MockChainDataSource::new();
        b.expect_is_confirmed()
            .returning(|_| Err(ChainError::Http("down".into())));
        let mut fallback = MockChainDataSource::new();
        fallback.expect_is_confirmed().never();

        let agg = aggregator(vec![named("a", a), named("b", b)], Some(named("fallback", fallback)));
        assert!(!agg.is_confirmed("id").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_confirmed_without_fallback_reports_every_error() {
        let mut a = MockChainDataSource::new();
        a.expect_is_confirmed()
            .returning(|_| Err(ChainError::Http("a down".into())));
        let mut b = MockChainDataSource::new();
        b.expect_is_confirmed()
            .returning(|_| Err(ChainError::Http("b down".into())));

        let agg = aggregator(vec![named("a", a), named("b", b)], None);
        match agg.is_confirmed("id").await {
            Err(ChainError::AllSourcesFailed(failures)) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_everywhere_stays_unsupported() {
        let mut a = MockChainDataSource::new();
        a.expect_is_confirmed()
            .returning(|_| Err(ChainError::Unsupported("confirmations".into())));
        let agg = aggregator(vec![named("a", a)], None);
        assert!(agg.is_confirmed("id").await.unwrap_err().is_unsupported());
    }

    #[tokio::test]
    async fn test_estimate_fee_none_found() {
        let mut a = MockChainDataSource::new();
        a.expect_estimate_fee()
            .returning(|| Err(ChainError::Unsupported("fee".into())));
        let agg = aggregator(vec![named("a", a)], None);
        assert!(matches!(agg.estimate_fee().await, Err(ChainError::NoFeeFound)));
    }

    #[tokio::test]
    async fn test_unspent_outputs_empty_is_not_failure() {
        let mut a = MockChainDataSource::new();
        a.expect_unspent_outputs()
            .returning(|_| Err(ChainError::Http("down".into())));
        let mut b = MockChainDataSource::new();
        b.expect_unspent_outputs().returning(|_| Ok(vec![]));

        let agg = aggregator(vec![named("a", a), named("b", b)], None);
        assert!(agg.unspent_outputs("addr").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unspent_outputs_first_non_empty_wins() {
        let mut a = MockChainDataSource::new();
        a.expect_unspent_outputs().returning(|_| Ok(vec![]));
        let mut b = MockChainDataSource::new();
        b.expect_unspent_outputs().returning(|_| {
            Ok(vec![Output {
                tx_id: "t".into(),
                value: 5,
            }])
        });

        let agg = aggregator(vec![named("a", a), named("b", b)], None);
        assert_eq!(agg.unspent_outputs("addr").await.unwrap()[0].value, 5);
    }

    #[tokio::test]
    async fn test_broadcast_one_success_is_enough() {
        let mut a = MockChainDataSource::new();
        a.expect_broadcast()
            .returning(|_| Err(ChainError::Http("rejected".into())));
        let mut b = MockChainDataSource::new();
        b.expect_broadcast().returning(|_| Ok("txid".into()));

        let agg = aggregator(vec![named("a", a)], Some(named("b", b)));
        assert_eq!(agg.broadcast("00").await.unwrap(), "txid");
    }

    #[tokio::test]
    async fn test_broadcast_all_fail_collects_errors() {
        let mut a = MockChainDataSource::new();
        a.expect_broadcast()
            .returning(|_| Err(ChainError::Http("a rejected".into())));
        let mut b = MockChainDataSource::new();
        b.expect_broadcast()
            .returning(|_| Err(ChainError::Http("b rejected".into())));

        let agg = aggregator(vec![named("a", a), named("b", b)], None);
        let msg = agg.broadcast("00").await.unwrap_err().to_string();
        assert!(msg.contains("a rejected"));
        assert!(msg.contains("b rejected"));
    }
}
