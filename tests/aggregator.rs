//! Combination policies of the multi-source aggregator.

use std::sync::Arc;
use std::time::Duration;

use swap_client::chain::types::ChainError;
use swap_client::chain::{ChainDataSource, NamedSource};

mod common;
use common::{aggregator, named, FakeSource};

#[tokio::test]
async fn test_height_is_max_of_primaries_and_ignores_fallback() {
    let fallback = Arc::new(FakeSource::new().with_height(102));
    let agg = aggregator(
        vec![
            named("a", FakeSource::new()),
            named("b", FakeSource::new().with_height(100)),
            named("c", FakeSource::new().with_height(101)),
        ],
        Some(NamedSource::new("fallback", fallback.clone() as Arc<dyn ChainDataSource>)),
    );

    assert_eq!(agg.block_height().await.unwrap(), 101);
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_height_falls_back_when_every_primary_fails() {
    let agg = aggregator(
        vec![named("a", FakeSource::new()), named("b", FakeSource::new())],
        Some(named("fallback", FakeSource::new().with_height(102))),
    );
    assert_eq!(agg.block_height().await.unwrap(), 102);
}

#[tokio::test]
async fn test_height_error_lists_every_source() {
    let agg = aggregator(
        vec![named("a", FakeSource::new())],
        Some(named("fallback", FakeSource::new())),
    );
    let err = agg.block_height().await.unwrap_err();
    let ChainError::AllSourcesFailed(failures) = &err else {
        panic!("unexpected error: {}", err);
    };
    let names: Vec<_> = failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["a", "fallback"]);
}

#[tokio::test]
async fn test_any_confirmation_wins() {
    let agg = aggregator(
        vec![
            named("slow-no", FakeSource::new().with_confirmed(false).with_delay(Duration::from_millis(50))),
            named("broken", FakeSource::new()),
            named("yes", FakeSource::new().with_confirmed(true)),
        ],
        None,
    );
    assert!(agg.is_confirmed("tx").await.unwrap());
}

#[tokio::test]
async fn test_unconfirmed_answer_beats_fallback() {
    let fallback = Arc::new(FakeSource::new().with_confirmed(true));
    let agg = aggregator(
        vec![named("a", FakeSource::new().with_confirmed(false)), named("b", FakeSource::new())],
        Some(NamedSource::new("fallback", fallback.clone() as Arc<dyn ChainDataSource>)),
    );

    assert!(!agg.is_confirmed("tx").await.unwrap());
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_transaction_comes_from_first_source_that_has_it() {
    let agg = aggregator(
        vec![
            named("a", FakeSource::new()),
            named("b", FakeSource::new().with_tx_hex("beef")),
            named("c", FakeSource::new().with_tx_hex("dead")),
        ],
        None,
    );
    assert_eq!(agg.raw_transaction("tx").await.unwrap(), "beef");
}

#[tokio::test]
async fn test_fee_skips_sources_without_estimates() {
    let agg = aggregator(
        vec![
            named("esplora", FakeSource::new()),
            named("mempool", FakeSource::new().with_fee(7.5)),
        ],
        None,
    );
    assert_eq!(agg.estimate_fee().await.unwrap(), 7.5);

    let none = aggregator(vec![named("esplora", FakeSource::new())], None);
    assert!(matches!(none.estimate_fee().await, Err(ChainError::NoFeeFound)));
}

#[tokio::test]
async fn test_broadcast_returns_first_success() {
    let agg = aggregator(
        vec![
            named("broken", FakeSource::new()),
            named("slow", FakeSource::new().with_broadcast_id("txid").with_delay(Duration::from_millis(200))),
            named("fast", FakeSource::new().with_broadcast_id("txid")),
        ],
        None,
    );

    let started = tokio::time::Instant::now();
    assert_eq!(agg.broadcast("00").await.unwrap(), "txid");
    assert!(started.elapsed() < Duration::from_millis(200));
}

#[tokio::test]
async fn test_timed_out_source_counts_as_failure() {
    let agg = swap_client::chain::MultiSourceAggregator::new(
        swap_client::chain::types::Currency::Btc,
        vec![
            named("stuck", FakeSource::new().with_height(500).with_delay(Duration::from_secs(5))),
            named("ok", FakeSource::new().with_height(100)),
        ],
        None,
        Duration::from_millis(50),
    )
    .unwrap();

    assert_eq!(agg.block_height().await.unwrap(), 100);
}
