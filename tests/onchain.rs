//! Coordinator and facade behaviour over fake sources and wallets.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use swap_client::chain::types::Currency;
use swap_client::onchain::{OnchainError, OutputArgs, Wallet};

mod common;
use common::{btc_coordinator, btc_onchain, btc_tx, named, regtest_script, FakeSource, FakeWallet, REGTEST_ADDRESS};

fn lockup_hex(value: u64) -> String {
    bitcoin::consensus::encode::serialize_hex(&btc_tx(vec![(regtest_script(), value)]))
}

fn output_args(expected_amount: u64, require_confirmed: bool) -> OutputArgs {
    OutputArgs {
        transaction_id: "lockup".to_string(),
        currency: Currency::Btc,
        address: REGTEST_ADDRESS.to_string(),
        blinding_key: None,
        expected_amount,
        require_confirmed,
    }
}

#[tokio::test]
async fn test_locate_output_rejects_short_lockup() {
    let coordinator = btc_coordinator(vec![named(
        "explorer",
        FakeSource::new().with_tx_hex(lockup_hex(99_999)).with_confirmed(true),
    )]);

    let err = coordinator.locate_output(&output_args(100_000, false)).await.unwrap_err();
    assert_eq!(err.to_string(), "locked up less onchain coins than expected: 99999 < 100000");
    assert!(matches!(
        err,
        OnchainError::AmountTooLow {
            value: 99_999,
            expected: 100_000
        }
    ));

    let found = coordinator.locate_output(&output_args(99_999, true)).await.unwrap();
    assert_eq!(found.vout, 0);
    assert_eq!(found.value, 99_999);
}

#[tokio::test]
async fn test_locate_output_requires_confirmation_when_asked() {
    let coordinator = btc_coordinator(vec![named(
        "explorer",
        FakeSource::new().with_tx_hex(lockup_hex(50_000)).with_confirmed(false),
    )]);

    assert!(matches!(
        coordinator.locate_output(&output_args(0, true)).await,
        Err(OnchainError::NotConfirmed)
    ));
    assert!(coordinator.locate_output(&output_args(0, false)).await.is_ok());
}

#[tokio::test]
async fn test_transaction_lookup_retries_then_gives_up() {
    let source = Arc::new(FakeSource::new());
    let coordinator = btc_coordinator(vec![swap_client::chain::NamedSource::new(
        "explorer",
        source.clone() as Arc<dyn swap_client::chain::ChainDataSource>,
    )]);

    assert!(coordinator.get_transaction("missing", None, true).await.is_err());
    // One attempt plus two retries.
    assert_eq!(source.calls(), 3);

    assert!(matches!(
        coordinator.get_transaction("", None, true).await,
        Err(OnchainError::EmptyTransactionId)
    ));
}

#[tokio::test]
async fn test_block_listener_publishes_new_heights() {
    let onchain = btc_onchain(vec![named("explorer", FakeSource::new().with_height(321))]);

    let mut epochs = onchain.subscribe_blocks(Currency::Btc).unwrap();
    onchain.start_block_listeners(Some(Duration::from_millis(10))).await;

    let epoch = tokio::time::timeout(Duration::from_secs(2), epochs.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(epoch.currency, Currency::Btc);
    assert_eq!(epoch.height, 321);

    onchain.disconnect().await;
}

#[tokio::test]
async fn test_missing_currency_is_reported() {
    let onchain = btc_onchain(vec![named("explorer", FakeSource::new().with_height(1))]);

    assert!(matches!(
        onchain.get_block_height(Currency::Liquid).await,
        Err(OnchainError::CurrencyNotConfigured(Currency::Liquid))
    ));
}

#[tokio::test]
async fn test_slow_wallet_does_not_block_disconnect() {
    let onchain = btc_onchain(vec![named("explorer", FakeSource::new().with_height(1))])
        .with_wallet_disconnect_timeout(Duration::from_millis(100));

    let fast = Arc::new(FakeWallet::new(1, Currency::Btc));
    let slow = Arc::new(FakeWallet::new(2, Currency::Btc).with_disconnect_delay(Duration::from_secs(30)));
    onchain.add_wallet(fast.clone() as Arc<dyn Wallet>);
    onchain.add_wallet(slow.clone() as Arc<dyn Wallet>);

    let started = tokio::time::Instant::now();
    onchain.disconnect().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(fast.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(slow.disconnects.load(Ordering::SeqCst), 0);
}
