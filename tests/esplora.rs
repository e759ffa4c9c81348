//! Explorer source against a local HTTP server.

use swap_client::chain::esplora::{EsploraFlavour, EsploraSource};
use swap_client::chain::types::{ChainError, Currency, Network};
use swap_client::chain::ChainDataSource;
use swap_client::config::schema::{SourceConfig, SourceKind};
use swap_client::config::ClientConfig;
use swap_client::lifecycle::Shutdown;
use swap_client::onchain::build_onchain;

mod common;
use common::start_mock_explorer;

fn explorer(method: &str, path: &str) -> (u16, String) {
    match (method, path) {
        ("GET", "/api/blocks/tip/height") => (200, "812345\n".to_string()),
        ("GET", "/api/tx/abcd/hex") => (200, "0200\n".to_string()),
        ("GET", "/api/tx/abcd/status") => (200, r#"{"confirmed":true,"block_height":812000}"#.to_string()),
        ("GET", "/api/tx/ffff/status") => (200, r#"{"confirmed":false}"#.to_string()),
        ("GET", "/api/address/bcrt1q/utxo") => (
            200,
            r#"[{"txid":"abcd","vout":0,"value":1500},{"txid":"beef","vout":1,"value":20}]"#.to_string(),
        ),
        ("GET", "/api/v1/fees/recommended") => (
            200,
            r#"{"fastestFee":12,"halfHourFee":8,"hourFee":5,"economyFee":2,"minimumFee":1}"#.to_string(),
        ),
        ("POST", "/api/tx") => (200, "abcd".to_string()),
        ("GET", "/api/tx/gone/hex") => (404, "Transaction not found".to_string()),
        _ => (500, "boom".to_string()),
    }
}

async fn source(flavour: EsploraFlavour) -> EsploraSource {
    let addr = start_mock_explorer(explorer).await;
    EsploraSource::new(&format!("http://{}/api", addr), flavour).unwrap()
}

#[tokio::test]
async fn test_reads_chain_state() {
    let source = source(EsploraFlavour::Esplora).await;

    assert_eq!(source.block_height().await.unwrap(), 812_345);
    assert_eq!(source.raw_transaction("abcd").await.unwrap(), "0200");
    assert!(source.is_confirmed("abcd").await.unwrap());
    assert!(!source.is_confirmed("ffff").await.unwrap());

    let utxos = source.unspent_outputs("bcrt1q").await.unwrap();
    assert_eq!(utxos.len(), 2);
    assert_eq!(utxos[0].tx_id, "abcd");
    assert_eq!(utxos[0].value, 1500);
}

#[tokio::test]
async fn test_broadcast_posts_hex() {
    let source = source(EsploraFlavour::Esplora).await;
    assert_eq!(source.broadcast("0200").await.unwrap(), "abcd");
}

#[tokio::test]
async fn test_fee_only_in_mempool_flavour() {
    let mempool = source(EsploraFlavour::Mempool).await;
    assert_eq!(mempool.estimate_fee().await.unwrap(), 8.0);

    let esplora = source(EsploraFlavour::Esplora).await;
    assert!(esplora.estimate_fee().await.unwrap_err().is_unsupported());
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let source = source(EsploraFlavour::Esplora).await;

    assert!(matches!(source.raw_transaction("gone").await, Err(ChainError::NotFound(_))));
    assert!(matches!(source.is_confirmed("other").await, Err(ChainError::Http(_))));
}

#[tokio::test]
async fn test_configured_sources_drive_the_facade() {
    let addr = start_mock_explorer(explorer).await;
    let mut config = ClientConfig {
        network: Network::Regtest,
        ..Default::default()
    };
    config.btc.sources = vec![SourceConfig {
        kind: SourceKind::Mempool,
        url: format!("http://{}/api", addr),
    }];

    let onchain = build_onchain(&config, None, Shutdown::new()).unwrap();
    assert_eq!(onchain.get_block_height(Currency::Btc).await.unwrap(), 812_345);
    assert_eq!(onchain.estimate_fee(Currency::Btc).await.unwrap(), 8.0);
    assert!(onchain.is_transaction_confirmed(Currency::Btc, "abcd", false).await.unwrap());
}
