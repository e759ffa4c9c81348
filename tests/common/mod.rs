//! Shared fakes and a tiny HTTP server for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use swap_client::chain::types::{ChainError, ChainResult, Currency, Network, Output};
use swap_client::chain::{ChainDataSource, MultiSourceAggregator, NamedSource};
use swap_client::lifecycle::Shutdown;
use swap_client::onchain::wallet::{WalletError, WalletResult};
use swap_client::onchain::{Balance, CurrencyCoordinator, Onchain, Wallet, WalletInfo, WalletSendArgs};
use swap_client::resilience::RetryPolicy;

pub const REGTEST_ADDRESS: &str = "bcrt1pedm5v4z658f3ad4gyxmnren7gdnnqhm6pdtgheksfvm8f4k74uas7tz83f";

/// One-input transaction with the given outputs.
pub fn btc_tx(outputs: Vec<(ScriptBuf, u64)>) -> bitcoin::Transaction {
    bitcoin::Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs
            .into_iter()
            .map(|(script_pubkey, value)| TxOut {
                value: Amount::from_sat(value),
                script_pubkey,
            })
            .collect(),
    }
}

pub fn regtest_script() -> ScriptBuf {
    bitcoin::Address::from_str(REGTEST_ADDRESS)
        .unwrap()
        .assume_checked()
        .script_pubkey()
}

/// Scriptable data source. Unset answers fail with an HTTP error.
#[derive(Default)]
pub struct FakeSource {
    pub fee: Option<f64>,
    pub height: Option<u32>,
    pub confirmed: Option<bool>,
    pub tx_hex: Option<String>,
    pub utxos: Option<Vec<Output>>,
    pub broadcast_id: Option<String>,
    pub delay: Duration,
    pub calls: AtomicU32,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_fee(mut self, fee: f64) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn with_confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = Some(confirmed);
        self
    }

    pub fn with_tx_hex(mut self, hex: impl Into<String>) -> Self {
        self.tx_hex = Some(hex.into());
        self
    }

    pub fn with_broadcast_id(mut self, id: impl Into<String>) -> Self {
        self.broadcast_id = Some(id.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer<T: Clone>(&self, value: &Option<T>, what: &str) -> ChainResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        value
            .clone()
            .ok_or_else(|| ChainError::Http(format!("{} unavailable", what)))
    }
}

#[async_trait]
impl ChainDataSource for FakeSource {
    async fn estimate_fee(&self) -> ChainResult<f64> {
        match self.fee {
            Some(_) => self.answer(&self.fee, "fee").await,
            None => Err(ChainError::Unsupported("fee estimation".to_string())),
        }
    }

    async fn block_height(&self) -> ChainResult<u32> {
        self.answer(&self.height, "height").await
    }

    async fn is_confirmed(&self, _tx_id: &str) -> ChainResult<bool> {
        self.answer(&self.confirmed, "status").await
    }

    async fn raw_transaction(&self, _tx_id: &str) -> ChainResult<String> {
        self.answer(&self.tx_hex, "transaction").await
    }

    async fn unspent_outputs(&self, _address: &str) -> ChainResult<Vec<Output>> {
        self.answer(&self.utxos, "utxos").await
    }

    async fn broadcast(&self, _tx_hex: &str) -> ChainResult<String> {
        self.answer(&self.broadcast_id, "broadcast").await
    }
}

pub fn named(name: &str, source: FakeSource) -> NamedSource {
    NamedSource::new(name, Arc::new(source) as Arc<dyn ChainDataSource>)
}

pub fn aggregator(primaries: Vec<NamedSource>, fallback: Option<NamedSource>) -> MultiSourceAggregator {
    MultiSourceAggregator::new(Currency::Btc, primaries, fallback, Duration::from_secs(2)).unwrap()
}

/// Regtest BTC coordinator over `sources` with millisecond retries.
pub fn btc_coordinator(sources: Vec<NamedSource>) -> CurrencyCoordinator {
    btc_coordinator_with(sources, Shutdown::new())
}

pub fn btc_coordinator_with(sources: Vec<NamedSource>, shutdown: Shutdown) -> CurrencyCoordinator {
    CurrencyCoordinator::new(Network::Regtest, aggregator(sources, None), shutdown)
        .with_retry(RetryPolicy::new(2, Duration::from_millis(5)))
}

/// BTC-only facade sharing one shutdown token with its coordinator.
pub fn btc_onchain(sources: Vec<NamedSource>) -> Onchain {
    let shutdown = Shutdown::new();
    let coordinator = Arc::new(btc_coordinator_with(sources, shutdown.clone()));
    Onchain::new(Network::Regtest, Some(coordinator), None, shutdown)
}

/// Wallet whose disconnect takes `disconnect_delay`.
pub struct FakeWallet {
    pub info: WalletInfo,
    pub balance: Balance,
    pub disconnect_delay: Duration,
    pub disconnects: AtomicU32,
}

impl FakeWallet {
    pub fn new(id: i64, currency: Currency) -> Self {
        Self {
            info: WalletInfo {
                id,
                name: format!("wallet-{}", id),
                currency,
                readonly: false,
                tenant_id: 1,
            },
            balance: Balance::default(),
            disconnect_delay: Duration::ZERO,
            disconnects: AtomicU32::new(0),
        }
    }

    pub fn with_disconnect_delay(mut self, delay: Duration) -> Self {
        self.disconnect_delay = delay;
        self
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    fn info(&self) -> WalletInfo {
        self.info.clone()
    }

    fn ready(&self) -> bool {
        true
    }

    async fn new_address(&self) -> WalletResult<String> {
        Ok(REGTEST_ADDRESS.to_string())
    }

    async fn send_to_address(&self, _args: WalletSendArgs) -> WalletResult<String> {
        Err(WalletError::Unsupported("sending".to_string()))
    }

    async fn balance(&self) -> WalletResult<Balance> {
        Ok(self.balance)
    }

    async fn send_fee(&self, _args: WalletSendArgs) -> WalletResult<(u64, u64)> {
        Err(WalletError::Unsupported("fee estimation".to_string()))
    }

    async fn disconnect(&self) -> WalletResult<()> {
        tokio::time::sleep(self.disconnect_delay).await;
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Start an HTTP server on an ephemeral port. `handler` maps method and
/// path to a status code and body.
pub async fn start_mock_explorer<F>(handler: F) -> SocketAddr
where
    F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = handler.clone();
                    tokio::spawn(async move {
                        let Some((method, path)) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = handler(&method, &path);
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Read the request head and body, returning method and path.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut parts = head.lines().next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    Some((method, path))
}
