//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure of the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::chain::esplora::EsploraFlavour;
use crate::chain::types::{Currency, Network};
use crate::onchain::coordinator::default_fee_floor;

/// Root configuration for the swap client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Network to operate on.
    pub network: Network,

    /// Directory holding the swap store and the mnemonic.
    pub data_dir: PathBuf,

    /// Referral sent with every swap request.
    pub referral_id: String,

    /// Counterparty API settings.
    pub counterparty: CounterpartyConfig,

    /// Bitcoin data sources.
    pub btc: CurrencyConfig,

    /// Liquid data sources.
    pub liquid: CurrencyConfig,

    /// Retry, timeout and polling behaviour of the chain layer.
    pub onchain: OnchainConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ClientConfig {
    pub fn currency(&self, currency: Currency) -> &CurrencyConfig {
        match currency {
            Currency::Btc => &self.btc,
            Currency::Liquid => &self.liquid,
        }
    }

    /// Configured sources of `currency`, or the network defaults when none
    /// are set.
    pub fn sources(&self, currency: Currency) -> Vec<SourceConfig> {
        let configured = &self.currency(currency).sources;
        if configured.is_empty() {
            default_sources(self.network, currency)
        } else {
            configured.clone()
        }
    }

    /// Fee floor of `currency`, falling back to the built-in floor.
    pub fn fee_floor(&self, currency: Currency) -> f64 {
        self.currency(currency)
            .fee_floor
            .unwrap_or_else(|| default_fee_floor(currency))
    }

    /// Counterparty URL, or the public instance of the network.
    pub fn counterparty_url(&self) -> String {
        if !self.counterparty.url.is_empty() {
            return self.counterparty.url.clone();
        }
        match self.network {
            Network::Mainnet => "https://api.boltz.exchange".to_string(),
            Network::Testnet => "https://api.testnet.boltz.exchange".to_string(),
            Network::Regtest => "http://localhost:9001".to_string(),
        }
    }
}

/// Counterparty API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterpartyConfig {
    /// Base URL; empty selects the public instance of the network.
    pub url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CounterpartyConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 30,
        }
    }
}

impl CounterpartyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// API dialect of a configured explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Esplora,
    Mempool,
}

impl From<SourceKind> for EsploraFlavour {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Esplora => EsploraFlavour::Esplora,
            SourceKind::Mempool => EsploraFlavour::Mempool,
        }
    }
}

/// One explorer data source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub url: String,
}

impl SourceConfig {
    fn new(kind: SourceKind, url: &str) -> Self {
        Self {
            kind,
            url: url.to_string(),
        }
    }

    /// Label used in logs and metrics.
    pub fn name(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// Per-currency chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Primary sources in preference order. Empty uses the defaults of the
    /// network.
    pub sources: Vec<SourceConfig>,

    /// Minimum fee rate in sat/vbyte.
    pub fee_floor: Option<f64>,

    /// Ask the counterparty when every primary source fails.
    pub use_counterparty_fallback: bool,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            fee_floor: None,
            use_counterparty_fallback: true,
        }
    }
}

/// Chain layer timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OnchainConfig {
    /// Attempts of transaction and confirmation lookups.
    pub retry_attempts: u32,

    /// Delay between lookup attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Deadline of a single source call in seconds.
    pub source_timeout_secs: u64,

    /// Block listener poll interval; unset derives it from the block time.
    pub block_poll_secs: Option<u64>,

    /// Time wallets get to disconnect on shutdown.
    pub wallet_disconnect_timeout_secs: u64,
}

impl Default for OnchainConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            retry_delay_ms: 1_000,
            source_timeout_secs: 10,
            block_poll_secs: None,
            wallet_disconnect_timeout_secs: 10,
        }
    }
}

impl OnchainConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn block_poll(&self) -> Option<Duration> {
        self.block_poll_secs.map(Duration::from_secs)
    }

    pub fn wallet_disconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.wallet_disconnect_timeout_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Public explorers used when a currency has no sources configured.
pub fn default_sources(network: Network, currency: Currency) -> Vec<SourceConfig> {
    use SourceKind::{Esplora, Mempool};

    match (network, currency) {
        (Network::Mainnet, Currency::Btc) => vec![
            SourceConfig::new(Mempool, "https://mempool.space/api"),
            SourceConfig::new(Mempool, "https://mempool.bullbitcoin.com/api"),
            SourceConfig::new(Esplora, "https://blockstream.info/api"),
        ],
        (Network::Mainnet, Currency::Liquid) => vec![
            SourceConfig::new(Mempool, "https://liquid.network/api"),
            SourceConfig::new(Mempool, "https://liquid.bullbitcoin.com/api"),
            SourceConfig::new(Esplora, "https://blockstream.info/liquid/api"),
        ],
        (Network::Testnet, Currency::Btc) => vec![
            SourceConfig::new(Mempool, "https://mempool.space/testnet/api"),
            SourceConfig::new(Esplora, "https://blockstream.info/testnet/api"),
        ],
        (Network::Testnet, Currency::Liquid) => vec![
            SourceConfig::new(Mempool, "https://liquid.network/liquidtestnet/api"),
            SourceConfig::new(Esplora, "https://blockstream.info/liquidtestnet/api"),
        ],
        (Network::Regtest, Currency::Btc) => vec![SourceConfig::new(Esplora, "http://localhost:4002/api")],
        (Network::Regtest, Currency::Liquid) => vec![SourceConfig::new(Esplora, "http://localhost:4003/api")],
    }
}
