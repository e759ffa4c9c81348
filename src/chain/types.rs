//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ledgers the client can swap on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "L-BTC")]
    Liquid,
}

impl Currency {
    /// Wire symbol used by the counterparty and in config files.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Liquid => "L-BTC",
        }
    }

    /// Average block interval in minutes.
    pub fn block_time_minutes(&self) -> f64 {
        match self {
            Currency::Btc => 10.0,
            Currency::Liquid => 1.0,
        }
    }

    /// Convert a block delta into hours.
    pub fn blocks_to_hours(&self, blocks: u32) -> f64 {
        blocks as f64 * (self.block_time_minutes() / 60.0)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Currency {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BTC" | "btc" => Ok(Currency::Btc),
            "L-BTC" | "LBTC" | "l-btc" | "lbtc" | "liquid" => Ok(Currency::Liquid),
            other => Err(ChainError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Which network the client operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Bitcoin network parameters for address validation.
    pub fn bitcoin(&self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    /// Elements address parameters for address validation.
    pub fn liquid(&self) -> &'static elements::AddressParams {
        match self {
            Network::Mainnet => &elements::AddressParams::LIQUID,
            Network::Testnet => &elements::AddressParams::LIQUID_TESTNET,
            Network::Regtest => &elements::AddressParams::ELEMENTS,
        }
    }

    /// L-BTC asset id of the network.
    pub fn liquid_asset(&self) -> elements::AssetId {
        match self {
            Network::Mainnet => elements::AssetId::LIQUID_BTC,
            Network::Testnet => elements::AssetId::from_byte_array([
                0x49, 0x9a, 0x81, 0x85, 0x45, 0xf6, 0xba, 0xe3, 0x9f, 0xc0, 0x3b, 0x63, 0x7f, 0x2a, 0x4e, 0x1e,
                0x64, 0xe5, 0x90, 0xca, 0xc1, 0xbc, 0x3a, 0x6f, 0x6d, 0x71, 0xaa, 0x44, 0x43, 0x65, 0x4c, 0x14,
            ]),
            Network::Regtest => elements::AssetId::from_byte_array([
                0x25, 0xb2, 0x51, 0x07, 0x0e, 0x29, 0xca, 0x19, 0x04, 0x3c, 0xf3, 0x3c, 0xcd, 0x73, 0x24, 0xe2,
                0xdd, 0xab, 0x03, 0xec, 0xc4, 0xae, 0x0b, 0x5e, 0x77, 0xc4, 0xfc, 0x0e, 0x5c, 0xf6, 0xc9, 0x5a,
            ]),
        }
    }

    /// A syntactically valid lockup address used to size send fees before
    /// the real lockup address is known.
    pub fn dummy_lockup_address(&self, currency: Currency) -> &'static str {
        match (self, currency) {
            (Network::Mainnet, Currency::Btc) => {
                "bc1p28f027j7nte0pprte30nz4qxx65uc3rur23pukjganmzfwejj5lqjq5lky"
            }
            (Network::Mainnet, Currency::Liquid) => {
                "lq1pqtfldcsfag6u5lv20f85zjp68x99er90jxlqv3yc3ucy9zd3tt0ndztxkr9jaxynl8l4hvsfch7slg7l52pfw49te3wrhwazr9lq9s6y2cgwtpn9wv7z"
            }
            (Network::Testnet, Currency::Btc) => {
                "tb1p5a2rc0hcuf8n2rssmfr9mqk08nlxzl9ngnlhj47gwegj7epjph5q9739y6"
            }
            (Network::Testnet, Currency::Liquid) => {
                "tlq1pqghwg6s98dfhtrncxck6rl359eckxdwrk4680npy4m6q2lgud9y6p0w2jytj4akr2zhwze587d823zu5rg8vwfq0ehkk8c74lrvt77kmwqr5vwy7p47u"
            }
            (Network::Regtest, Currency::Btc) => {
                "bcrt1pedm5v4z658f3ad4gyxmnren7gdnnqhm6pdtgheksfvm8f4k74uas7tz83f"
            }
            (Network::Regtest, Currency::Liquid) => {
                "el1pqfg7mxz4cnpu8sj2pza285vh062eq0sxwt982nprnx0d975tvmzpdcqdwvpsds5q664fp90645wlze8544j8x59vzhhy6hylmad6ycjw07nsa6thmkz7"
            }
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
            Network::Regtest => f.write_str("regtest"),
        }
    }
}

/// Swap direction across two currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub from: Currency,
    pub to: Currency,
}

impl Pair {
    pub const fn new(from: Currency, to: Currency) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// An unspent output as reported by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub tx_id: String,
    pub value: u64,
}

/// A new tip observed by a block listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEpoch {
    pub currency: Currency,
    pub height: u32,
}

/// One source's contribution to an aggregate failure.
#[derive(Debug)]
pub struct SourceFailure {
    pub name: String,
    pub error: ChainError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

fn join_failures(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while talking to chain data sources.
#[derive(Debug, Error)]
pub enum ChainError {
    /// HTTP transport or status error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request exceeded its deadline.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// The source does not implement this capability.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// The source answered but the object does not exist (yet).
    #[error("not found: {0}")]
    NotFound(String),

    /// The source answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Every consulted source failed.
    #[error("all sources failed: {}", join_failures(.0))]
    AllSourcesFailed(Vec<SourceFailure>),

    /// No source produced a fee estimate.
    #[error("no fee found")]
    NoFeeFound,

    /// A source task panicked or was aborted.
    #[error("source task failed: {0}")]
    Task(String),

    /// Aggregator was built without any source.
    #[error("no chain data sources configured for {0}")]
    NoSources(Currency),

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// The owning coordinator shut down while waiting.
    #[error("operation cancelled")]
    Cancelled,
}

impl ChainError {
    /// Whether this is the "capability missing" sentinel.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ChainError::Unsupported(_))
    }
}

impl From<crate::resilience::retries::Cancelled> for ChainError {
    fn from(_: crate::resilience::retries::Cancelled) -> Self {
        ChainError::Cancelled
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChainError::Timeout(0)
        } else {
            ChainError::Http(e.to_string())
        }
    }
}

/// Result type for chain data operations.
pub type ChainResult<T> = Result<T, ChainError>;
