//! Wire types of the counterparty's REST API.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use thiserror::Error;

use crate::chain::types::{Currency, Pair};

/// Byte string carried as lowercase hex on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map(HexBytes).map_err(serde::de::Error::custom)
    }
}

/// Service fee in percent. The API sends it either as number or string.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize)]
pub struct Percentage(pub f64);

impl Percentage {
    pub fn ratio(&self) -> f64 {
        self.0 / 100.0
    }

    /// Fee for `value`, rounded up.
    pub fn calculate(&self, value: u64) -> u64 {
        (value as f64 * self.ratio()).ceil() as u64
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Percentage(n)),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map(Percentage)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineLimits {
    pub minimal: u64,
    pub maximal: u64,
    #[serde(default)]
    pub maximal_zero_conf: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineFees {
    pub percentage: Percentage,
    pub miner_fees: u64,
}

/// Quote for a submarine swap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmarinePair {
    pub hash: String,
    pub rate: f64,
    pub limits: SubmarineLimits,
    pub fees: SubmarineFees,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReverseMinerFees {
    pub lockup: u64,
    pub claim: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseFees {
    pub percentage: Percentage,
    pub miner_fees: ReverseMinerFees,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    pub minimal: u64,
    pub maximal: u64,
}

/// Quote for a reverse swap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReversePair {
    pub hash: String,
    pub rate: f64,
    pub limits: Limits,
    pub fees: ReverseFees,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainUserMinerFees {
    pub claim: u64,
    pub lockup: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainMinerFees {
    pub server: u64,
    pub user: ChainUserMinerFees,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFees {
    pub percentage: Percentage,
    pub miner_fees: ChainMinerFees,
}

/// Quote for a chain swap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainPair {
    pub hash: String,
    pub rate: f64,
    pub limits: SubmarineLimits,
    pub fees: ChainFees,
}

pub type SubmarinePairs = HashMap<Currency, HashMap<Currency, SubmarinePair>>;
pub type ReversePairs = HashMap<Currency, HashMap<Currency, ReversePair>>;
pub type ChainPairs = HashMap<Currency, HashMap<Currency, ChainPair>>;

/// Pick one pair out of the nested `from -> to` map.
pub fn find_pair<T: Clone>(
    pair: Pair,
    pairs: &HashMap<Currency, HashMap<Currency, T>>,
) -> Result<T, CounterpartyError> {
    pairs
        .get(&pair.from)
        .ok_or_else(|| CounterpartyError::PairNotFound(format!("could not find pair from {}", pair)))?
        .get(&pair.to)
        .cloned()
        .ok_or_else(|| CounterpartyError::PairNotFound(format!("could not find pair to {}", pair)))
}

/// One tapscript leaf as sent by the counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedLeaf {
    pub version: u8,
    pub output: HexBytes,
}

/// Claim and refund leaves of a swap tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedTree {
    pub claim_leaf: SerializedLeaf,
    pub refund_leaf: SerializedLeaf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapRequest {
    pub from: Option<Currency>,
    pub to: Option<Currency>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pair_hash: String,
    pub refund_public_key: HexBytes,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub invoice: String,
    pub referral_id: String,
    #[serde(skip_serializing_if = "HexBytes::is_empty")]
    pub preimage_hash: HexBytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapResponse {
    pub id: String,
    #[serde(default)]
    pub bip21: String,
    pub address: String,
    pub swap_tree: SerializedTree,
    pub claim_public_key: HexBytes,
    pub timeout_block_height: u32,
    #[serde(default)]
    pub accept_zero_conf: bool,
    pub expected_amount: u64,
    #[serde(default)]
    pub blinding_key: HexBytes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReverseSwapRequest {
    pub from: Option<Currency>,
    pub to: Option<Currency>,
    pub preimage_hash: HexBytes,
    pub claim_public_key: HexBytes,
    #[serde(skip_serializing_if = "is_zero")]
    pub invoice_amount: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub onchain_amount: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pair_hash: String,
    pub referral_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(skip_serializing_if = "HexBytes::is_empty")]
    pub address_signature: HexBytes,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "HexBytes::is_empty")]
    pub description_hash: HexBytes,
    #[serde(skip_serializing_if = "is_zero")]
    pub invoice_expiry: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReverseSwapResponse {
    pub id: String,
    pub invoice: String,
    pub swap_tree: SerializedTree,
    pub refund_public_key: HexBytes,
    pub lockup_address: String,
    pub timeout_block_height: u32,
    pub onchain_amount: u64,
    #[serde(default)]
    pub blinding_key: HexBytes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRequest {
    pub from: Option<Currency>,
    pub to: Option<Currency>,
    pub preimage_hash: HexBytes,
    pub claim_public_key: HexBytes,
    pub refund_public_key: HexBytes,
    #[serde(skip_serializing_if = "is_zero")]
    pub user_lock_amount: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub server_lock_amount: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pair_hash: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub referral_id: String,
}

/// Lockup details of one side of a chain swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSwapData {
    pub swap_tree: SerializedTree,
    pub lockup_address: String,
    pub server_public_key: HexBytes,
    pub timeout_block_height: u32,
    pub amount: u64,
    #[serde(default)]
    pub blinding_key: HexBytes,
    #[serde(default)]
    pub bip21: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    pub id: String,
    pub claim_details: ChainSwapData,
    pub lockup_details: ChainSwapData,
}

/// BIP21 of a reverse swap, signed by the magic routing hint key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseBip21 {
    pub bip21: String,
    pub signature: HexBytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub hex: String,
    #[serde(default)]
    pub confirmations: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Errors from the counterparty client.
#[derive(Debug, Error)]
pub enum CounterpartyError {
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with an `error` field.
    #[error("counterparty error: {0}")]
    Api(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    PairNotFound(String),
}

impl From<reqwest::Error> for CounterpartyError {
    fn from(e: reqwest::Error) -> Self {
        CounterpartyError::Http(e.to_string())
    }
}

/// Result type for counterparty calls.
pub type CounterpartyResult<T> = Result<T, CounterpartyError>;
