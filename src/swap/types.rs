//! Swap records, request arguments and results.

use bitcoin::secp256k1::{PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chain::types::{Currency, Pair};
use crate::counterparty::types::{
    ChainPair, HexBytes, Percentage, ReversePair, SerializedTree, SubmarinePair,
};
use crate::onchain::wallet::Id;

/// Tenant every record belongs to when no tenant is specified.
pub const DEFAULT_TENANT_ID: Id = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SwapState {
    #[default]
    Pending,
    Successful,
    Error,
    ServerError,
    Refunded,
    Abandoned,
}

impl SwapState {
    /// Whether nothing will happen to the swap anymore.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            SwapState::Successful | SwapState::Refunded | SwapState::Abandoned
        )
    }

    fn is_failed(&self) -> bool {
        matches!(self, SwapState::Error | SwapState::ServerError)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapType {
    Submarine,
    Reverse,
    Chain,
}

impl SwapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapType::Submarine => "submarine",
            SwapType::Reverse => "reverse",
            SwapType::Chain => "chain",
        }
    }
}

impl fmt::Display for SwapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mnemonic all swap keys are derived from, plus the next unused index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapMnemonic {
    pub mnemonic: String,
    pub last_key_index: u32,
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Chain to lightning swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineSwap {
    pub id: String,
    pub pair: Pair,
    pub state: SwapState,
    #[serde(default)]
    pub error: String,
    pub created_at: u64,
    pub private_key: SecretKey,
    pub swap_tree: SerializedTree,
    pub claim_pub_key: PublicKey,
    #[serde(default)]
    pub preimage: HexBytes,
    pub invoice: String,
    pub payment_hash: HexBytes,
    pub address: String,
    pub expected_amount: u64,
    pub timeout_block_height: u32,
    #[serde(default)]
    pub lockup_transaction_id: String,
    #[serde(default)]
    pub refund_transaction_id: String,
    #[serde(default)]
    pub refund_address: String,
    #[serde(default)]
    pub blinding_key: Option<SecretKey>,
    pub is_auto: bool,
    pub service_fee_percent: Percentage,
    #[serde(default)]
    pub wallet_id: Option<Id>,
    pub tenant_id: Id,
}

impl SubmarineSwap {
    /// Whether the lockup can (or must) be refunded at `height`.
    pub fn is_refundable(&self, height: u32) -> bool {
        !self.lockup_transaction_id.is_empty()
            && self.refund_transaction_id.is_empty()
            && (self.state.is_failed()
                || (self.state != SwapState::Successful && self.timeout_block_height < height))
    }
}

/// Lightning to chain swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseSwap {
    pub id: String,
    pub pair: Pair,
    pub state: SwapState,
    #[serde(default)]
    pub error: String,
    pub created_at: u64,
    pub accept_zero_conf: bool,
    pub private_key: SecretKey,
    pub refund_pub_key: PublicKey,
    pub swap_tree: SerializedTree,
    pub preimage: HexBytes,
    pub invoice: String,
    #[serde(default)]
    pub claim_address: String,
    pub onchain_amount: u64,
    pub invoice_amount: u64,
    pub timeout_block_height: u32,
    #[serde(default)]
    pub lockup_transaction_id: String,
    #[serde(default)]
    pub claim_transaction_id: String,
    #[serde(default)]
    pub blinding_key: Option<SecretKey>,
    pub is_auto: bool,
    pub service_fee_percent: Percentage,
    pub external_pay: bool,
    #[serde(default)]
    pub wallet_id: Option<Id>,
    pub tenant_id: Id,
}

impl ReverseSwap {
    pub fn is_claimable(&self) -> bool {
        !self.lockup_transaction_id.is_empty() && self.claim_transaction_id.is_empty()
    }
}

/// One side of a chain swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSwapData {
    pub id: String,
    pub currency: Currency,
    pub private_key: SecretKey,
    pub their_public_key: PublicKey,
    #[serde(default)]
    pub blinding_key: Option<SecretKey>,
    pub tree: SerializedTree,
    pub amount: u64,
    pub timeout_block_height: u32,
    #[serde(default)]
    pub lockup_transaction_id: String,
    /// Claim transaction on the receiving side, refund on the sending side.
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub wallet_id: Option<Id>,
    /// Where our coins end up (receiving side) or come back to (sending side).
    #[serde(default)]
    pub address: String,
    pub lockup_address: String,
}

/// Chain to chain swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSwap {
    pub id: String,
    pub pair: Pair,
    pub state: SwapState,
    #[serde(default)]
    pub error: String,
    pub created_at: u64,
    pub accept_zero_conf: bool,
    pub preimage: HexBytes,
    pub is_auto: bool,
    pub service_fee_percent: Percentage,
    pub tenant_id: Id,
    pub from_data: ChainSwapData,
    pub to_data: ChainSwapData,
}

impl ChainSwap {
    pub fn is_refundable(&self, height: u32) -> bool {
        let data = &self.from_data;
        !data.lockup_transaction_id.is_empty()
            && data.transaction_id.is_empty()
            && (self.state.is_failed()
                || (self.state != SwapState::Successful && data.timeout_block_height < height))
    }

    pub fn is_claimable(&self) -> bool {
        !self.to_data.lockup_transaction_id.is_empty()
            && self.to_data.transaction_id.is_empty()
            && self.state != SwapState::Refunded
    }
}

/// Arguments of a submarine swap.
#[derive(Debug, Clone, Default)]
pub struct CreateSubmarineArgs {
    pub pair: Option<Pair>,
    /// BOLT11 invoice, lnurl, lightning address or BOLT12 offer.
    pub invoice: String,
    pub amount: u64,
    pub refund_address: String,
    pub send_from_internal: bool,
    pub wallet_id: Option<Id>,
    pub sat_per_vbyte: Option<f64>,
    pub accepted_pair: Option<SubmarinePair>,
    pub ignore_mrh: bool,
    pub tenant_id: Option<Id>,
}

/// Result of a submarine swap creation. Swaps short-circuited by a magic
/// routing hint have an empty `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmarineSwapInfo {
    pub id: String,
    pub bip21: String,
    pub address: String,
    pub expected_amount: u64,
    pub timeout_block_height: u32,
    pub timeout_hours: f64,
    pub tx_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct CreateReverseArgs {
    pub pair: Option<Pair>,
    pub amount: u64,
    pub claim_address: String,
    pub wallet_id: Option<Id>,
    /// Defaults to true without a lightning node.
    pub external_pay: Option<bool>,
    pub accept_zero_conf: bool,
    pub accepted_pair: Option<ReversePair>,
    pub description: String,
    pub description_hash: Vec<u8>,
    pub invoice_expiry: u64,
    pub add_magic_routing_hint: bool,
    pub tenant_id: Option<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseSwapInfo {
    pub id: String,
    pub lockup_address: String,
    pub invoice: String,
    pub timeout_block_height: u32,
    pub onchain_amount: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateChainArgs {
    pub pair: Option<Pair>,
    pub amount: u64,
    pub from_wallet_id: Option<Id>,
    pub to_wallet_id: Option<Id>,
    pub to_address: String,
    pub refund_address: String,
    pub external_pay: bool,
    pub accept_zero_conf: bool,
    pub sat_per_vbyte: Option<f64>,
    pub accepted_pair: Option<ChainPair>,
    pub tenant_id: Option<Id>,
}
