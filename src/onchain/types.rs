//! Onchain request/result types and errors.

use thiserror::Error;

use crate::chain::types::{ChainError, Currency};
use crate::onchain::transaction::ChainTransaction;
use crate::onchain::wallet::WalletError;

/// Locate a payment inside a named transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArgs {
    pub transaction_id: String,
    pub currency: Currency,
    pub address: String,
    pub blinding_key: Option<Vec<u8>>,
    /// Zero disables the amount check.
    pub expected_amount: u64,
    pub require_confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct OutputResult {
    pub transaction: ChainTransaction,
    pub vout: u32,
    pub value: u64,
}

#[derive(Debug, Error)]
pub enum OnchainError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("empty transaction id")]
    EmptyTransactionId,

    #[error("could not decode transaction: {0}")]
    Decode(String),

    #[error("could not fetch input tx: {0}")]
    InputFetch(String),

    #[error("could not find fee output")]
    NoFeeOutput,

    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid blinding key: {0}")]
    InvalidBlindingKey(String),

    #[error("could not find output paying to {0}")]
    OutputNotFound(String),

    #[error("locked up less onchain coins than expected: {value} < {expected}")]
    AmountTooLow { value: u64, expected: u64 },

    #[error("lockup transaction not confirmed")]
    NotConfirmed,

    #[error("no onchain support for {0}")]
    CurrencyNotConfigured(Currency),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl OnchainError {
    /// Whether the underlying capability is missing rather than broken.
    pub fn is_unsupported(&self) -> bool {
        match self {
            OnchainError::Chain(e) => e.is_unsupported(),
            OnchainError::Wallet(e) => e.is_unsupported(),
            _ => false,
        }
    }
}

pub type OnchainResult<T> = Result<T, OnchainError>;
