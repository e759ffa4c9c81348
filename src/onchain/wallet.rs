//! Wallet contract consumed by the coordinator and the swap orchestrator.
//!
//! Concrete wallet backends live outside this crate; they only need to
//! implement [`Wallet`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::types::Currency;

/// Database identifier of wallets and tenants.
pub type Id = i64;

/// Identity of a registered wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub id: Id,
    pub name: String,
    pub currency: Currency,
    pub readonly: bool,
    pub tenant_id: Id,
}

/// Wallet balance in satoshis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: u64,
    pub confirmed: u64,
    pub unconfirmed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSendArgs {
    pub address: String,
    pub amount: u64,
    pub sat_per_vbyte: f64,
    pub send_all: bool,
}

/// Filter for looking up registered wallets. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletChecker {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub currency: Option<Currency>,
    pub allow_readonly: bool,
    pub tenant_id: Option<Id>,
}

impl WalletChecker {
    pub fn by_id(id: Id) -> Self {
        Self {
            id: Some(id),
            allow_readonly: true,
            ..Default::default()
        }
    }

    pub fn allows(&self, info: &WalletInfo) -> bool {
        self.id.map_or(true, |id| id == info.id)
            && self.name.as_ref().map_or(true, |name| *name == info.name)
            && self.currency.map_or(true, |currency| currency == info.currency)
            && self.tenant_id.map_or(true, |tenant| tenant == info.tenant_id)
            && (self.allow_readonly || !info.readonly)
    }
}

impl std::fmt::Display for WalletChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = self.id {
            parts.push(format!("id {}", id));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name {}", name));
        }
        if let Some(currency) = self.currency {
            parts.push(format!("currency {}", currency));
        }
        if !self.allow_readonly {
            parts.push("not readonly".to_string());
        }
        f.write_str(&parts.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    /// The backend cannot do this (e.g. fee estimation on a watch-only wallet).
    #[error("wallet operation not supported: {0}")]
    Unsupported(String),

    #[error("wallet {name} has insufficient balance for sending {amount} sats")]
    InsufficientBalance { name: String, amount: u64 },

    #[error("wallet backend error: {0}")]
    Backend(String),

    #[error("no wallet matching {0}")]
    NotFound(String),
}

impl WalletError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, WalletError::Unsupported(_))
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

/// A wallet backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    fn info(&self) -> WalletInfo;

    /// Whether the wallet finished syncing and can be used.
    fn ready(&self) -> bool;

    async fn new_address(&self) -> WalletResult<String>;

    /// Send coins, returning the transaction id.
    async fn send_to_address(&self, args: WalletSendArgs) -> WalletResult<String>;

    async fn balance(&self) -> WalletResult<Balance>;

    /// Amount that would be sent and the fee it would cost.
    async fn send_fee(&self, args: WalletSendArgs) -> WalletResult<(u64, u64)>;

    async fn disconnect(&self) -> WalletResult<()>;
}
