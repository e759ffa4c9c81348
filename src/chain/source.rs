//! The capability contract every chain data source implements.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::chain::types::{ChainError, ChainResult, Output};

/// Independent view on one ledger.
///
/// Each operation stands alone: none may assume another one succeeded
/// before it. Capabilities a source lacks answer with
/// [`ChainError::Unsupported`], which the default bodies do.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Fee rate in sat/vbyte.
    async fn estimate_fee(&self) -> ChainResult<f64> {
        Err(ChainError::Unsupported("fee estimation".to_string()))
    }

    /// Current tip height.
    async fn block_height(&self) -> ChainResult<u32>;

    /// Whether the transaction has at least one confirmation.
    async fn is_confirmed(&self, tx_id: &str) -> ChainResult<bool>;

    /// Hex-encoded raw transaction.
    async fn raw_transaction(&self, tx_id: &str) -> ChainResult<String>;

    /// Unspent outputs paying to `address`.
    async fn unspent_outputs(&self, _address: &str) -> ChainResult<Vec<Output>> {
        Err(ChainError::Unsupported("unspent outputs".to_string()))
    }

    /// Broadcast a hex-encoded transaction, returning its id.
    async fn broadcast(&self, tx_hex: &str) -> ChainResult<String>;

    /// Release any held connections.
    async fn disconnect(&self) {}
}

/// A source together with the label used in logs, metrics and errors.
#[derive(Clone)]
pub struct NamedSource {
    pub name: String,
    pub source: Arc<dyn ChainDataSource>,
}

impl NamedSource {
    pub fn new(name: impl Into<String>, source: Arc<dyn ChainDataSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

impl fmt::Debug for NamedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSource").field("name", &self.name).finish()
    }
}
