//! Handoff of persisted swaps to whatever drives them to completion.

use async_trait::async_trait;
use thiserror::Error;

use crate::swap::types::{ChainSwap, ReverseSwap, SubmarineSwap};

#[derive(Debug, Error)]
#[error("could not register swap: {0}")]
pub struct LifecycleError(pub String);

/// Watches registered swaps and claims or refunds them. Registration must
/// be idempotent for a given id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleManager: Send + Sync {
    async fn register_swap(&self, swap: SubmarineSwap) -> Result<(), LifecycleError>;

    async fn register_reverse_swap(&self, swap: ReverseSwap) -> Result<(), LifecycleError>;

    async fn register_chain_swap(&self, swap: ChainSwap) -> Result<(), LifecycleError>;
}
