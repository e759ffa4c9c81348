//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every data-source call with a deadline
//! - Surface the deadline as a distinct error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use crate::chain::types::{ChainError, ChainResult};

/// Run `fut` with a deadline, mapping elapsed time to [`ChainError::Timeout`].
pub async fn with_timeout<T, Fut>(duration: Duration, fut: Fut) -> ChainResult<T>
where
    Fut: Future<Output = ChainResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout(duration.as_secs())),
    }
}
