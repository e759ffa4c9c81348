//! Data source backed by the counterparty's own chain API.
//!
//! Used as the fallback of last resort: the aggregator never lets it decide
//! confirmations or heights on its own while a primary source answers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::source::ChainDataSource;
use crate::chain::types::{ChainError, ChainResult, Currency};
use crate::counterparty::{CounterpartyApi, CounterpartyError};

pub struct CounterpartySource {
    api: Arc<dyn CounterpartyApi>,
    currency: Currency,
}

impl CounterpartySource {
    pub fn new(api: Arc<dyn CounterpartyApi>, currency: Currency) -> Self {
        Self { api, currency }
    }
}

impl From<CounterpartyError> for ChainError {
    fn from(e: CounterpartyError) -> Self {
        match e {
            CounterpartyError::Http(msg) => ChainError::Http(msg),
            other => ChainError::InvalidResponse(other.to_string()),
        }
    }
}

#[async_trait]
impl ChainDataSource for CounterpartySource {
    async fn estimate_fee(&self) -> ChainResult<f64> {
        Ok(self.api.fee_estimation(self.currency).await?)
    }

    async fn block_height(&self) -> ChainResult<u32> {
        Ok(self.api.block_height(self.currency).await?)
    }

    async fn is_confirmed(&self, tx_id: &str) -> ChainResult<bool> {
        let details = self
            .api
            .transaction_details(self.currency, tx_id.to_string())
            .await?;
        Ok(details.confirmations > 0)
    }

    async fn raw_transaction(&self, tx_id: &str) -> ChainResult<String> {
        let details = self
            .api
            .transaction_details(self.currency, tx_id.to_string())
            .await?;
        Ok(details.hex)
    }

    async fn broadcast(&self, tx_hex: &str) -> ChainResult<String> {
        Ok(self
            .api
            .broadcast_transaction(self.currency, tx_hex.to_string())
            .await?)
    }
}
