//! Block-explorer data source speaking the Esplora REST API.
//!
//! # Responsibilities
//! - Query tip height, transaction hex and status, address UTXOs
//! - Broadcast raw transactions
//! - Estimate fees when the instance also serves the mempool fee API
//!
//! # Design Decisions
//! - One shared `reqwest::Client` per source with a hard 10 s timeout
//! - Non-2xx answers carry the response body into the error; a 404 maps to
//!   [`ChainError::NotFound`] so lookups can be retried

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::chain::source::ChainDataSource;
use crate::chain::types::{ChainError, ChainResult, Output};

/// HTTP timeout for every explorer request.
pub const ESPLORA_TIMEOUT: Duration = Duration::from_secs(10);

/// API dialect of the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EsploraFlavour {
    /// Plain Esplora: no fee recommendation endpoint.
    #[default]
    Esplora,
    /// mempool.space compatible: adds `/v1/fees/recommended`.
    Mempool,
}

#[derive(Debug, Deserialize)]
struct TxStatus {
    confirmed: bool,
}

#[derive(Debug, Deserialize)]
struct Utxo {
    txid: String,
    // Confidential outputs only expose a commitment.
    #[serde(default)]
    value: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedFees {
    half_hour_fee: f64,
}

/// Esplora / mempool explorer client.
#[derive(Debug, Clone)]
pub struct EsploraSource {
    client: reqwest::Client,
    base_url: String,
    flavour: EsploraFlavour,
}

impl EsploraSource {
    /// Create a new explorer source.
    pub fn new(base_url: &str, flavour: EsploraFlavour) -> ChainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(ESPLORA_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Http(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            flavour,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(response: reqwest::Response) -> ChainResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ChainError::NotFound(format!("{}: {}", url, body.trim())));
        }
        Err(ChainError::Http(format!("{} returned {}: {}", url, status, body.trim())))
    }

    async fn get_text(&self, path: &str) -> ChainResult<String> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Ok(Self::check(response).await?.text().await?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ChainResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::check(response)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChainDataSource for EsploraSource {
    async fn estimate_fee(&self) -> ChainResult<f64> {
        match self.flavour {
            EsploraFlavour::Esplora => Err(ChainError::Unsupported(format!(
                "fee estimation on {}",
                self.base_url
            ))),
            EsploraFlavour::Mempool => {
                let fees: RecommendedFees = self.get_json("/v1/fees/recommended").await?;
                Ok(fees.half_hour_fee)
            }
        }
    }

    async fn block_height(&self) -> ChainResult<u32> {
        let text = self.get_text("/blocks/tip/height").await?;
        text.trim()
            .parse()
            .map_err(|e| ChainError::InvalidResponse(format!("block height {:?}: {}", text, e)))
    }

    async fn is_confirmed(&self, tx_id: &str) -> ChainResult<bool> {
        let status: TxStatus = self.get_json(&format!("/tx/{}/status", tx_id)).await?;
        Ok(status.confirmed)
    }

    async fn raw_transaction(&self, tx_id: &str) -> ChainResult<String> {
        Ok(self.get_text(&format!("/tx/{}/hex", tx_id)).await?.trim().to_string())
    }

    async fn unspent_outputs(&self, address: &str) -> ChainResult<Vec<Output>> {
        let utxos: Vec<Utxo> = self.get_json(&format!("/address/{}/utxo", address)).await?;
        Ok(utxos
            .into_iter()
            .map(|utxo| Output {
                tx_id: utxo.txid,
                value: utxo.value.unwrap_or_default(),
            })
            .collect())
    }

    async fn broadcast(&self, tx_hex: &str) -> ChainResult<String> {
        let response = self
            .client
            .post(format!("{}/tx", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(tx_hex.to_string())
            .send()
            .await?;
        Ok(Self::check(response).await?.text().await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let source = EsploraSource::new("https://blockstream.info/api/", EsploraFlavour::Esplora).unwrap();
        assert_eq!(source.base_url(), "https://blockstream.info/api");
    }

    #[tokio::test]
    async fn test_plain_esplora_has_no_fee_endpoint() {
        let source = EsploraSource::new("http://127.0.0.1:1", EsploraFlavour::Esplora).unwrap();
        let err = source.estimate_fee().await.unwrap_err();
        assert!(err.is_unsupported());
    }

    #[tokio::test]
    async fn test_unreachable_source_errors() {
        // Nothing listens on port 1.
        let source = EsploraSource::new("http://127.0.0.1:1", EsploraFlavour::Mempool).unwrap();
        assert!(source.block_height().await.is_err());
    }
}
