//! HTTP client for the counterparty's REST API.
//!
//! # Responsibilities
//! - Fetch pair quotes and create swaps
//! - Serve chain lookups used by the fallback data source
//! - Surface the API's `error` field as [`CounterpartyError::Api`]

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::chain::types::Currency;
use crate::counterparty::api::CounterpartyApi;
use crate::counterparty::types::{
    ChainPairs, ChainRequest, ChainResponse, CounterpartyError, CounterpartyResult,
    CreateReverseSwapRequest, CreateReverseSwapResponse, CreateSwapRequest, CreateSwapResponse,
    ReverseBip21, ReversePairs, SubmarinePairs, TransactionDetails,
};

#[derive(Debug, Serialize)]
struct Bolt12FetchRequest<'a> {
    offer: &'a str,
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct Bolt12FetchResponse {
    invoice: String,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest<'a> {
    hex: &'a str,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FeeResponse {
    fee: f64,
}

/// reqwest-backed [`CounterpartyApi`].
#[derive(Debug, Clone)]
pub struct HttpCounterparty {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCounterparty {
    /// Create a client for the API rooted at `base_url` (without the `/v2`
    /// prefix).
    pub fn new(base_url: &str, timeout: Duration) -> CounterpartyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CounterpartyError::Http(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> CounterpartyResult<T> {
        let status = response.status();
        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CounterpartyError::Decode(format!("status {}: {}", status, e)))?;

        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return Err(CounterpartyError::Api(error.to_string()));
        }
        if !status.is_success() {
            return Err(CounterpartyError::Http(format!("unexpected status {}", status)));
        }
        serde_json::from_value(value).map_err(|e| CounterpartyError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> CounterpartyResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> CounterpartyResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl CounterpartyApi for HttpCounterparty {
    async fn submarine_pairs(&self) -> CounterpartyResult<SubmarinePairs> {
        self.get("/swap/submarine").await
    }

    async fn reverse_pairs(&self) -> CounterpartyResult<ReversePairs> {
        self.get("/swap/reverse").await
    }

    async fn chain_pairs(&self) -> CounterpartyResult<ChainPairs> {
        self.get("/swap/chain").await
    }

    async fn create_swap(&self, request: CreateSwapRequest) -> CounterpartyResult<CreateSwapResponse> {
        self.post("/swap/submarine", &request).await
    }

    async fn create_reverse_swap(
        &self,
        request: CreateReverseSwapRequest,
    ) -> CounterpartyResult<CreateReverseSwapResponse> {
        self.post("/swap/reverse", &request).await
    }

    async fn create_chain_swap(&self, request: ChainRequest) -> CounterpartyResult<ChainResponse> {
        self.post("/swap/chain", &request).await
    }

    async fn reverse_bip21(&self, invoice: String) -> CounterpartyResult<ReverseBip21> {
        self.get(&format!("/swap/reverse/{}/bip21", invoice)).await
    }

    async fn fetch_bolt12_invoice(&self, offer: String, amount: u64) -> CounterpartyResult<String> {
        let response: Bolt12FetchResponse = self
            .post(
                "/lightning/BTC/bolt12/fetch",
                &Bolt12FetchRequest { offer: &offer, amount },
            )
            .await?;
        Ok(response.invoice)
    }

    async fn transaction_details(
        &self,
        currency: Currency,
        tx_id: String,
    ) -> CounterpartyResult<TransactionDetails> {
        self.get(&format!("/chain/{}/transaction/{}", currency, tx_id)).await
    }

    async fn broadcast_transaction(&self, currency: Currency, tx_hex: String) -> CounterpartyResult<String> {
        let response: BroadcastResponse = self
            .post(
                &format!("/chain/{}/transaction", currency),
                &BroadcastRequest { hex: &tx_hex },
            )
            .await?;
        Ok(response.id)
    }

    async fn fee_estimation(&self, currency: Currency) -> CounterpartyResult<f64> {
        let response: FeeResponse = self.get(&format!("/chain/{}/fee", currency)).await?;
        Ok(response.fee)
    }

    async fn block_height(&self, currency: Currency) -> CounterpartyResult<u32> {
        let heights: HashMap<Currency, u32> = self.get("/chain/heights").await?;
        heights
            .get(&currency)
            .copied()
            .ok_or_else(|| CounterpartyError::Decode(format!("no height for {}", currency)))
    }
}
