//! Contract of the swap counterparty.

use async_trait::async_trait;

use crate::chain::types::Currency;
use crate::counterparty::types::{
    ChainPairs, ChainRequest, ChainResponse, CounterpartyResult, CreateReverseSwapRequest,
    CreateReverseSwapResponse, CreateSwapRequest, CreateSwapResponse, ReverseBip21, ReversePairs,
    SubmarinePairs, TransactionDetails,
};

/// Everything the client asks of the counterparty service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterpartyApi: Send + Sync {
    async fn submarine_pairs(&self) -> CounterpartyResult<SubmarinePairs>;

    async fn reverse_pairs(&self) -> CounterpartyResult<ReversePairs>;

    async fn chain_pairs(&self) -> CounterpartyResult<ChainPairs>;

    async fn create_swap(&self, request: CreateSwapRequest) -> CounterpartyResult<CreateSwapResponse>;

    async fn create_reverse_swap(
        &self,
        request: CreateReverseSwapRequest,
    ) -> CounterpartyResult<CreateReverseSwapResponse>;

    async fn create_chain_swap(&self, request: ChainRequest) -> CounterpartyResult<ChainResponse>;

    /// BIP21 the counterparty published for an invoice carrying a magic
    /// routing hint.
    async fn reverse_bip21(&self, invoice: String) -> CounterpartyResult<ReverseBip21>;

    /// Fetch a BOLT12 invoice for `offer`.
    async fn fetch_bolt12_invoice(&self, offer: String, amount: u64) -> CounterpartyResult<String>;

    async fn transaction_details(
        &self,
        currency: Currency,
        tx_id: String,
    ) -> CounterpartyResult<TransactionDetails>;

    async fn broadcast_transaction(&self, currency: Currency, tx_hex: String) -> CounterpartyResult<String>;

    async fn fee_estimation(&self, currency: Currency) -> CounterpartyResult<f64>;

    async fn block_height(&self, currency: Currency) -> CounterpartyResult<u32>;
}
