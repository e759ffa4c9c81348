//! Lightning invoices: BOLT11 decoding, magic routing hints, BIP21 and
//! LNURL resolution.

use async_trait::async_trait;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{schnorr, Message, PublicKey, Secp256k1};
use lightning_invoice::Bolt11Invoice;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::chain::types::Network;

/// Short channel id marking a magic routing hint.
pub const MAGIC_ROUTING_HINT_SCID: u64 = 596385002596073472;

const SATS_PER_BTC: f64 = 100_000_000.0;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invalid invoice: {0}")]
    Invalid(String),

    #[error("invoice is for {actual} but the client runs on {expected}")]
    WrongNetwork { expected: String, actual: String },

    #[error("invalid bip21: {0}")]
    InvalidBip21(String),

    #[error("invalid reverse swap bip21 signature")]
    InvalidBip21Signature,

    #[error("bip21 amount is higher than invoice amount")]
    Bip21AmountTooHigh,

    #[error("invalid lnurl: {0}")]
    InvalidLnurl(String),

    #[error("lnurl is not pay, but: {0}")]
    NotPayRequest(String),

    #[error("lnurl request failed: {0}")]
    Lnurl(String),

    #[error("bolt12 invoices are not supported: {0}")]
    Bolt12Unsupported(String),

    #[error("lightning node error: {0}")]
    Node(String),
}

pub type InvoiceResult<T> = Result<T, InvoiceError>;

/// What the orchestrator needs to know about an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInvoice {
    pub amount_sat: u64,
    pub payment_hash: [u8; 32],
    /// Unix timestamp.
    pub expiry: u64,
    pub magic_routing_hint: Option<PublicKey>,
}

/// Decode a BOLT11 invoice issued for `network`.
pub fn decode_bolt11(invoice: &str, network: Network) -> InvoiceResult<DecodedInvoice> {
    let parsed = Bolt11Invoice::from_str(invoice.trim()).map_err(|e| InvoiceError::Invalid(e.to_string()))?;

    let expected = lightning_invoice::Currency::from(network.bitcoin());
    if parsed.currency() != expected {
        return Err(InvoiceError::WrongNetwork {
            expected: format!("{:?}", expected),
            actual: format!("{:?}", parsed.currency()),
        });
    }

    let magic_routing_hint = parsed
        .route_hints()
        .iter()
        .flat_map(|hint| hint.0.iter())
        .find(|hop| hop.short_channel_id == MAGIC_ROUTING_HINT_SCID)
        .map(|hop| hop.src_node_id);

    Ok(DecodedInvoice {
        amount_sat: parsed.amount_milli_satoshis().unwrap_or_default() / 1000,
        payment_hash: parsed.payment_hash().to_byte_array(),
        expiry: parsed
            .duration_since_epoch()
            .saturating_add(parsed.expiry_time())
            .as_secs(),
        magic_routing_hint,
    })
}

/// BOLT12 offers use the `lno` prefix.
pub fn is_offer(invoice: &str) -> bool {
    invoice.trim().to_lowercase().starts_with("lno1")
}

/// LNURL bech32 strings and lightning addresses.
pub fn is_lnurl(invoice: &str) -> bool {
    let lower = invoice.trim().to_lowercase();
    let lower = lower.strip_prefix("lightning:").unwrap_or(&lower);
    lower.starts_with("lnurl1") || is_lightning_address(lower)
}

fn is_lightning_address(value: &str) -> bool {
    match value.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

/// A parsed `bitcoin:` or `liquidnetwork:` URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Bip21 {
    pub address: String,
    /// In satoshis.
    pub amount: u64,
}

pub fn parse_bip21(bip21: &str) -> InvoiceResult<Bip21> {
    let parsed = url::Url::parse(bip21).map_err(|e| InvoiceError::InvalidBip21(e.to_string()))?;
    let address = parsed.path().to_string();
    if address.is_empty() {
        return Err(InvoiceError::InvalidBip21("missing address".to_string()));
    }
    let amount = parsed
        .query_pairs()
        .find(|(key, _)| key == "amount")
        .ok_or_else(|| InvoiceError::InvalidBip21("missing bip21 amount".to_string()))?
        .1
        .parse::<f64>()
        .map_err(|e| InvoiceError::InvalidBip21(format!("could not parse bip21 amount: {}", e)))?;
    Ok(Bip21 {
        address,
        amount: (amount * SATS_PER_BTC).round() as u64,
    })
}

/// Check the counterparty's signature over `sha256(address)` and that it
/// does not ask for more than the invoice is worth.
pub fn verify_reverse_bip21(
    bip21: &str,
    signature: &[u8],
    hint_key: &PublicKey,
    invoice_amount: u64,
) -> InvoiceResult<Bip21> {
    let parsed = parse_bip21(bip21)?;
    let signature = schnorr::Signature::from_slice(signature).map_err(|_| InvoiceError::InvalidBip21Signature)?;
    let digest = sha256::Hash::hash(parsed.address.as_bytes());
    Secp256k1::verification_only()
        .verify_schnorr(
            &signature,
            &Message::from_digest(digest.to_byte_array()),
            &hint_key.x_only_public_key().0,
        )
        .map_err(|_| InvoiceError::InvalidBip21Signature)?;

    if parsed.amount > invoice_amount {
        return Err(InvoiceError::Bip21AmountTooHigh);
    }
    Ok(parsed)
}

/// Turns payment codes other than BOLT11 into invoices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceResolver: Send + Sync {
    /// Fetch a BOLT11 invoice for `amount_sat` over LNURL-pay.
    async fn resolve_lnurl(&self, lnurl: &str, amount_sat: u64) -> InvoiceResult<String>;

    /// Decode a BOLT12 invoice fetched for `offer`, making sure it belongs
    /// to that offer.
    fn decode_bolt12(&self, invoice: &str, offer: &str) -> InvoiceResult<DecodedInvoice>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInvoice {
    pub payment_request: String,
    pub payment_hash: [u8; 32],
}

/// An attached lightning node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LightningNode: Send + Sync {
    fn ready(&self) -> bool;

    async fn create_invoice(
        &self,
        amount_sat: u64,
        memo: String,
        expiry_secs: u64,
    ) -> InvoiceResult<CreatedInvoice>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayParams {
    #[serde(default)]
    tag: String,
    #[serde(default)]
    callback: String,
    #[serde(default)]
    min_sendable: u64,
    #[serde(default)]
    max_sendable: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct PayValues {
    #[serde(default)]
    pr: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: String,
}

/// LNURL-pay over HTTP. BOLT12 needs a node-side decoder and is refused.
pub struct LnurlResolver {
    client: reqwest::Client,
}

impl LnurlResolver {
    pub fn new(timeout: Duration) -> InvoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvoiceError::Lnurl(e.to_string()))?;
        Ok(Self { client })
    }

    /// Endpoint behind a bech32 LNURL or a lightning address.
    pub fn endpoint(lnurl: &str) -> InvoiceResult<String> {
        let lower = lnurl.trim().to_lowercase();
        let lower = lower.strip_prefix("lightning:").unwrap_or(&lower);
        if let Some((user, domain)) = lower.split_once('@') {
            if !is_lightning_address(lower) {
                return Err(InvoiceError::InvalidLnurl(lnurl.to_string()));
            }
            return Ok(format!("https://{}/.well-known/lnurlp/{}", domain, user));
        }
        let (_, data) =
            bitcoin::bech32::decode(lower).map_err(|e| InvoiceError::InvalidLnurl(e.to_string()))?;
        String::from_utf8(data).map_err(|e| InvoiceError::InvalidLnurl(e.to_string()))
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> InvoiceResult<T> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| InvoiceError::Lnurl(e.to_string()))?
            .json()
            .await
            .map_err(|e| InvoiceError::Lnurl(e.to_string()))
    }
}

#[async_trait]
impl InvoiceResolver for LnurlResolver {
    async fn resolve_lnurl(&self, lnurl: &str, amount_sat: u64) -> InvoiceResult<String> {
        let endpoint = Self::endpoint(lnurl)?;
        tracing::info!(lnurl = %lnurl, "Fetching invoice for LNURL");

        let params: PayParams = self.get(&endpoint).await?;
        if params.status.eq_ignore_ascii_case("error") {
            return Err(InvoiceError::Lnurl(params.reason));
        }
        if params.tag != "payRequest" {
            return Err(InvoiceError::NotPayRequest(params.tag));
        }
        let amount_msat = amount_sat * 1000;
        if amount_msat < params.min_sendable || (params.max_sendable > 0 && amount_msat > params.max_sendable) {
            return Err(InvoiceError::Lnurl(format!(
                "amount {} msat outside of {}..{}",
                amount_msat, params.min_sendable, params.max_sendable
            )));
        }

        let mut callback =
            url::Url::parse(&params.callback).map_err(|e| InvoiceError::InvalidLnurl(e.to_string()))?;
        callback
            .query_pairs_mut()
            .append_pair("amount", &amount_msat.to_string());
        let values: PayValues = self.get(callback.as_str()).await?;
        if values.status.eq_ignore_ascii_case("error") || values.pr.is_empty() {
            return Err(InvoiceError::Lnurl(values.reason));
        }
        Ok(values.pr)
    }

    fn decode_bolt12(&self, _invoice: &str, offer: &str) -> InvoiceResult<DecodedInvoice> {
        Err(InvoiceError::Bolt12Unsupported(offer.to_string()))
    }
}
