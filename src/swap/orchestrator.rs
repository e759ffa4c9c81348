//! Swap creation.
//!
//! Every flow has the same shape: issue keys, accept a quote, ask the
//! counterparty, rebuild and verify everything it answered, persist,
//! register with the lifecycle manager and optionally fund the lockup from
//! an internal wallet. Nothing the counterparty says is trusted until the
//! swap tree, the lockup address and the amounts check out locally.

use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{Keypair, Message, PublicKey, Secp256k1, SecretKey};
use rand::RngCore;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::chain::types::{Currency, Network, Pair};
use crate::counterparty::api::CounterpartyApi;
use crate::counterparty::types::{
    find_pair, ChainRequest, ChainSwapData as ChainSwapDetails, CounterpartyError, CreateReverseSwapRequest,
    CreateSwapRequest, HexBytes,
};
use crate::observability::metrics;
use crate::onchain::manager::Onchain;
use crate::onchain::types::OnchainError;
use crate::onchain::wallet::{Wallet, WalletChecker, WalletError, WalletSendArgs};
use crate::swap::fees::{
    calculate_fee_estimate, calculate_swap_quote, check_amounts, required_estimations, FeeError, FeeEstimations,
    SwapFees, SwapQuote,
};
use crate::swap::invoice::{
    decode_bolt11, is_lnurl, is_offer, verify_reverse_bip21, DecodedInvoice, InvoiceError, InvoiceResolver,
    LightningNode,
};
use crate::swap::keys::{KeyError, KeyIssuer};
use crate::swap::lifecycle::{LifecycleError, LifecycleManager};
use crate::swap::store::{StoreError, SwapStore};
use crate::swap::tree::{parse_public_key, SwapTree, TreeError, TreeRole};
use crate::swap::types::{
    now_secs, ChainSwap, ChainSwapData, CreateChainArgs, CreateReverseArgs, CreateSubmarineArgs, ReverseSwap,
    ReverseSwapInfo, SubmarineSwap, SubmarineSwapInfo, SwapState, SwapType, DEFAULT_TENANT_ID,
};

#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Counterparty(#[from] CounterpartyError),

    #[error(transparent)]
    Onchain(#[from] OnchainError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Fee(#[from] FeeError),

    #[error(transparent)]
    Invoice(#[from] InvoiceError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("could not fetch bolt12 invoice: {0}")]
    Bolt12(CounterpartyError),

    #[error("could not get reverse swap bip21: {0}")]
    Bip21(CounterpartyError),

    #[error("invalid {kind} address {address}: {reason}")]
    InvalidAddress {
        kind: &'static str,
        address: String,
        reason: String,
    },

    /// The counterparty answered with something that does not match what
    /// we asked for.
    #[error("{0}")]
    InvalidResponse(String),

    #[error("{0}")]
    InvalidArgument(String),
}

impl SwapError {
    fn argument(message: impl Into<String>) -> Self {
        SwapError::InvalidArgument(message.into())
    }
}

pub type SwapResult<T> = Result<T, SwapError>;

/// Pair used when a request does not name one.
pub fn default_pair(swap_type: SwapType) -> Pair {
    match swap_type {
        SwapType::Submarine | SwapType::Reverse => Pair::new(Currency::Btc, Currency::Btc),
        SwapType::Chain => Pair::new(Currency::Btc, Currency::Liquid),
    }
}

/// Fresh random preimage and its SHA256.
pub fn new_preimage() -> (Vec<u8>, [u8; 32]) {
    let mut preimage = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut preimage);
    (preimage.to_vec(), sha256::Hash::hash(&preimage).to_byte_array())
}

/// Check that `address` is a valid address of `currency` on `network`.
pub fn validate_address(network: Network, currency: Currency, address: &str, kind: &'static str) -> SwapResult<()> {
    let invalid = |reason: String| SwapError::InvalidAddress {
        kind,
        address: address.to_string(),
        reason,
    };
    match currency {
        Currency::Btc => {
            bitcoin::Address::from_str(address)
                .map_err(|e| invalid(e.to_string()))?
                .require_network(network.bitcoin())
                .map_err(|e| invalid(e.to_string()))?;
        }
        Currency::Liquid => {
            elements::Address::parse_with_params(address, network.liquid()).map_err(|e| invalid(e.to_string()))?;
        }
    }
    Ok(())
}

fn public_key(secret: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(&Secp256k1::new(), secret)
}

fn compressed(secret: &SecretKey) -> HexBytes {
    HexBytes(public_key(secret).serialize().to_vec())
}

/// Blinding key of a Liquid lockup. BTC lockups have none.
fn blinding_key(currency: Currency, key: &HexBytes) -> SwapResult<Option<SecretKey>> {
    if currency != Currency::Liquid {
        return Ok(None);
    }
    SecretKey::from_slice(key.as_slice())
        .map(Some)
        .map_err(|e| SwapError::InvalidResponse(format!("invalid blinding key: {}", e)))
}

/// Wraps a verification error, counting it before it is returned.
fn verification<E: Into<SwapError>>(swap_type: SwapType) -> impl FnOnce(E) -> SwapError {
    move |e| {
        let e = e.into();
        metrics::record_verification_failure(swap_type.as_str());
        tracing::warn!(swap_type = %swap_type, error = %e, "Counterparty response failed verification");
        e
    }
}

/// A verified magic routing hint: pay `address` directly instead of
/// creating a swap.
struct MagicRoutingHint {
    bip21: String,
    address: String,
    amount: u64,
}

pub struct SwapOrchestrator {
    onchain: Arc<Onchain>,
    counterparty: Arc<dyn CounterpartyApi>,
    store: Arc<dyn SwapStore>,
    keys: KeyIssuer,
    lifecycle: Arc<dyn LifecycleManager>,
    lightning: Option<Arc<dyn LightningNode>>,
    resolver: Option<Arc<dyn InvoiceResolver>>,
    referral_id: String,
}

impl SwapOrchestrator {
    pub fn new(
        onchain: Arc<Onchain>,
        counterparty: Arc<dyn CounterpartyApi>,
        store: Arc<dyn SwapStore>,
        lifecycle: Arc<dyn LifecycleManager>,
    ) -> Self {
        Self {
            onchain,
            counterparty,
            keys: KeyIssuer::new(store.clone()),
            store,
            lifecycle,
            lightning: None,
            resolver: None,
            referral_id: String::new(),
        }
    }

    pub fn with_lightning(mut self, node: Arc<dyn LightningNode>) -> Self {
        self.lightning = Some(node);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn InvoiceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_referral_id(mut self, referral_id: impl Into<String>) -> Self {
        self.referral_id = referral_id.into();
        self
    }

    pub fn keys(&self) -> &KeyIssuer {
        &self.keys
    }

    fn network(&self) -> Network {
        self.onchain.network()
    }

    /// A lightning node is attached and synced.
    fn lightning(&self) -> Option<&Arc<dyn LightningNode>> {
        self.lightning.as_ref().filter(|node| node.ready())
    }

    /// Requested fee rate, or the coordinator's estimate.
    async fn fee_rate(&self, requested: Option<f64>, currency: Currency) -> SwapResult<f64> {
        match requested {
            Some(rate) => Ok(rate),
            None => Ok(self.onchain.estimate_fee(currency).await?),
        }
    }

    async fn fee_estimations(&self, swap_type: SwapType, pair: Pair) -> SwapResult<FeeEstimations> {
        let mut estimations = FeeEstimations::new();
        for currency in required_estimations(swap_type, pair) {
            estimations.insert(currency, self.onchain.estimate_fee(currency).await?);
        }
        Ok(estimations)
    }

    /// Make sure `wallet` can send `amount` at `sat_per_vbyte`.
    ///
    /// The send fee is computed against the network's dummy lockup address.
    /// Wallets that cannot compute send fees fall back to comparing their
    /// confirmed balance.
    pub async fn check_balance(&self, wallet: &dyn Wallet, amount: u64, sat_per_vbyte: f64) -> SwapResult<()> {
        let info = wallet.info();
        let args = WalletSendArgs {
            address: self.network().dummy_lockup_address(info.currency).to_string(),
            amount,
            sat_per_vbyte,
            send_all: false,
        };
        match wallet.send_fee(args).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unsupported() => {
                let balance = wallet.balance().await?;
                if balance.confirmed < amount {
                    return Err(WalletError::InsufficientBalance { name: info.name, amount }.into());
                }
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Quote a swap from either the amount sent or the amount received.
    pub async fn swap_quote(
        &self,
        swap_type: SwapType,
        pair: Pair,
        send_amount: u64,
        receive_amount: u64,
    ) -> SwapResult<SwapQuote> {
        let fees = match swap_type {
            SwapType::Submarine => SwapFees::from(&find_pair(pair, &self.counterparty.submarine_pairs().await?)?),
            SwapType::Reverse => SwapFees::from(&find_pair(pair, &self.counterparty.reverse_pairs().await?)?),
            SwapType::Chain => SwapFees::from(&find_pair(pair, &self.counterparty.chain_pairs().await?)?),
        };
        Ok(calculate_swap_quote(swap_type, send_amount, receive_amount, fees)?)
    }

    /// Turn lnurls and offers into an invoice and decode it.
    async fn resolve_invoice(&self, invoice: &str, amount: u64) -> SwapResult<(String, DecodedInvoice)> {
        if is_lnurl(invoice) {
            if amount == 0 {
                return Err(SwapError::argument("amount has to be specified for lnurl"));
            }
            let resolver = self
                .resolver
                .as_ref()
                .ok_or_else(|| SwapError::argument("lnurl resolution is not available"))?;
            let resolved = resolver.resolve_lnurl(invoice, amount).await?;
            let decoded = decode_bolt11(&resolved, self.network())?;
            return Ok((resolved, decoded));
        }
        if is_offer(invoice) {
            if amount == 0 {
                return Err(SwapError::argument("amount has to be specified for offer"));
            }
            let resolver = self
                .resolver
                .as_ref()
                .ok_or_else(|| SwapError::argument("offer resolution is not available"))?;
            let fetched = self
                .counterparty
                .fetch_bolt12_invoice(invoice.to_string(), amount)
                .await
                .map_err(SwapError::Bolt12)?;
            let decoded = resolver.decode_bolt12(&fetched, invoice)?;
            return Ok((fetched, decoded));
        }
        Ok((invoice.to_string(), decode_bolt11(invoice, self.network())?))
    }

    async fn check_magic_routing_hint(
        &self,
        invoice: &str,
        decoded: &DecodedInvoice,
    ) -> SwapResult<Option<MagicRoutingHint>> {
        let Some(hint_key) = decoded.magic_routing_hint else {
            return Ok(None);
        };
        let published = self
            .counterparty
            .reverse_bip21(invoice.to_string())
            .await
            .map_err(SwapError::Bip21)?;
        let bip21 = verify_reverse_bip21(&published.bip21, published.signature.as_slice(), &hint_key, decoded.amount_sat)
            .map_err(verification(SwapType::Submarine))?;
        tracing::info!(address = %bip21.address, amount = bip21.amount, "Found magic routing hint in invoice");
        Ok(Some(MagicRoutingHint {
            bip21: published.bip21,
            address: bip21.address,
            amount: bip21.amount,
        }))
    }

    async fn fund(&self, wallet: &dyn Wallet, address: &str, amount: u64, sat_per_vbyte: f64) -> SwapResult<String> {
        let tx_id = wallet
            .send_to_address(WalletSendArgs {
                address: address.to_string(),
                amount,
                sat_per_vbyte,
                send_all: false,
            })
            .await?;
        tracing::info!(wallet = %wallet.info().name, tx_id = %tx_id, amount, "Funded lockup address");
        Ok(tx_id)
    }

    /// Create a submarine swap: pay a lightning invoice with onchain coins.
    pub async fn create_swap(&self, args: CreateSubmarineArgs) -> SwapResult<SubmarineSwapInfo> {
        let pair = args.pair.unwrap_or_else(|| default_pair(SwapType::Submarine));
        let tenant_id = args.tenant_id.unwrap_or(DEFAULT_TENANT_ID);
        tracing::info!(pair = %pair, amount = args.amount, "Creating submarine swap");

        let private_key = self.keys.new_key().await?;
        let quote = match args.accepted_pair.clone() {
            Some(quote) => quote,
            None => find_pair(pair, &self.counterparty.submarine_pairs().await?)?,
        };

        let mut request = CreateSwapRequest {
            from: Some(pair.from),
            to: Some(pair.to),
            pair_hash: quote.hash.clone(),
            refund_public_key: compressed(&private_key),
            referral_id: self.referral_id.clone(),
            ..Default::default()
        };

        let mut amount = args.amount;
        let mut preimage = HexBytes::default();
        let preimage_hash: [u8; 32];
        let mut magic_routing_hint = None;

        if !args.invoice.is_empty() {
            let (invoice, decoded) = self.resolve_invoice(&args.invoice, amount).await?;
            if !args.ignore_mrh {
                magic_routing_hint = self.check_magic_routing_hint(&invoice, &decoded).await?;
            }
            if decoded.amount_sat == 0 {
                return Err(SwapError::argument("0 amount invoices are not supported"));
            }
            amount = decoded.amount_sat;
            preimage_hash = decoded.payment_hash;
            request.invoice = invoice;
        } else if let Some(node) = self.lightning().filter(|_| amount != 0) {
            let created = node
                .create_invoice(amount, format!("Send to {} address", pair.from), 0)
                .await?;
            preimage_hash = created.payment_hash;
            request.invoice = created.payment_request;
        } else if self.lightning().is_none() {
            return Err(SwapError::argument("invoice is required in standalone mode"));
        } else {
            if args.send_from_internal {
                return Err(SwapError::argument("cannot auto send if amount is 0"));
            }
            let (fresh, hash) = new_preimage();
            preimage = HexBytes(fresh);
            preimage_hash = hash;
            request.preimage_hash = HexBytes(hash.to_vec());
        }

        let funding = if args.send_from_internal {
            let fee_rate = self.fee_rate(args.sat_per_vbyte, pair.from).await?;
            let wallet = self.onchain.get_any_wallet(&WalletChecker {
                id: args.wallet_id,
                currency: Some(pair.from),
                allow_readonly: false,
                tenant_id: Some(tenant_id),
                ..Default::default()
            })?;
            let required = amount + calculate_fee_estimate(SwapFees::from(&quote), amount);
            self.check_balance(wallet.as_ref(), required, fee_rate).await?;
            Some((wallet, fee_rate))
        } else {
            None
        };

        if let Some(hint) = magic_routing_hint {
            let mut info = SubmarineSwapInfo {
                bip21: hint.bip21,
                address: hint.address,
                expected_amount: hint.amount,
                ..Default::default()
            };
            if let Some((wallet, fee_rate)) = funding {
                info.tx_id = self
                    .fund(wallet.as_ref(), &info.address, info.expected_amount, fee_rate)
                    .await?;
            }
            return Ok(info);
        }

        if !request.invoice.is_empty() {
            if let Some(existing) = self.store.query_swap_by_invoice(&request.invoice)? {
                return Err(SwapError::argument(format!("swap {} has the same invoice", existing.id)));
            }
        }
        if !args.refund_address.is_empty() {
            validate_address(self.network(), pair.from, &args.refund_address, "refund")?;
        }

        let response = self.counterparty.create_swap(request.clone()).await?;

        let claim_pub_key = parse_public_key(response.claim_public_key.as_slice())
            .map_err(verification(SwapType::Submarine))?;
        let blinding = blinding_key(pair.from, &response.blinding_key)?;
        let tree = SwapTree::new(
            pair.from,
            SwapType::Submarine,
            TreeRole::Refund,
            public_key(&private_key),
            claim_pub_key,
            &preimage_hash,
            response.timeout_block_height,
        )
        .map_err(verification(SwapType::Submarine))?;
        tree.verify_leaves(&response.swap_tree)
            .map_err(verification(SwapType::Submarine))?;
        tree.check_address(
            self.network(),
            &response.address,
            blinding.as_ref().map(public_key).as_ref(),
        )
        .map_err(verification(SwapType::Submarine))?;

        if amount != 0 {
            let estimations = self.fee_estimations(SwapType::Submarine, pair).await?;
            check_amounts(
                SwapType::Submarine,
                pair,
                response.expected_amount,
                amount,
                quote.fees.percentage,
                &estimations,
            )
            .map_err(verification(SwapType::Submarine))?;
        }

        let block_height = self.onchain.get_block_height(pair.from).await?;

        let mut swap = SubmarineSwap {
            id: response.id.clone(),
            pair,
            state: SwapState::Pending,
            error: String::new(),
            created_at: now_secs(),
            private_key,
            swap_tree: response.swap_tree.clone(),
            claim_pub_key,
            preimage,
            invoice: request.invoice,
            payment_hash: HexBytes(preimage_hash.to_vec()),
            address: response.address.clone(),
            expected_amount: response.expected_amount,
            timeout_block_height: response.timeout_block_height,
            lockup_transaction_id: String::new(),
            refund_transaction_id: String::new(),
            refund_address: args.refund_address,
            blinding_key: blinding,
            is_auto: false,
            service_fee_percent: quote.fees.percentage,
            wallet_id: funding.as_ref().map(|(wallet, _)| wallet.info().id),
            tenant_id,
        };

        self.store.create_swap(swap.clone())?;
        self.lifecycle.register_swap(swap.clone()).await?;
        metrics::record_swap_created(SwapType::Submarine.as_str());
        tracing::info!(id = %swap.id, address = %swap.address, expected_amount = swap.expected_amount, "Created submarine swap");

        let mut info = SubmarineSwapInfo {
            id: swap.id.clone(),
            bip21: response.bip21,
            address: swap.address.clone(),
            expected_amount: swap.expected_amount,
            timeout_block_height: swap.timeout_block_height,
            timeout_hours: pair
                .from
                .blocks_to_hours(swap.timeout_block_height.saturating_sub(block_height)),
            tx_id: String::new(),
        };

        if let Some((wallet, fee_rate)) = funding {
            match self
                .fund(wallet.as_ref(), &swap.address, swap.expected_amount, fee_rate)
                .await
            {
                Ok(tx_id) => {
                    swap.lockup_transaction_id = tx_id.clone();
                    self.store.update_swap(swap)?;
                    info.tx_id = tx_id;
                }
                Err(e) => {
                    tracing::error!(id = %swap.id, error = %e, "Could not fund submarine swap");
                    swap.state = SwapState::Error;
                    swap.error = e.to_string();
                    self.store.update_swap(swap)?;
                    return Err(e);
                }
            }
        }

        Ok(info)
    }

    /// Create a reverse swap: receive onchain coins for a lightning payment.
    pub async fn create_reverse_swap(&self, args: CreateReverseArgs) -> SwapResult<ReverseSwapInfo> {
        let pair = args.pair.unwrap_or_else(|| default_pair(SwapType::Reverse));
        let tenant_id = args.tenant_id.unwrap_or(DEFAULT_TENANT_ID);
        let standalone = self.lightning().is_none();
        let external_pay = match args.external_pay {
            None => standalone,
            Some(false) if standalone => {
                return Err(SwapError::argument(
                    "can not create reverse swap without external pay in standalone mode",
                ))
            }
            Some(external_pay) => external_pay,
        };
        tracing::info!(pair = %pair, amount = args.amount, external_pay, "Creating reverse swap");

        let (preimage, preimage_hash) = new_preimage();
        let private_key = self.keys.new_key().await?;
        let quote = match args.accepted_pair.clone() {
            Some(quote) => quote,
            None => find_pair(pair, &self.counterparty.reverse_pairs().await?)?,
        };

        let mut request = CreateReverseSwapRequest {
            from: Some(pair.from),
            to: Some(pair.to),
            preimage_hash: HexBytes(preimage_hash.to_vec()),
            claim_public_key: compressed(&private_key),
            invoice_amount: args.amount,
            pair_hash: quote.hash.clone(),
            referral_id: self.referral_id.clone(),
            description: args.description.clone(),
            description_hash: HexBytes(args.description_hash.clone()),
            invoice_expiry: args.invoice_expiry,
            ..Default::default()
        };

        if args.add_magic_routing_hint && (!external_pay || !args.claim_address.is_empty()) {
            return Err(SwapError::argument(
                "magic routing hints can only be used with an internal wallet and the external pay flag",
            ));
        }

        let mut claim_address = args.claim_address.clone();
        let mut wallet_id = None;
        if !claim_address.is_empty() {
            if args.wallet_id.is_some() {
                return Err(SwapError::argument("claim address and wallet id cannot be used together"));
            }
            validate_address(self.network(), pair.to, &claim_address, "claim")?;
        } else {
            let wallet = self.onchain.get_any_wallet(&WalletChecker {
                id: args.wallet_id,
                currency: Some(pair.to),
                allow_readonly: true,
                tenant_id: Some(tenant_id),
                ..Default::default()
            })?;
            wallet_id = Some(wallet.info().id);

            if args.add_magic_routing_hint {
                let address = wallet
                    .new_address()
                    .await
                    .map_err(|e| SwapError::argument(format!("could not get claim address from wallet: {}", e)))?;
                let secp = Secp256k1::new();
                let digest = sha256::Hash::hash(address.as_bytes()).to_byte_array();
                let signature = secp.sign_schnorr_no_aux_rand(
                    &Message::from_digest(digest),
                    &Keypair::from_secret_key(&secp, &private_key),
                );
                request.address = address.clone();
                request.address_signature = HexBytes(signature.serialize().to_vec());
                claim_address = address;
            }
        }

        let response = self.counterparty.create_reverse_swap(request).await?;

        let refund_pub_key = parse_public_key(response.refund_public_key.as_slice())
            .map_err(verification(SwapType::Reverse))?;
        let blinding = blinding_key(pair.to, &response.blinding_key)?;
        let tree = SwapTree::new(
            pair.to,
            SwapType::Reverse,
            TreeRole::Claim,
            public_key(&private_key),
            refund_pub_key,
            &preimage_hash,
            response.timeout_block_height,
        )
        .map_err(verification(SwapType::Reverse))?;
        tree.verify_leaves(&response.swap_tree)
            .map_err(verification(SwapType::Reverse))?;
        tree.check_address(
            self.network(),
            &response.lockup_address,
            blinding.as_ref().map(public_key).as_ref(),
        )
        .map_err(verification(SwapType::Reverse))?;

        let estimations = self.fee_estimations(SwapType::Reverse, pair).await?;
        check_amounts(
            SwapType::Reverse,
            pair,
            args.amount,
            response.onchain_amount,
            quote.fees.percentage,
            &estimations,
        )
        .map_err(verification(SwapType::Reverse))?;

        let invoice = decode_bolt11(&response.invoice, self.network()).map_err(verification(SwapType::Reverse))?;
        if invoice.payment_hash != preimage_hash {
            return Err(verification(SwapType::Reverse)(SwapError::InvalidResponse(
                "invalid invoice preimage hash".to_string(),
            )));
        }
        if invoice.amount_sat == 0 {
            return Err(verification(SwapType::Reverse)(SwapError::InvalidResponse(
                "invoice amount is missing".to_string(),
            )));
        }

        let swap = ReverseSwap {
            id: response.id.clone(),
            pair,
            state: SwapState::Pending,
            error: String::new(),
            created_at: now_secs(),
            accept_zero_conf: args.accept_zero_conf,
            private_key,
            refund_pub_key,
            swap_tree: response.swap_tree.clone(),
            preimage: HexBytes(preimage),
            invoice: response.invoice.clone(),
            claim_address,
            onchain_amount: response.onchain_amount,
            invoice_amount: invoice.amount_sat,
            timeout_block_height: response.timeout_block_height,
            lockup_transaction_id: String::new(),
            claim_transaction_id: String::new(),
            blinding_key: blinding,
            is_auto: false,
            service_fee_percent: quote.fees.percentage,
            external_pay,
            wallet_id,
            tenant_id,
        };

        self.store.create_reverse_swap(swap.clone())?;
        self.lifecycle.register_reverse_swap(swap.clone()).await?;
        metrics::record_swap_created(SwapType::Reverse.as_str());
        tracing::info!(id = %swap.id, onchain_amount = swap.onchain_amount, "Created reverse swap");

        Ok(ReverseSwapInfo {
            id: swap.id,
            lockup_address: response.lockup_address,
            invoice: swap.invoice,
            timeout_block_height: swap.timeout_block_height,
            onchain_amount: swap.onchain_amount,
        })
    }

    /// Verify one side of a chain swap and turn it into swap data.
    #[allow(clippy::too_many_arguments)]
    fn chain_side(
        &self,
        id: &str,
        currency: Currency,
        role: TreeRole,
        private_key: SecretKey,
        details: &ChainSwapDetails,
        address: &str,
        preimage_hash: &[u8; 32],
    ) -> SwapResult<ChainSwapData> {
        let their_public_key =
            parse_public_key(details.server_public_key.as_slice()).map_err(verification(SwapType::Chain))?;
        let blinding = blinding_key(currency, &details.blinding_key)?;
        let tree = SwapTree::new(
            currency,
            SwapType::Chain,
            role,
            public_key(&private_key),
            their_public_key,
            preimage_hash,
            details.timeout_block_height,
        )
        .map_err(verification(SwapType::Chain))?;
        tree.verify_leaves(&details.swap_tree)
            .map_err(verification(SwapType::Chain))?;
        tree.check_address(
            self.network(),
            &details.lockup_address,
            blinding.as_ref().map(public_key).as_ref(),
        )
        .map_err(verification(SwapType::Chain))?;

        Ok(ChainSwapData {
            id: id.to_string(),
            currency,
            private_key,
            their_public_key,
            blinding_key: blinding,
            tree: details.swap_tree.clone(),
            amount: details.amount,
            timeout_block_height: details.timeout_block_height,
            lockup_transaction_id: String::new(),
            transaction_id: String::new(),
            wallet_id: None,
            address: address.to_string(),
            lockup_address: details.lockup_address.clone(),
        })
    }

    /// Create a chain swap: move coins from one chain to another.
    pub async fn create_chain_swap(&self, args: CreateChainArgs) -> SwapResult<ChainSwap> {
        let pair = args.pair.unwrap_or_else(|| default_pair(SwapType::Chain));
        let tenant_id = args.tenant_id.unwrap_or(DEFAULT_TENANT_ID);
        tracing::info!(pair = %pair, amount = args.amount, external_pay = args.external_pay, "Creating chain swap");

        if args.amount == 0 && !args.external_pay {
            return Err(SwapError::argument("cannot auto send if amount is 0"));
        }

        let claim_key = self.keys.new_key().await?;
        let refund_key = self.keys.new_key().await?;
        let (preimage, preimage_hash) = new_preimage();
        let quote = match args.accepted_pair.clone() {
            Some(quote) => quote,
            None => find_pair(pair, &self.counterparty.chain_pairs().await?)?,
        };

        let request = ChainRequest {
            from: Some(pair.from),
            to: Some(pair.to),
            preimage_hash: HexBytes(preimage_hash.to_vec()),
            claim_public_key: compressed(&claim_key),
            refund_public_key: compressed(&refund_key),
            user_lock_amount: args.amount,
            pair_hash: quote.hash.clone(),
            referral_id: self.referral_id.clone(),
            ..Default::default()
        };

        let funding = match args.from_wallet_id {
            Some(id) => {
                let wallet = self.onchain.get_any_wallet(&WalletChecker {
                    id: Some(id),
                    currency: Some(pair.from),
                    allow_readonly: false,
                    tenant_id: Some(tenant_id),
                    ..Default::default()
                })?;
                let fee_rate = self.fee_rate(args.sat_per_vbyte, pair.from).await?;
                if !args.external_pay {
                    self.check_balance(wallet.as_ref(), args.amount, fee_rate).await?;
                }
                Some((wallet, fee_rate))
            }
            None if !args.external_pay => {
                return Err(SwapError::argument("from wallet required if external pay is not specified"));
            }
            None => None,
        };

        let to_wallet_id = match args.to_wallet_id {
            Some(id) => {
                let wallet = self.onchain.get_any_wallet(&WalletChecker {
                    id: Some(id),
                    currency: Some(pair.to),
                    allow_readonly: true,
                    tenant_id: Some(tenant_id),
                    ..Default::default()
                })?;
                Some(wallet.info().id)
            }
            None if !args.to_address.is_empty() => {
                validate_address(self.network(), pair.to, &args.to_address, "claim")?;
                None
            }
            None => return Err(SwapError::argument("to address or to wallet required")),
        };
        if !args.refund_address.is_empty() {
            validate_address(self.network(), pair.from, &args.refund_address, "refund")?;
        }

        let response = self.counterparty.create_chain_swap(request).await?;

        let mut to_data = self.chain_side(
            &response.id,
            pair.to,
            TreeRole::Claim,
            claim_key,
            &response.claim_details,
            &args.to_address,
            &preimage_hash,
        )?;
        let mut from_data = self.chain_side(
            &response.id,
            pair.from,
            TreeRole::Refund,
            refund_key,
            &response.lockup_details,
            &args.refund_address,
            &preimage_hash,
        )?;
        to_data.wallet_id = to_wallet_id;
        from_data.wallet_id = funding.as_ref().map(|(wallet, _)| wallet.info().id);

        if args.amount != 0 {
            let estimations = self.fee_estimations(SwapType::Chain, pair).await?;
            check_amounts(
                SwapType::Chain,
                pair,
                from_data.amount,
                to_data.amount,
                quote.fees.percentage,
                &estimations,
            )
            .map_err(verification(SwapType::Chain))?;
        }

        let mut swap = ChainSwap {
            id: response.id,
            pair,
            state: SwapState::Pending,
            error: String::new(),
            created_at: now_secs(),
            accept_zero_conf: args.accept_zero_conf,
            preimage: HexBytes(preimage),
            is_auto: false,
            service_fee_percent: quote.fees.percentage,
            tenant_id,
            from_data,
            to_data,
        };

        self.store.create_chain_swap(swap.clone())?;
        self.lifecycle.register_chain_swap(swap.clone()).await?;
        metrics::record_swap_created(SwapType::Chain.as_str());
        tracing::info!(id = %swap.id, lockup_address = %swap.from_data.lockup_address, "Created chain swap");

        if let Some((wallet, fee_rate)) = funding.filter(|_| !args.external_pay) {
            let address = swap.from_data.lockup_address.clone();
            match self.fund(wallet.as_ref(), &address, swap.from_data.amount, fee_rate).await {
                Ok(tx_id) => {
                    swap.from_data.lockup_transaction_id = tx_id;
                    self.store.update_chain_swap(swap.clone())?;
                }
                Err(e) => {
                    tracing::error!(id = %swap.id, error = %e, "Could not fund chain swap");
                    swap.state = SwapState::Error;
                    swap.error = e.to_string();
                    self.store.update_chain_swap(swap)?;
                    return Err(e);
                }
            }
        }

        Ok(swap)
    }
}
