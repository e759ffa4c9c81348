//! Local reconstruction of the taproot swap tree.
//!
//! ```text
//! refund leaf:  <x(refund)> OP_CHECKSIGVERIFY <timeout> OP_CHECKLOCKTIMEVERIFY
//! claim leaf:   OP_HASH160 <ripemd160(preimage_hash)> OP_EQUALVERIFY <x(claim)> OP_CHECKSIG
//!               (prefixed by OP_SIZE 32 OP_EQUALVERIFY for reverse and chain swaps)
//! internal key: MuSig2 KeyAgg(counterparty key, our key)
//! output key:   internal key tweaked with the root of both leaves
//! ```
//!
//! The taproot commitment comes from the `bitcoin` builder on BTC and the
//! `elements` builder on Liquid, which uses leaf version 0xc4 and the
//! `/elements` tagged hashes.

use bitcoin::hashes::{ripemd160, sha256, Hash, HashEngine};
use bitcoin::key::TweakedPublicKey;
use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CLTV, OP_EQUALVERIFY, OP_HASH160, OP_SIZE,
};
use bitcoin::script::{Builder, ScriptBuf};
use bitcoin::secp256k1::{PublicKey, Scalar, Secp256k1, XOnlyPublicKey};
use std::str::FromStr;
use thiserror::Error;

use crate::chain::types::{Currency, Network};
use crate::counterparty::types::{HexBytes, SerializedLeaf, SerializedTree};
use crate::swap::types::SwapType;

pub const LEAF_VERSION_BTC: u8 = 0xc0;
pub const LEAF_VERSION_LIQUID: u8 = 0xc4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid {0} leaf")]
    InvalidLeaf(&'static str),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("key aggregation failed: {0}")]
    KeyAggregation(String),

    #[error("could not build taproot tree: {0}")]
    Taproot(String),

    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("address {0} does not match swap tree")]
    AddressMismatch(String),

    #[error("blinding key of address {0} does not match")]
    BlindingKeyMismatch(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Which leaf of the tree our key sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeRole {
    Claim,
    Refund,
}

fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = sha256::Hash::hash(tag.as_bytes());
    let mut engine = sha256::Hash::engine();
    engine.input(tag_hash.as_byte_array());
    engine.input(tag_hash.as_byte_array());
    for part in parts {
        engine.input(part);
    }
    sha256::Hash::from_engine(engine).to_byte_array()
}

fn scalar(bytes: [u8; 32]) -> TreeResult<Scalar> {
    Scalar::from_be_bytes(bytes).map_err(|e| TreeError::KeyAggregation(e.to_string()))
}

/// BIP327 KeyAgg without tweaks. Key order matters.
pub fn aggregate_keys(keys: &[PublicKey]) -> TreeResult<PublicKey> {
    let secp = Secp256k1::new();
    let serialized: Vec<[u8; 33]> = keys.iter().map(PublicKey::serialize).collect();
    let list: Vec<u8> = serialized.concat();
    let list_hash = tagged_hash("KeyAgg list", &[list.as_slice()]);

    let second = serialized.iter().find(|k| Some(*k) != serialized.first());

    let mut points = Vec::with_capacity(keys.len());
    for (key, bytes) in keys.iter().zip(&serialized) {
        if Some(bytes) == second {
            points.push(*key);
            continue;
        }
        let coefficient = tagged_hash("KeyAgg coefficient", &[&list_hash, bytes]);
        let point = key
            .mul_tweak(&secp, &scalar(coefficient)?)
            .map_err(|e| TreeError::KeyAggregation(e.to_string()))?;
        points.push(point);
    }

    let refs: Vec<&PublicKey> = points.iter().collect();
    PublicKey::combine_keys(&refs).map_err(|e| TreeError::KeyAggregation(e.to_string()))
}

/// Merkle root and output key of a two leaf tree with both leaves at depth 1.
fn commit(
    currency: Currency,
    internal_key: XOnlyPublicKey,
    claim_script: &ScriptBuf,
    refund_script: &ScriptBuf,
) -> TreeResult<([u8; 32], XOnlyPublicKey)> {
    let secp = Secp256k1::verification_only();

    match currency {
        Currency::Btc => {
            let info = bitcoin::taproot::TaprootBuilder::new()
                .add_leaf(1, claim_script.clone())
                .and_then(|builder| builder.add_leaf(1, refund_script.clone()))
                .map_err(|e| TreeError::Taproot(e.to_string()))?
                .finalize(&secp, internal_key)
                .map_err(|_| TreeError::Taproot("incomplete tree".to_string()))?;
            let root = info
                .merkle_root()
                .ok_or_else(|| TreeError::Taproot("missing merkle root".to_string()))?;
            Ok((root.to_byte_array(), info.output_key().to_inner()))
        }
        Currency::Liquid => {
            let info = elements::taproot::TaprootBuilder::new()
                .add_leaf(1, elements::Script::from(claim_script.to_bytes()))
                .and_then(|builder| builder.add_leaf(1, elements::Script::from(refund_script.to_bytes())))
                .and_then(|builder| builder.finalize(&secp, internal_key))
                .map_err(|e| TreeError::Taproot(e.to_string()))?;
            let root = info
                .merkle_root()
                .ok_or_else(|| TreeError::Taproot("missing merkle root".to_string()))?;
            Ok((root.to_byte_array(), info.output_key().into_inner()))
        }
    }
}

/// Swap tree rebuilt from our own parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTree {
    currency: Currency,
    claim_script: ScriptBuf,
    refund_script: ScriptBuf,
    internal_key: XOnlyPublicKey,
    merkle_root: [u8; 32],
    output_key: XOnlyPublicKey,
}

impl SwapTree {
    /// Build the tree for one lockup.
    ///
    /// `our_role` decides whether `our_key` goes into the claim or the refund
    /// leaf; `their_key` takes the other one and comes first in the key
    /// aggregation.
    pub fn new(
        currency: Currency,
        swap_type: SwapType,
        our_role: TreeRole,
        our_key: PublicKey,
        their_key: PublicKey,
        preimage_hash: &[u8],
        timeout_block_height: u32,
    ) -> TreeResult<Self> {
        let (claim_key, refund_key) = match our_role {
            TreeRole::Claim => (our_key, their_key),
            TreeRole::Refund => (their_key, our_key),
        };

        let refund_script = Builder::new()
            .push_x_only_key(&refund_key.x_only_public_key().0)
            .push_opcode(OP_CHECKSIGVERIFY)
            .push_int(timeout_block_height as i64)
            .push_opcode(OP_CLTV)
            .into_script();

        let mut claim = Builder::new();
        if swap_type != SwapType::Submarine {
            claim = claim
                .push_opcode(OP_SIZE)
                .push_int(32)
                .push_opcode(OP_EQUALVERIFY);
        }
        let claim_script = claim
            .push_opcode(OP_HASH160)
            .push_slice(ripemd160::Hash::hash(preimage_hash).to_byte_array())
            .push_opcode(OP_EQUALVERIFY)
            .push_x_only_key(&claim_key.x_only_public_key().0)
            .push_opcode(OP_CHECKSIG)
            .into_script();

        let internal_key = aggregate_keys(&[their_key, our_key])?.x_only_public_key().0;

        let (merkle_root, output_key) = commit(currency, internal_key, &claim_script, &refund_script)?;

        Ok(Self {
            currency,
            claim_script,
            refund_script,
            internal_key,
            merkle_root,
            output_key,
        })
    }

    pub fn leaf_version(&self) -> u8 {
        match self.currency {
            Currency::Btc => LEAF_VERSION_BTC,
            Currency::Liquid => LEAF_VERSION_LIQUID,
        }
    }

    pub fn merkle_root(&self) -> [u8; 32] {
        self.merkle_root
    }

    pub fn claim_script(&self) -> &ScriptBuf {
        &self.claim_script
    }

    pub fn refund_script(&self) -> &ScriptBuf {
        &self.refund_script
    }

    pub fn internal_key(&self) -> XOnlyPublicKey {
        self.internal_key
    }

    pub fn output_key(&self) -> XOnlyPublicKey {
        self.output_key
    }

    /// `OP_1 <output key>`.
    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(self.output_key))
    }

    pub fn serialize(&self) -> SerializedTree {
        SerializedTree {
            claim_leaf: SerializedLeaf {
                version: self.leaf_version(),
                output: HexBytes(self.claim_script.to_bytes()),
            },
            refund_leaf: SerializedLeaf {
                version: self.leaf_version(),
                output: HexBytes(self.refund_script.to_bytes()),
            },
        }
    }

    /// Compare the counterparty's leaves byte for byte with ours.
    pub fn verify_leaves(&self, theirs: &SerializedTree) -> TreeResult<()> {
        let ours = self.serialize();
        if theirs.claim_leaf != ours.claim_leaf {
            return Err(TreeError::InvalidLeaf("claim"));
        }
        if theirs.refund_leaf != ours.refund_leaf {
            return Err(TreeError::InvalidLeaf("refund"));
        }
        Ok(())
    }

    /// Check that `address` pays to this tree. Liquid addresses must also
    /// carry `blinding_key` when one is given.
    pub fn check_address(
        &self,
        network: Network,
        address: &str,
        blinding_key: Option<&PublicKey>,
    ) -> TreeResult<()> {
        let invalid = |reason: String| TreeError::InvalidAddress {
            address: address.to_string(),
            reason,
        };
        let expected = self.script_pubkey();

        match self.currency {
            Currency::Btc => {
                let script = bitcoin::Address::from_str(address)
                    .map_err(|e| invalid(e.to_string()))?
                    .require_network(network.bitcoin())
                    .map_err(|e| invalid(e.to_string()))?
                    .script_pubkey();
                if script != expected {
                    return Err(TreeError::AddressMismatch(address.to_string()));
                }
            }
            Currency::Liquid => {
                let parsed = elements::Address::parse_with_params(address, network.liquid())
                    .map_err(|e| invalid(e.to_string()))?;
                if parsed.script_pubkey().as_bytes() != expected.as_bytes() {
                    return Err(TreeError::AddressMismatch(address.to_string()));
                }
                if let Some(blinding_key) = blinding_key {
                    let actual = parsed.blinding_pubkey.map(|k| k.serialize());
                    if actual != Some(blinding_key.serialize()) {
                        return Err(TreeError::BlindingKeyMismatch(address.to_string()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Parse a compressed public key sent by the counterparty.
pub fn parse_public_key(bytes: &[u8]) -> TreeResult<PublicKey> {
    PublicKey::from_slice(bytes).map_err(|e| TreeError::InvalidKey(e.to_string()))
}
