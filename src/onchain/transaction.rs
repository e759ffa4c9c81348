//! Currency-specific transaction decoding and output search.

use elements::secp256k1_zkp::{Secp256k1, SecretKey};
use std::str::FromStr;

use crate::chain::types::{Currency, Network};
use crate::onchain::types::{OnchainError, OnchainResult};

/// A Liquid transaction plus the key to unblind our own outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidTransaction {
    pub tx: elements::Transaction,
    pub blinding_key: Option<SecretKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainTransaction {
    Btc(bitcoin::Transaction),
    Liquid(LiquidTransaction),
}

impl ChainTransaction {
    /// Decode `hex` for `currency`. `blinding_key` is only used on Liquid.
    pub fn from_hex(currency: Currency, hex: &str, blinding_key: Option<&[u8]>) -> OnchainResult<Self> {
        match currency {
            Currency::Btc => bitcoin::consensus::encode::deserialize_hex::<bitcoin::Transaction>(hex.trim())
                .map(ChainTransaction::Btc)
                .map_err(|e| OnchainError::Decode(e.to_string())),
            Currency::Liquid => {
                let raw = hex::decode(hex.trim()).map_err(|e| OnchainError::Decode(e.to_string()))?;
                let tx: elements::Transaction =
                    elements::encode::deserialize(&raw).map_err(|e| OnchainError::Decode(e.to_string()))?;
                let blinding_key = blinding_key
                    .map(SecretKey::from_slice)
                    .transpose()
                    .map_err(|e| OnchainError::InvalidBlindingKey(e.to_string()))?;
                Ok(ChainTransaction::Liquid(LiquidTransaction { tx, blinding_key }))
            }
        }
    }

    pub fn currency(&self) -> Currency {
        match self {
            ChainTransaction::Btc(_) => Currency::Btc,
            ChainTransaction::Liquid(_) => Currency::Liquid,
        }
    }

    pub fn txid(&self) -> String {
        match self {
            ChainTransaction::Btc(tx) => tx.compute_txid().to_string(),
            ChainTransaction::Liquid(liquid) => liquid.tx.txid().to_string(),
        }
    }

    pub fn to_hex(&self) -> String {
        match self {
            ChainTransaction::Btc(tx) => bitcoin::consensus::encode::serialize_hex(tx),
            ChainTransaction::Liquid(liquid) => hex::encode(elements::encode::serialize(&liquid.tx)),
        }
    }

    /// Index and value of the first output paying `address`.
    ///
    /// Confidential Liquid outputs are unblinded with the transaction's
    /// blinding key; without one they cannot match. Liquid outputs only match
    /// when they carry the network's L-BTC asset.
    pub fn find_output(&self, network: Network, address: &str) -> OnchainResult<Option<(u32, u64)>> {
        let invalid = |reason: String| OnchainError::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        match self {
            ChainTransaction::Btc(tx) => {
                let script = bitcoin::Address::from_str(address)
                    .map_err(|e| invalid(e.to_string()))?
                    .require_network(network.bitcoin())
                    .map_err(|e| invalid(e.to_string()))?
                    .script_pubkey();

                Ok(tx
                    .output
                    .iter()
                    .enumerate()
                    .find(|(_, out)| out.script_pubkey == script)
                    .map(|(vout, out)| (vout as u32, out.value.to_sat())))
            }
            ChainTransaction::Liquid(liquid) => {
                let script = elements::Address::parse_with_params(address, network.liquid())
                    .map_err(|e| invalid(e.to_string()))?
                    .script_pubkey();

                let policy_asset = network.liquid_asset();
                let secp = Secp256k1::new();
                for (vout, out) in liquid.tx.output.iter().enumerate() {
                    if out.script_pubkey != script {
                        continue;
                    }
                    let (asset, value) = match (out.asset.explicit(), out.value.explicit()) {
                        (Some(asset), Some(value)) => (asset, value),
                        _ => {
                            let Some(key) = liquid.blinding_key else {
                                tracing::debug!(vout, "Confidential output without blinding key");
                                continue;
                            };
                            match out.unblind(&secp, key) {
                                Ok(secrets) => (secrets.asset, secrets.value),
                                Err(e) => {
                                    tracing::debug!(vout, error = %e, "Could not unblind output");
                                    continue;
                                }
                            }
                        }
                    };
                    if asset != policy_asset {
                        tracing::warn!(vout, %asset, "Output pays a foreign asset");
                        continue;
                    }
                    return Ok(Some((vout as u32, value)));
                }
                Ok(None)
            }
        }
    }

    /// Explicit fee output of a Liquid transaction.
    pub fn liquid_fee(&self) -> OnchainResult<u64> {
        match self {
            ChainTransaction::Liquid(liquid) => liquid
                .tx
                .output
                .iter()
                .find(|out| out.is_fee())
                .and_then(|out| out.value.explicit())
                .ok_or(OnchainError::NoFeeOutput),
            ChainTransaction::Btc(_) => Err(OnchainError::NoFeeOutput),
        }
    }
}
