//! Deterministic swap key issuance.
//!
//! Every swap key is derived from the stored [`SwapMnemonic`] at
//! `m/44/0/0/0/{index}`. Issuance is serialized so two concurrent swaps can
//! never share an index, and the incremented index is persisted before the
//! key leaves this module.

use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use rand::RngCore;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::swap::store::{StoreError, SwapStore};
use crate::swap::types::SwapMnemonic;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("swap mnemonic not set")]
    MnemonicNotSet,

    #[error("invalid mnemonic: {0}")]
    Mnemonic(#[from] bip39::Error),

    #[error("key derivation failed: {0}")]
    Derivation(#[from] bitcoin::bip32::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type KeyResult<T> = Result<T, KeyError>;

/// Derive the swap key at `index` from a BIP39 mnemonic with an empty
/// passphrase.
pub fn derive_swap_key(mnemonic: &str, index: u32) -> KeyResult<SecretKey> {
    let seed = bip39::Mnemonic::parse(mnemonic)?.to_seed("");
    let master = Xpriv::new_master(bitcoin::Network::Bitcoin, &seed)?;
    let path = DerivationPath::from_str(&format!("m/44/0/0/0/{}", index))?;
    Ok(master.derive_priv(&Secp256k1::new(), &path)?.private_key)
}

/// Fresh 12 word mnemonic.
pub fn generate_mnemonic() -> KeyResult<String> {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);
    Ok(bip39::Mnemonic::from_entropy(&entropy)?.to_string())
}

pub struct KeyIssuer {
    store: Arc<dyn SwapStore>,
    lock: Mutex<()>,
}

impl KeyIssuer {
    pub fn new(store: Arc<dyn SwapStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// Make sure a mnemonic exists, generating one on first start.
    pub async fn ensure_mnemonic(&self) -> KeyResult<()> {
        let _guard = self.lock.lock().await;
        if self.store.swap_mnemonic()?.is_none() {
            self.store.set_swap_mnemonic(SwapMnemonic {
                mnemonic: generate_mnemonic()?,
                last_key_index: 0,
            })?;
            tracing::info!("Generated new swap mnemonic");
        }
        Ok(())
    }

    /// Replace the mnemonic, restarting at index 0.
    pub async fn set_mnemonic(&self, mnemonic: &str) -> KeyResult<()> {
        bip39::Mnemonic::parse(mnemonic)?;
        let _guard = self.lock.lock().await;
        self.store.set_swap_mnemonic(SwapMnemonic {
            mnemonic: mnemonic.to_string(),
            last_key_index: 0,
        })?;
        Ok(())
    }

    /// Issue the next swap key.
    pub async fn new_key(&self) -> KeyResult<SecretKey> {
        let _guard = self.lock.lock().await;
        let mnemonic = self.store.swap_mnemonic()?.ok_or(KeyError::MnemonicNotSet)?;
        let key = derive_swap_key(&mnemonic.mnemonic, mnemonic.last_key_index)?;
        self.store.increment_swap_mnemonic_index()?;
        tracing::debug!(index = mnemonic.last_key_index, "Issued swap key");
        Ok(key)
    }
}
