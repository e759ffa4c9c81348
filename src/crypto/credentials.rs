//! Stored wallet credentials and their record-level encryption.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::cipher::{self, CipherError};
use crate::onchain::wallet::WalletInfo;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("credentials are already encrypted")]
    AlreadyEncrypted,

    #[error("credentials are not encrypted")]
    NotEncrypted,

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

pub type CredentialsResult<T> = Result<T, CredentialsError>;

/// Secret material of one wallet. At most one of `mnemonic`, `xpub` and
/// `core_descriptor` is set; a non-empty `salt` marks it encrypted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCredentials {
    #[serde(flatten)]
    pub info: WalletInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_descriptor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<u64>,
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub legacy: bool,
}

impl std::fmt::Debug for WalletCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCredentials")
            .field("info", &self.info)
            .field("encrypted", &self.encrypted())
            .field("subaccount", &self.subaccount)
            .finish_non_exhaustive()
    }
}

impl WalletCredentials {
    pub fn encrypted(&self) -> bool {
        !self.salt.is_empty()
    }

    /// The populated secret, in the order xpub, descriptor, mnemonic.
    fn secret_mut(&mut self) -> Option<&mut String> {
        if self.xpub.is_some() {
            self.xpub.as_mut()
        } else if self.core_descriptor.is_some() {
            self.core_descriptor.as_mut()
        } else {
            self.mnemonic.as_mut()
        }
    }

    pub fn encrypt(&self, password: &str) -> CredentialsResult<WalletCredentials> {
        if self.encrypted() {
            return Err(CredentialsError::AlreadyEncrypted);
        }
        let mut encrypted = self.clone();
        encrypted.salt = cipher::generate_salt();
        let salt = encrypted.salt.clone();
        if let Some(secret) = encrypted.secret_mut() {
            *secret = cipher::encrypt(secret, password, &salt)?;
        }
        Ok(encrypted)
    }

    pub fn decrypt(&self, password: &str) -> CredentialsResult<WalletCredentials> {
        if !self.encrypted() {
            return Err(CredentialsError::NotEncrypted);
        }
        let mut decrypted = self.clone();
        let salt = std::mem::take(&mut decrypted.salt);
        if let Some(secret) = decrypted.secret_mut() {
            *secret = cipher::decrypt(secret, password, &salt)?;
        }
        Ok(decrypted)
    }
}
