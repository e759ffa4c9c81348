//! Password-based encryption of wallet secrets at rest.
//!
//! # Format
//! ```text
//! key        = PBKDF2-HMAC-SHA256(password, hex_decode(salt), 4096 rounds, 32 bytes)
//! ciphertext = hex(nonce[12] || AES-256-GCM(key, nonce, plaintext))
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

pub const PBKDF2_ROUNDS: u32 = 4096;
pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid salt: {0}")]
    InvalidSalt(String),

    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    #[error("encryption failed")]
    Encrypt,

    /// Wrong password, wrong salt or tampered data.
    #[error("decryption failed")]
    Decrypt,
}

pub type CipherResult<T> = Result<T, CipherError>;

/// Fresh random salt, hex encoded.
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn derive_key(password: &str, salt: &str) -> CipherResult<[u8; KEY_LEN]> {
    let salt = hex::decode(salt).map_err(|e| CipherError::InvalidSalt(e.to_string()))?;
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut key);
    Ok(key)
}

pub fn encrypt(plaintext: &str, password: &str, salt: &str) -> CipherResult<String> {
    let key = derive_key(password, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::Encrypt)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|_| CipherError::Encrypt)?;

    let mut sealed = nonce_bytes.to_vec();
    sealed.extend(ciphertext);
    Ok(hex::encode(sealed))
}

pub fn decrypt(ciphertext: &str, password: &str, salt: &str) -> CipherResult<String> {
    let key = derive_key(password, salt)?;
    let sealed = hex::decode(ciphertext).map_err(|e| CipherError::InvalidCiphertext(e.to_string()))?;
    if sealed.len() < NONCE_LEN {
        return Err(CipherError::InvalidCiphertext("shorter than nonce".to_string()));
    }

    let (nonce, body) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CipherError::Decrypt)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), body)
        .map_err(|_| CipherError::Decrypt)?;
    String::from_utf8(plaintext).map_err(|e| CipherError::InvalidCiphertext(e.to_string()))
}
