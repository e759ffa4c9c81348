//! Encryption of wallet credentials at rest.

pub mod cipher;
pub mod credentials;

pub use cipher::{CipherError, CipherResult};
pub use credentials::{CredentialsError, WalletCredentials};
