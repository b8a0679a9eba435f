//! OnionMesh Cryptography
//!
//! Hybrid envelope primitives: RSA-OAEP (SHA-256) seals a per-hop AES-256-GCM
//! key, and the AES key encrypts the layer body. `onion` composes the two into
//! layer construction and single-layer peeling.

mod encrypt;
mod keys;
mod onion;

pub use encrypt::*;
pub use keys::*;
pub use onion::*;

use onionmesh_core::OnionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Invalid symmetric key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("Payload too large for key wrapping: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("Seal failed: {0}")]
    SealFailed(String),
    #[error("Unseal failed")]
    UnsealFailed,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Ciphertext too short")]
    CiphertextTooShort,
}

impl From<CryptoError> for OnionError {
    fn from(err: CryptoError) -> Self {
        match err {
            // Malformed key text surfaces as a validation failure
            CryptoError::InvalidPublicKey(reason) => OnionError::Validation(format!(
                "invalid public key: {}",
                reason
            )),
            other => OnionError::Crypto(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
