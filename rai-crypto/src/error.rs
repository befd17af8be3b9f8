//! Error types for the crypto module.

use thiserror::Error;

/// Errors raised by key handling and signature checks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    /// The 32 bytes do not decode to a curve point
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature does not match the message and key
    #[error("Invalid signature")]
    InvalidSignature,

    /// Key material has the wrong size
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Key material is not valid hex
    #[error("Invalid hex key: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A specialized `Result` type for crypto operations
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
