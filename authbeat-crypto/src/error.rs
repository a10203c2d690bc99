//! Error types for the token codec.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening a token.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The shared secret was empty.
    #[error("shared secret must not be empty")]
    InvalidSecret,

    /// The token is not valid base64url.
    #[error("invalid token encoding: {0}")]
    Encoding(String),

    /// The decoded token is shorter than the fixed overhead.
    #[error("token too short: expected at least {min} bytes, got {actual}")]
    Truncated { min: usize, actual: usize },

    /// HMAC verification failed (wrong secret or tampered token).
    #[error("token integrity check failed")]
    Integrity,

    /// The leading version byte is not one this codec understands.
    #[error("unsupported token version: {0:#04x}")]
    UnsupportedVersion(u8),

    /// The ciphertext is not a whole number of cipher blocks.
    #[error("invalid ciphertext length: {0}")]
    InvalidCiphertextLength(usize),

    /// PKCS#7 padding did not validate after decryption.
    #[error("invalid padding")]
    Padding,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
