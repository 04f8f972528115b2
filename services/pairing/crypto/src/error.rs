//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// OS random source failed
    #[error("random source failed: {0}")]
    Rng(String),

    /// Key or IV of the wrong size
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// PEM text is not an RSA public key
    #[error("invalid public key: {0}")]
    PublicKey(String),

    /// RSA encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Declared plaintext length differs from the ciphertext length
    #[error("length mismatch: declared {declared}, got {actual}")]
    LengthMismatch {
        /// Length the peer declared
        declared: usize,
        /// Ciphertext length
        actual: usize,
    },

    /// Input is not valid base64
    #[error("invalid base64: {0}")]
    Base64(String),
}
