//! Cryptographic primitives for the pairing handshake.
//!
//! - Session key and IV generation from the OS CSPRNG
//! - AES-256-CTR encryption and decryption
//! - RSA PKCS#1 v1.5 encryption to a client's PEM public key
//! - Base64 encoding and decoding
//!
//! Every failure is a recoverable [`CryptoError`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod symmetric;

pub use encoding::{base64_decode, base64_encode};
pub use envelope::{parse_public_key, rsa_encrypt, rsa_encrypt_with_public_key};
pub use error::{CryptoError, Result};
pub use keys::{generate_key_and_iv, SessionKeys, IV_LEN, KEY_LEN};
pub use symmetric::{aes_ctr_decrypt, aes_ctr_encrypt};

/// Parsed RSA public key
pub use rsa::RsaPublicKey;
