//! AES-256-CTR with the IV as the initial big-endian counter block.
//!
//! Output matches OpenSSL's `EVP_aes_256_ctr`, which is what paired clients
//! run. CTR gives no integrity; callers compare plaintexts.

use crate::error::{CryptoError, Result};
use crate::keys::{IV_LEN, KEY_LEN};
use ctr::cipher::{KeyIvInit, StreamCipher};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

fn cipher(key: &[u8], iv: &[u8]) -> Result<Aes256Ctr> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: IV_LEN,
            actual: iv.len(),
        });
    }
    Aes256Ctr::new_from_slices(key, iv).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_LEN,
        actual: key.len(),
    })
}

/// Encrypt `plaintext`. The ciphertext has the same length.
pub fn aes_ctr_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut cipher = cipher(key, iv)?;
    let mut out = plaintext.to_vec();
    cipher.apply_keystream(&mut out);
    Ok(out)
}

/// Decrypt `ciphertext` whose plaintext the peer declared as `expected_len` bytes
pub fn aes_ctr_decrypt(
    key: &[u8],
    iv: &[u8],
    expected_len: usize,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    if expected_len != ciphertext.len() {
        return Err(CryptoError::LengthMismatch {
            declared: expected_len,
            actual: ciphertext.len(),
        });
    }
    let mut cipher = cipher(key, iv)?;
    let mut out = ciphertext.to_vec();
    cipher.apply_keystream(&mut out);
    Ok(out)
}
