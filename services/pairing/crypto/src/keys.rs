//! Per-session symmetric key material.

use crate::error::{CryptoError, Result};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// AES-CTR initial counter block length in bytes
pub const IV_LEN: usize = 16;

/// Symmetric key and IV issued to one device.
///
/// Overwritten with zeros when dropped.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl SessionKeys {
    /// Build from known material
    pub fn from_parts(key: [u8; KEY_LEN], iv: [u8; IV_LEN]) -> Self {
        Self { key, iv }
    }

    /// AES-256 key
    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Initial counter block
    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

/// Generate a fresh key and IV from the OS CSPRNG
pub fn generate_key_and_iv() -> Result<SessionKeys> {
    let mut keys = SessionKeys::from_parts([0u8; KEY_LEN], [0u8; IV_LEN]);
    OsRng
        .try_fill_bytes(&mut keys.key)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    OsRng
        .try_fill_bytes(&mut keys.iv)
        .map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct() {
        let a = generate_key_and_iv().unwrap();
        let b = generate_key_and_iv().unwrap();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.iv(), b.iv());
    }

    #[test]
    fn test_zeroize_clears_material() {
        let mut keys = SessionKeys::from_parts([7u8; KEY_LEN], [9u8; IV_LEN]);
        keys.zeroize();
        assert_eq!(keys.key(), &[0u8; KEY_LEN]);
        assert_eq!(keys.iv(), &[0u8; IV_LEN]);
    }

    #[test]
    fn test_debug_redacts() {
        let keys = SessionKeys::from_parts([0xAB; KEY_LEN], [0xCD; IV_LEN]);
        let shown = format!("{keys:?}");
        assert!(shown.contains("redacted"));
        assert!(!shown.contains("171"));
    }
}
