//! RSA envelope encryption for issuing session keys.
//!
//! Padding is PKCS#1 v1.5, which deployed clients decrypt with.

use crate::error::{CryptoError, Result};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

/// Parse a PEM RSA public key.
///
/// SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) is tried first, then PKCS#1
/// (`BEGIN RSA PUBLIC KEY`).
pub fn parse_public_key(pem: &[u8]) -> Result<RsaPublicKey> {
    let text = std::str::from_utf8(pem)
        .map_err(|_| CryptoError::PublicKey("pem is not utf-8".into()))?
        .trim();

    match RsaPublicKey::from_public_key_pem(text) {
        Ok(key) => Ok(key),
        Err(spki_err) => RsaPublicKey::from_pkcs1_pem(text).map_err(|pkcs1_err| {
            tracing::trace!("SPKI parse failed: {}, PKCS#1 parse failed: {}", spki_err, pkcs1_err);
            CryptoError::PublicKey(spki_err.to_string())
        }),
    }
}

/// Encrypt `plaintext` to an already parsed key.
///
/// The ciphertext is exactly the modulus size.
pub fn rsa_encrypt(key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let ciphertext = key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    tracing::trace!("RSA envelope: {} bytes for a {}-byte modulus", ciphertext.len(), key.size());
    Ok(ciphertext)
}

/// Parse `pem` and encrypt `plaintext` to it
pub fn rsa_encrypt_with_public_key(pem: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let key = parse_public_key(pem)?;
    rsa_encrypt(&key, plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn test_encrypt_spki_pem() {
        let (private, public) = keypair();
        let pem = public.to_public_key_pem(LineEnding::LF).unwrap();

        let ct = rsa_encrypt_with_public_key(pem.as_bytes(), b"[key:]abc[iv:]def").unwrap();
        assert_eq!(ct.len(), public.size());

        let pt = private.decrypt(Pkcs1v15Encrypt, &ct).unwrap();
        assert_eq!(pt, b"[key:]abc[iv:]def");
    }

    #[test]
    fn test_encrypt_pkcs1_pem() {
        let (private, public) = keypair();
        let pem = public.to_pkcs1_pem(LineEnding::CRLF).unwrap();

        let ct = rsa_encrypt_with_public_key(pem.as_bytes(), b"hello").unwrap();
        assert_eq!(private.decrypt(Pkcs1v15Encrypt, &ct).unwrap(), b"hello");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_public_key(b"-----BEGIN PUBLIC KEY-----\nnot a key\n-----END PUBLIC KEY-----\n"),
            Err(CryptoError::PublicKey(_))
        ));
        assert!(matches!(
            parse_public_key(&[0xff, 0xfe]),
            Err(CryptoError::PublicKey(_))
        ));
    }

    #[test]
    fn test_plaintext_too_long() {
        let (_, public) = keypair();
        let long = vec![b'a'; public.size()];
        assert!(matches!(
            rsa_encrypt(&public, &long),
            Err(CryptoError::Encryption(_))
        ));
    }
}
