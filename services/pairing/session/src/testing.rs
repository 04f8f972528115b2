//! Client simulator for handshake tests.

use bytes::Bytes;
use pairing_crypto::{aes_ctr_decrypt, aes_ctr_encrypt, base64_decode, base64_encode, IV_LEN, KEY_LEN};
use pairing_wire::{Chunker, DeviceId, KeyEnvelope};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use std::sync::OnceLock;

static CLIENT_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

fn client_key() -> &'static RsaPrivateKey {
    CLIENT_KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

/// Phone-side half of the handshake
pub(crate) struct TestClient {
    device_id: DeviceId,
    pem: String,
    chunker: Chunker,
    key: Option<[u8; KEY_LEN]>,
    iv: Option<[u8; IV_LEN]>,
}

impl TestClient {
    /// Client whose device identifier is derived from `n`
    pub(crate) fn new(n: u32) -> Self {
        Self::with_device_id(&format!("{n:08x}-1111-2222-3333-444444444444"))
    }

    pub(crate) fn with_device_id(id: &str) -> Self {
        let device_id = DeviceId::try_from(id).unwrap();
        let pem = RsaPublicKey::from(client_key())
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        Self {
            device_id,
            pem,
            chunker: Chunker::default(),
            key: None,
            iv: None,
        }
    }

    pub(crate) fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub(crate) fn modulus_size(&self) -> usize {
        client_key().size()
    }

    /// `<id>:<body>` as one write
    pub(crate) fn raw_write(&self, body: &str) -> Bytes {
        Bytes::from(format!("{}:{body}", self.device_id))
    }

    /// The PEM public key split into `pieces` writes
    pub(crate) fn key_writes(&self, pieces: usize) -> Vec<Bytes> {
        self.chunker
            .chunk_into(&self.device_id, self.pem.as_bytes(), None, pieces)
    }

    /// The PEM public key cut at arbitrary byte offsets
    pub(crate) fn key_writes_at(&self, cuts: &[usize]) -> Vec<Bytes> {
        self.chunker
            .chunk_at(&self.device_id, self.pem.as_bytes(), None, cuts)
    }

    /// Decrypt the key envelope and remember the session key
    pub(crate) fn open_envelope(&mut self, ciphertext: &[u8]) -> String {
        let plaintext = client_key().decrypt(Pkcs1v15Encrypt, ciphertext).unwrap();
        let text = String::from_utf8(plaintext).unwrap();
        let envelope = KeyEnvelope::parse(&text).unwrap();

        let key = base64_decode(envelope.key_b64.as_bytes()).unwrap();
        let iv = base64_decode(envelope.iv_b64.as_bytes()).unwrap();
        self.key = Some(key.try_into().unwrap());
        self.iv = Some(iv.try_into().unwrap());
        text
    }

    /// AES-CTR ciphertext of `plaintext` under the session key, base64 encoded
    pub(crate) fn encrypted_b64(&self, plaintext: &[u8]) -> String {
        let ct = aes_ctr_encrypt(&self.key.unwrap(), &self.iv.unwrap(), plaintext).unwrap();
        base64_encode(&ct)
    }

    /// A `[len:N]`-tagged confirmation of `plaintext` split into `pieces` writes
    pub(crate) fn confirmation_writes(&self, plaintext: &[u8], pieces: usize) -> Vec<Bytes> {
        let b64 = self.encrypted_b64(plaintext);
        self.chunker
            .chunk_into(&self.device_id, b64.as_bytes(), Some(plaintext.len()), pieces)
    }

    /// Confirmation value with its tag inline: `[len:N]<base64>`
    pub(crate) fn confirmation_value(&self, plaintext: &[u8]) -> String {
        format!("[len:{}]{}", plaintext.len(), self.encrypted_b64(plaintext))
    }

    /// The inline-tagged confirmation cut at arbitrary byte offsets, tag included
    pub(crate) fn confirmation_writes_at(&self, plaintext: &[u8], cuts: &[usize]) -> Vec<Bytes> {
        let value = self.confirmation_value(plaintext);
        self.chunker
            .chunk_at(&self.device_id, value.as_bytes(), None, cuts)
    }

    /// Decrypt a server reply under the session key
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        aes_ctr_decrypt(
            &self.key.unwrap(),
            &self.iv.unwrap(),
            ciphertext.len(),
            ciphertext,
        )
        .unwrap()
    }
}
