//! Message bodies carried inside reassembled values.
//!
//! The handshake exchanges a handful of fixed literals and two structured
//! bodies: the key envelope plaintext and the confirmation value.

use crate::chunk::Assembled;
use crate::error::WireError;
use crate::frame::{split_len_tag, LEN_TAG_PREFIX};
use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Reply sent, unencrypted, to a key submission from an authenticated device
pub const ALREADY_LOGGED_IN: &[u8] = b"already logged in";

/// Plaintext the client encrypts to prove it recovered the session key
pub const CONFIRMATION_PLAINTEXT: &[u8] = b"Pass back";

/// Plaintext the server encrypts once the confirmation matches
pub const CONFIRMATION_REPLY: &[u8] = b"Received";

const KEY_LABEL: &str = "[key:]";
const IV_LABEL: &str = "[iv:]";

/// Key envelope plaintext: `[key:]<base64 key>[iv:]<base64 iv>`
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyEnvelope {
    /// Base64 of the 32-byte AES key
    pub key_b64: String,
    /// Base64 of the 16-byte IV
    pub iv_b64: String,
}

impl KeyEnvelope {
    /// Create an envelope from already-encoded parts
    pub fn new(key_b64: String, iv_b64: String) -> Self {
        Self { key_b64, iv_b64 }
    }

    /// Render the plaintext that gets RSA-encrypted
    pub fn to_plaintext(&self) -> String {
        format!("{KEY_LABEL}{}{IV_LABEL}{}", self.key_b64, self.iv_b64)
    }

    /// Parse a recovered envelope plaintext
    pub fn parse(plaintext: &str) -> Option<Self> {
        let rest = plaintext.strip_prefix(KEY_LABEL)?;
        let (key_b64, iv_b64) = rest.split_once(IV_LABEL)?;
        Some(Self::new(key_b64.to_string(), iv_b64.to_string()))
    }
}

impl std::fmt::Debug for KeyEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEnvelope")
            .field("key_b64", &"<redacted>")
            .field("iv_b64", &"<redacted>")
            .finish()
    }
}

/// Confirmation value: `[len:<N>]<base64 ciphertext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationBody {
    /// Plaintext length declared by the client
    pub declared_len: usize,
    /// Base64 text of the AES-CTR ciphertext, not yet decoded
    pub ciphertext_b64: Bytes,
}

impl ConfirmationBody {
    /// Parse a raw confirmation value that still carries its length tag
    pub fn parse(value: &[u8]) -> Result<Self, WireError> {
        match split_len_tag(value)? {
            Some((declared_len, rest)) => Ok(Self {
                declared_len,
                ciphertext_b64: Bytes::copy_from_slice(rest),
            }),
            None if value.starts_with(LEN_TAG_PREFIX) => Err(WireError::LengthTag),
            None => Err(WireError::MissingLengthTag),
        }
    }

    /// Build from a reassembled value.
    ///
    /// The decoder strips the tag from an opening fragment, so the declared
    /// length is taken from there when present and parsed from the value
    /// otherwise.
    pub fn from_assembled(assembled: &Assembled) -> Result<Self, WireError> {
        match assembled.declared_len {
            Some(declared_len) => Ok(Self {
                declared_len,
                ciphertext_b64: assembled.value.clone(),
            }),
            None => Self::parse(&assembled.value),
        }
    }
}
