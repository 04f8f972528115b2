//! Handshake error taxonomy.

use crate::session::HandshakeState;
use crate::transport::Characteristic;
use pairing_crypto::CryptoError;
use pairing_wire::WireError;
use thiserror::Error;

/// Broad class of a handshake failure, used to pick the log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed write or value
    ProtocolFraming,
    /// Key parsing, generation, encryption or decryption failed
    CryptoFailure,
    /// Write not valid for the session's current state
    SessionState,
}

/// Per-session handshake errors.
///
/// None of these leave the service: they are logged and the client only
/// observes a missing notification.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Frame or value could not be parsed
    #[error("framing: {0}")]
    Framing(#[from] WireError),

    /// Issuing session keys failed; the session is discarded
    #[error("key issue failed: {0}")]
    KeyIssue(#[source] CryptoError),

    /// Confirmation value could not be decoded or decrypted
    #[error("confirmation failed: {0}")]
    Confirmation(#[source] CryptoError),

    /// Confirmation decrypted to something other than the expected literal
    #[error("confirmation plaintext mismatch")]
    Mismatch,

    /// Write arrived in a state that does not accept it
    #[error("{characteristic} write ignored in state {state}")]
    UnexpectedState {
        /// Characteristic written
        characteristic: Characteristic,
        /// State at the time of the write
        state: HandshakeState,
    },
}

impl HandshakeError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Framing(_) => ErrorKind::ProtocolFraming,
            Self::KeyIssue(_) | Self::Confirmation(_) | Self::Mismatch => ErrorKind::CryptoFailure,
            Self::UnexpectedState { .. } => ErrorKind::SessionState,
        }
    }
}

/// Characteristic UUID not served by this service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown characteristic: {0}")]
pub struct UnknownCharacteristic(pub String);
