//! Pairing handshake state machine.
//!
//! ```text
//! CollectingPublicKey --(complete PEM on key_transfer)--> KeyIssued
//! KeyIssued --(matching confirmation on test_key)--> Authenticated
//! ```
//!
//! Functions here operate on a locked [`DeviceSession`] and return what the
//! caller should do next; they never touch the store or the notifier.

use crate::error::HandshakeError;
use crate::session::{DeviceSession, HandshakeState};
use crate::transport::Characteristic;
use bytes::Bytes;
use pairing_crypto::{
    aes_ctr_decrypt, aes_ctr_encrypt, base64_decode, base64_encode, generate_key_and_iv,
    parse_public_key, rsa_encrypt,
};
use pairing_wire::{
    ConfirmationBody, Frame, KeyEnvelope, CONFIRMATION_PLAINTEXT, CONFIRMATION_REPLY,
};
use tracing::{debug, trace};
use zeroize::Zeroizing;

/// Result of feeding one fragment to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fragment buffered, value not complete yet
    Buffering,
    /// Write has no effect in the current state
    Ignored,
    /// Session keys issued; payload is the RSA envelope
    KeyIssued(Bytes),
    /// Key submission completed by an already authenticated device
    AlreadyAuthenticated,
    /// Confirmation matched; payload is the encrypted reply
    Authenticated(Bytes),
}

/// Feed a `key_transfer` fragment to the session
pub fn on_public_key_fragment(
    session: &mut DeviceSession,
    frame: &Frame,
) -> Result<Outcome, HandshakeError> {
    match session.state() {
        HandshakeState::Authenticated => {
            // One reply per resubmitted value, not one per fragment
            if frame.marker.completes_value() {
                Ok(Outcome::AlreadyAuthenticated)
            } else {
                Ok(Outcome::Ignored)
            }
        }
        HandshakeState::KeyIssued if frame.marker.starts_value() => {
            debug!(
                device = session.device_id().as_str(),
                "Key submission restarted, superseding issued session"
            );
            session.reset();
            collect_public_key(session, frame)
        }
        HandshakeState::KeyIssued => Err(HandshakeError::UnexpectedState {
            characteristic: Characteristic::KeyTransfer,
            state: HandshakeState::KeyIssued,
        }),
        HandshakeState::CollectingPublicKey => collect_public_key(session, frame),
    }
}

fn collect_public_key(
    session: &mut DeviceSession,
    frame: &Frame,
) -> Result<Outcome, HandshakeError> {
    let Some(assembled) = session.key_buf.push(frame)? else {
        trace!(
            device = session.device_id().as_str(),
            buffered = session.key_buf.buffered_len(),
            "Buffered key fragment"
        );
        return Ok(Outcome::Buffering);
    };

    let public_key = parse_public_key(&assembled.value).map_err(HandshakeError::KeyIssue)?;
    let keys = generate_key_and_iv().map_err(HandshakeError::KeyIssue)?;

    let envelope = KeyEnvelope::new(base64_encode(keys.key()), base64_encode(keys.iv()));
    let plaintext = Zeroizing::new(envelope.to_plaintext());
    let ciphertext =
        rsa_encrypt(&public_key, plaintext.as_bytes()).map_err(HandshakeError::KeyIssue)?;

    if !session.install_keys(keys) {
        return Err(HandshakeError::UnexpectedState {
            characteristic: Characteristic::KeyTransfer,
            state: session.state(),
        });
    }
    session.transition(
        &[HandshakeState::CollectingPublicKey],
        HandshakeState::KeyIssued,
    );

    Ok(Outcome::KeyIssued(Bytes::from(ciphertext)))
}

/// Feed a `test_key` fragment to the session
pub fn on_confirmation_fragment(
    session: &mut DeviceSession,
    frame: &Frame,
) -> Result<Outcome, HandshakeError> {
    let state = session.state();
    if state != HandshakeState::KeyIssued {
        return Err(HandshakeError::UnexpectedState {
            characteristic: Characteristic::TestKey,
            state,
        });
    }

    let Some(assembled) = session.confirm_buf.push(frame)? else {
        return Ok(Outcome::Buffering);
    };
    let body = ConfirmationBody::from_assembled(&assembled)?;

    let Some(keys) = session.keys() else {
        return Err(HandshakeError::UnexpectedState {
            characteristic: Characteristic::TestKey,
            state,
        });
    };

    let ciphertext = base64_decode(&body.ciphertext_b64).map_err(HandshakeError::Confirmation)?;
    let plaintext = aes_ctr_decrypt(keys.key(), keys.iv(), body.declared_len, &ciphertext)
        .map_err(HandshakeError::Confirmation)?;
    if plaintext != CONFIRMATION_PLAINTEXT {
        return Err(HandshakeError::Mismatch);
    }

    // Same key and IV as the client's confirmation
    let reply = aes_ctr_encrypt(keys.key(), keys.iv(), CONFIRMATION_REPLY)
        .map_err(HandshakeError::Confirmation)?;
    session.transition(&[HandshakeState::KeyIssued], HandshakeState::Authenticated);

    Ok(Outcome::Authenticated(Bytes::from(reply)))
}
