//! Pairing service: routes characteristic writes to sessions and handshakes.
//!
//! Every failure is local to the device that caused it. Errors are logged
//! and never reach the transport; the client learns of them only through a
//! missing notification.

use crate::error::{ErrorKind, HandshakeError};
use crate::handshake::{self, Outcome};
use crate::store::{self, LockedSession, SessionStore};
use crate::transport::{Characteristic, Notifier};
use bytes::Bytes;
use pairing_wire::{DeviceId, Frame, FrameDecoder, ALREADY_LOGGED_IN};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Raw write on a secure-service characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationWrite {
    /// Characteristic written
    pub characteristic: Characteristic,
    /// Write bytes, unmodified
    pub payload: Bytes,
}

/// Entry point for characteristic writes
#[derive(Debug)]
pub struct PairingService {
    store: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    decoder: FrameDecoder,
    /// Channel for secure-service writes
    application_tx: Option<mpsc::UnboundedSender<ApplicationWrite>>,
}

impl PairingService {
    /// Create a new pairing service
    pub fn new(store: Arc<SessionStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            decoder: FrameDecoder::new(),
            application_tx: None,
        }
    }

    /// Set the sender for secure-service writes
    pub fn set_application_sender(&mut self, tx: mpsc::UnboundedSender<ApplicationWrite>) {
        self.application_tx = Some(tx);
    }

    /// Session store backing this service
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handle one write on `characteristic`
    pub async fn on_characteristic_write(&self, characteristic: Characteristic, raw: &[u8]) {
        match characteristic {
            Characteristic::KeyTransfer | Characteristic::TestKey => {
                // Malformed writes never reach a session
                let frame = match self.decoder.decode(raw) {
                    Ok(frame) => frame,
                    Err(e) => return log_failure(characteristic, None, &HandshakeError::from(e)),
                };
                if let Err(e) = self.handle_handshake_frame(characteristic, &frame).await {
                    log_failure(characteristic, Some(&frame.device_id), &e);
                }
            }
            c if c.is_writable() => self.forward_application_write(c, raw),
            c => debug!("Dropping write on read-only characteristic {}", c),
        }
    }

    async fn handle_handshake_frame(
        &self,
        characteristic: Characteristic,
        frame: &Frame,
    ) -> Result<(), HandshakeError> {
        let mut session = self.store.lock(&frame.device_id).await;
        session.touch();

        let result = match characteristic {
            Characteristic::KeyTransfer => handshake::on_public_key_fragment(&mut session, frame),
            _ => handshake::on_confirmation_fragment(&mut session, frame),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(e, HandshakeError::KeyIssue(_)) {
                    self.store.discard(&mut session);
                }
                return Err(e);
            }
        };

        self.apply(characteristic, &session, outcome);
        Ok(())
    }

    fn apply(&self, characteristic: Characteristic, session: &LockedSession, outcome: Outcome) {
        let device_id = session.device_id().clone();
        match outcome {
            Outcome::Buffering | Outcome::Ignored => {}
            Outcome::KeyIssued(envelope) => {
                self.store.record_keys_generated();
                info!(device = device_id.as_str(), "Issued session keys");
                self.notifier
                    .send_notification(characteristic, &device_id, envelope);
            }
            Outcome::AlreadyAuthenticated => {
                debug!(device = device_id.as_str(), "Already authenticated");
                self.notifier.send_notification(
                    characteristic,
                    &device_id,
                    Bytes::from_static(ALREADY_LOGGED_IN),
                );
            }
            Outcome::Authenticated(reply) => {
                info!(device = device_id.as_str(), "Authenticated");
                self.notifier
                    .send_notification(characteristic, &device_id, reply);
            }
        }
    }

    fn forward_application_write(&self, characteristic: Characteristic, raw: &[u8]) {
        let Some(tx) = &self.application_tx else {
            debug!("No application channel, dropping {} write", characteristic);
            return;
        };
        let write = ApplicationWrite {
            characteristic,
            payload: Bytes::copy_from_slice(raw),
        };
        if tx.send(write).is_err() {
            warn!("Application channel closed, dropping {} write", characteristic);
        }
    }

    /// Evict idle sessions every `sweep_interval` until the task is dropped
    pub async fn run_sweeper(&self, sweep_interval: Duration, idle_timeout: Duration) {
        store::run_eviction(self.store.clone(), sweep_interval, idle_timeout).await
    }
}

fn log_failure(characteristic: Characteristic, device: Option<&DeviceId>, e: &HandshakeError) {
    let device = device.map(DeviceId::as_str);
    match e.kind() {
        ErrorKind::ProtocolFraming => debug!(device, "Rejected {} write: {}", characteristic, e),
        ErrorKind::CryptoFailure => warn!(device, "Handshake failed on {}: {}", characteristic, e),
        ErrorKind::SessionState => debug!(device, "{}", e),
    }
}
