//! Per-device handshake session.

use pairing_crypto::SessionKeys;
use pairing_wire::{DeviceId, Reassembler};
use std::fmt;
use tokio::time::Instant;

/// Handshake progress of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Accumulating the client's PEM public key
    CollectingPublicKey,
    /// Session keys sent, waiting for the encrypted confirmation
    KeyIssued,
    /// Confirmation matched; terminal
    Authenticated,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CollectingPublicKey => "collecting_public_key",
            Self::KeyIssued => "key_issued",
            Self::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// State kept for one device between writes
#[derive(Debug)]
pub struct DeviceSession {
    device_id: DeviceId,
    state: HandshakeState,
    /// Public key accumulation buffer
    pub(crate) key_buf: Reassembler,
    /// Confirmation accumulation buffer
    pub(crate) confirm_buf: Reassembler,
    keys: Option<SessionKeys>,
    max_value_bytes: usize,
    created_at: Instant,
    last_activity: Instant,
    retired: bool,
}

impl DeviceSession {
    /// Create a new session in [`HandshakeState::CollectingPublicKey`]
    pub fn new(device_id: DeviceId, max_value_bytes: usize) -> Self {
        let now = Instant::now();
        Self {
            device_id,
            state: HandshakeState::CollectingPublicKey,
            key_buf: Reassembler::new(max_value_bytes),
            confirm_buf: Reassembler::new(max_value_bytes),
            keys: None,
            max_value_bytes,
            created_at: now,
            last_activity: now,
            retired: false,
        }
    }

    /// Device this session belongs to
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Move to `to` if the current state is one of `from`
    pub fn transition(&mut self, from: &[HandshakeState], to: HandshakeState) -> bool {
        if !from.contains(&self.state) {
            return false;
        }
        tracing::debug!("Session {} {} -> {}", self.device_id, self.state, to);
        self.state = to;
        true
    }

    /// Issued key material, if any
    pub fn keys(&self) -> Option<&SessionKeys> {
        self.keys.as_ref()
    }

    /// Store freshly issued keys. Only valid while collecting the public key.
    pub(crate) fn install_keys(&mut self, keys: SessionKeys) -> bool {
        if self.keys.is_some() || self.state != HandshakeState::CollectingPublicKey {
            return false;
        }
        self.keys = Some(keys);
        true
    }

    /// Record activity for idle eviction
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time of the last write
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Time the session was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Replace this session with a fresh one for the same device.
    ///
    /// Old key material is zeroized as it is dropped.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.device_id.clone(), self.max_value_bytes);
    }

    /// Mark the session dead and drop its key material and buffers
    pub(crate) fn retire(&mut self) {
        self.keys = None;
        self.key_buf.reset();
        self.confirm_buf.reset();
        self.retired = true;
    }

    /// Whether the session was removed from the store
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Read-only view for inspection
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            device_id: self.device_id.clone(),
            state: self.state,
            key_buffered: self.key_buf.buffered_len(),
            confirm_buffered: self.confirm_buf.buffered_len(),
            has_keys: self.keys.is_some(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Point-in-time view of a session without key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Device identifier
    pub device_id: DeviceId,
    /// Handshake state
    pub state: HandshakeState,
    /// Bytes of a partial public key
    pub key_buffered: usize,
    /// Bytes of a partial confirmation
    pub confirm_buffered: usize,
    /// Whether session keys were issued
    pub has_keys: bool,
    /// Creation time
    pub created_at: Instant,
    /// Last write time
    pub last_activity: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pairing_crypto::{IV_LEN, KEY_LEN};

    fn session() -> DeviceSession {
        let id = DeviceId::try_from("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee").unwrap();
        DeviceSession::new(id, 1024)
    }

    #[tokio::test]
    async fn test_transition_compare_and_set() {
        let mut s = session();
        assert!(!s.transition(&[HandshakeState::KeyIssued], HandshakeState::Authenticated));
        assert_eq!(s.state(), HandshakeState::CollectingPublicKey);

        assert!(s.transition(
            &[HandshakeState::CollectingPublicKey],
            HandshakeState::KeyIssued
        ));
        assert_eq!(s.state(), HandshakeState::KeyIssued);
    }

    #[tokio::test]
    async fn test_keys_installed_once() {
        let mut s = session();
        assert!(s.install_keys(SessionKeys::from_parts([1; KEY_LEN], [2; IV_LEN])));
        assert!(!s.install_keys(SessionKeys::from_parts([3; KEY_LEN], [4; IV_LEN])));
        assert_eq!(s.keys().unwrap().key(), &[1; KEY_LEN]);
    }

    #[tokio::test]
    async fn test_reset_and_retire_drop_keys() {
        let mut s = session();
        s.install_keys(SessionKeys::from_parts([1; KEY_LEN], [2; IV_LEN]));
        s.transition(&[HandshakeState::CollectingPublicKey], HandshakeState::KeyIssued);

        s.reset();
        assert_eq!(s.state(), HandshakeState::CollectingPublicKey);
        assert!(s.keys().is_none());

        s.install_keys(SessionKeys::from_parts([1; KEY_LEN], [2; IV_LEN]));
        s.retire();
        assert!(s.is_retired());
        assert!(!s.snapshot().has_keys);
    }
}
