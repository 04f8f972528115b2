//! Device sessions and the pairing handshake.
//!
//! This crate owns per-device state and drives the key exchange that pairs a
//! phone with the device:
//!
//! 1. The phone writes its PEM RSA public key, possibly fragmented, on the
//!    `key_transfer` characteristic.
//! 2. The service generates an AES-256 key and IV, encrypts them to the
//!    phone's key and notifies the envelope on `key_transfer`.
//! 3. The phone proves it recovered the key by writing the AES-CTR
//!    encryption of `Pass back` on `test_key`.
//! 4. On a match the service notifies the encryption of `Received` and the
//!    session becomes authenticated.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pairing_session::{Characteristic, ChannelNotifier, PairingService, SessionStore};
//! use std::sync::Arc;
//!
//! # async fn example(raw_write: &[u8]) {
//! let (notifier, mut notifications) = ChannelNotifier::new();
//! let store = Arc::new(SessionStore::new(8 * 1024));
//! let service = PairingService::new(store, Arc::new(notifier));
//!
//! service
//!     .on_characteristic_write(Characteristic::KeyTransfer, raw_write)
//!     .await;
//!
//! while let Ok(n) = notifications.try_recv() {
//!     println!("{} -> {}: {} bytes", n.characteristic, n.device_id, n.payload.len());
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handshake;
pub mod manager;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types
pub use error::{ErrorKind, HandshakeError, UnknownCharacteristic};
pub use handshake::Outcome;
pub use manager::{ApplicationWrite, PairingService};
pub use session::{DeviceSession, HandshakeState, SessionSnapshot};
pub use store::{
    run_eviction, LockedSession, SessionHandle, SessionStore, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_SWEEP_INTERVAL,
};
pub use transport::{ChannelNotifier, Characteristic, Notification, Notifier};
