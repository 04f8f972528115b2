//! GATT characteristics and the outbound notification seam.

use crate::error::UnknownCharacteristic;
use bytes::Bytes;
use pairing_wire::DeviceId;
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Characteristics the pairing service is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    /// Public key in, RSA key envelope out
    KeyTransfer,
    /// Encrypted confirmation in, encrypted reply out
    TestKey,
    /// Secure service: login
    Login,
    /// Secure service: device identifier confirmation
    ConfirmDeviceId,
    /// Secure service: MAC address
    SendMac,
    /// Secure service: GPS data
    SendGpsData,
    /// Secure service: user information (read only)
    UserInformation,
}

impl Characteristic {
    /// Every characteristic, in registration order
    pub const ALL: [Self; 7] = [
        Self::KeyTransfer,
        Self::TestKey,
        Self::Login,
        Self::ConfirmDeviceId,
        Self::SendMac,
        Self::SendGpsData,
        Self::UserInformation,
    ];

    /// GATT UUID
    pub const fn uuid(self) -> Uuid {
        match self {
            Self::KeyTransfer => Uuid::from_u128(0x00000003_1e3c_fad4_74e2_97a033f1bfaa),
            Self::TestKey => Uuid::from_u128(0x00000004_1e3c_fad4_74e2_97a033f1bfaa),
            Self::Login => Uuid::from_u128(0x00000002_1e3d_fad4_74e2_97a033f1bfee),
            Self::ConfirmDeviceId => Uuid::from_u128(0x00000003_1e3d_fad4_74e2_97a033f1bfee),
            Self::SendMac => Uuid::from_u128(0x00000004_1e3d_fad4_74e2_97a033f1bfee),
            Self::SendGpsData => Uuid::from_u128(0x00000005_1e3d_fad4_74e2_97a033f1bfee),
            Self::UserInformation => Uuid::from_u128(0x00000006_1e3c_fad4_74e2_97a033f1bfaa),
        }
    }

    /// Look up a characteristic by UUID
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == *uuid)
    }

    /// Whether writes drive the pairing handshake
    pub fn is_handshake(self) -> bool {
        matches!(self, Self::KeyTransfer | Self::TestKey)
    }

    /// Whether the characteristic accepts writes
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::UserInformation)
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeyTransfer => "key_transfer",
            Self::TestKey => "test_key",
            Self::Login => "login",
            Self::ConfirmDeviceId => "confirm_device_id",
            Self::SendMac => "send_mac",
            Self::SendGpsData => "send_gps_data",
            Self::UserInformation => "user_information",
        };
        f.write_str(name)
    }
}

impl FromStr for Characteristic {
    type Err = UnknownCharacteristic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .ok()
            .and_then(|uuid| Self::from_uuid(&uuid))
            .ok_or_else(|| UnknownCharacteristic(s.to_string()))
    }
}

/// One outbound notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Characteristic the value is notified on
    pub characteristic: Characteristic,
    /// Device the notification is addressed to
    pub device_id: DeviceId,
    /// Raw characteristic value, sent verbatim
    pub payload: Bytes,
}

/// Outbound notification primitive.
///
/// Delivery is fire-and-forget: implementations must not block and report
/// nothing back to the handshake.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Notify `payload` to `device_id` on `characteristic`
    fn send_notification(&self, characteristic: Characteristic, device_id: &DeviceId, payload: Bytes);
}

/// Notifier that forwards notifications into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn send_notification(&self, characteristic: Characteristic, device_id: &DeviceId, payload: Bytes) {
        let notification = Notification {
            characteristic,
            device_id: device_id.clone(),
            payload,
        };
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped, discarding {} notification", characteristic);
        }
    }
}
