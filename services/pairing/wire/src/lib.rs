//! Frame codec for the BLE pairing protocol.
//!
//! This crate turns raw characteristic writes into structured frames, bounds
//! and reassembles fragmented values, and knows the textual bodies the
//! handshake exchanges. It performs no cryptography.
//!
//! ## Wire Format
//!
//! ```text
//! +------------------------+--------------------------------------------+
//! | deviceID (36 ASCII)    | dashes at offsets 8, 13, 18                |
//! +------------------------+--------------------------------------------+
//! | ':'                    | offset 36                                  |
//! +------------------------+--------------------------------------------+
//! | "[START]" (opt)        | opens a value, resets partial accumulation |
//! +------------------------+--------------------------------------------+
//! | "[len:<N>]" (opt)      | declared plaintext length, opening only    |
//! +------------------------+--------------------------------------------+
//! | fragment               | variable                                   |
//! +------------------------+--------------------------------------------+
//! | "[END]" (opt)          | closes the value                           |
//! +------------------------+--------------------------------------------+
//! ```
//!
//! Notifications going the other way carry no framing at all: the payload
//! bytes are the characteristic value.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod codec;
pub mod error;
pub mod frame;

// Re-export main types
pub use chunk::{Assembled, Chunker, Reassembler, DEFAULT_MAX_VALUE_SIZE, DEFAULT_MAX_WRITE_SIZE};
pub use codec::{
    ConfirmationBody, KeyEnvelope, ALREADY_LOGGED_IN, CONFIRMATION_PLAINTEXT, CONFIRMATION_REPLY,
};
pub use error::WireError;
pub use frame::{
    DeviceId, FragmentMarker, Frame, FrameDecoder, DEVICE_ID_LEN, END_MARKER, FRAME_PREFIX_LEN,
    LEN_TAG_PREFIX, START_MARKER,
};
