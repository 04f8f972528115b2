//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer too short to carry a device identifier and separator
    #[error("frame too short: {0} bytes")]
    Short(usize),

    /// Separator positions of the device identifier do not match
    #[error("device identifier shape invalid")]
    DeviceId,

    /// Identifier carries non-ASCII bytes
    #[error("device identifier not ascii")]
    NotAscii,

    /// `[len:` tag without a closing bracket or with a non-decimal value
    #[error("malformed length tag")]
    LengthTag,

    /// Confirmation value carries no `[len:N]` tag
    #[error("missing length tag")]
    MissingLengthTag,

    /// Accumulated value exceeds the configured cap
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Write size leaves no room for payload after framing overhead
    #[error("write size {0} too small for framing")]
    WriteTooSmall(usize),
}
