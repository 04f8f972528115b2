//! Frame parsing for single transport writes.
//!
//! Every write on a pairing characteristic starts with the 36-character device
//! identifier supplied by the client, followed by a colon. The remainder is one
//! fragment of a logical value, optionally opened by `[START]` and optionally
//! closed by `[END]`.

use crate::error::WireError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Length of the device identifier prefix
pub const DEVICE_ID_LEN: usize = 36;

/// Offset of the `:` separating the identifier from the fragment
pub const SEPARATOR_OFFSET: usize = DEVICE_ID_LEN;

/// Bytes consumed by `<deviceID>:`
pub const FRAME_PREFIX_LEN: usize = DEVICE_ID_LEN + 1;

/// Offsets that must hold `-` in a device identifier
const DASH_OFFSETS: [usize; 3] = [8, 13, 18];

/// Opens a logical value and resets any partial accumulation
pub const START_MARKER: &[u8] = b"[START]";
/// Closes a logical value
pub const END_MARKER: &[u8] = b"[END]";
/// Prefix of the inline declared-length tag, `[len:<N>]`
pub const LEN_TAG_PREFIX: &[u8] = b"[len:";

/// Client-supplied device identifier (UUID-shaped, 36 ASCII characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate the fixed separator positions and build an identifier.
    ///
    /// Only the dashes at offsets 8, 13 and 18 are checked, matching what
    /// deployed clients are known to send.
    pub fn parse(raw: &[u8]) -> Result<Self, WireError> {
        if raw.len() != DEVICE_ID_LEN {
            return Err(WireError::Short(raw.len()));
        }
        if DASH_OFFSETS.iter().any(|&i| raw[i] != b'-') {
            return Err(WireError::DeviceId);
        }
        if !raw.is_ascii() {
            return Err(WireError::NotAscii);
        }
        // ASCII was checked above, so this cannot lose data
        Ok(Self(String::from_utf8_lossy(raw).into_owned()))
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for DeviceId {
    type Error = WireError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value.as_bytes())
    }
}

/// Position of a fragment within its logical value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMarker {
    /// Carries `[START]` only
    Start,
    /// Carries neither marker
    Continuation,
    /// Carries `[END]` only
    End,
    /// Carries both markers: the whole value in one write
    Whole,
}

impl FragmentMarker {
    fn from_markers(start: bool, end: bool) -> Self {
        match (start, end) {
            (true, true) => Self::Whole,
            (true, false) => Self::Start,
            (false, true) => Self::End,
            (false, false) => Self::Continuation,
        }
    }

    /// Whether this fragment discards any partial value before appending
    pub fn starts_value(self) -> bool {
        matches!(self, Self::Start | Self::Whole)
    }

    /// Whether this fragment completes the value
    pub fn completes_value(self) -> bool {
        matches!(self, Self::End | Self::Whole)
    }
}

/// Parsed view of one transport write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Device the write belongs to
    pub device_id: DeviceId,
    /// Fragment position
    pub marker: FragmentMarker,
    /// Fragment bytes with markers and length tag removed
    pub payload: Bytes,
    /// Value of a leading `[len:N]` tag, if any
    pub declared_len: Option<usize>,
}

impl Frame {
    /// Create a frame with no declared length
    pub fn new(device_id: DeviceId, marker: FragmentMarker, payload: Bytes) -> Self {
        Self {
            device_id,
            marker,
            payload,
            declared_len: None,
        }
    }

    /// Set the declared length emitted as `[len:N]`
    pub fn with_declared_len(mut self, len: usize) -> Self {
        self.declared_len = Some(len);
        self
    }

    /// Get the encoded size of this frame
    pub fn encoded_size(&self) -> usize {
        let mut size = FRAME_PREFIX_LEN + self.payload.len();
        if self.marker.starts_value() {
            size += START_MARKER.len();
        }
        if let Some(len) = self.declared_len {
            size += len_tag(len).len();
        }
        if self.marker.completes_value() {
            size += END_MARKER.len();
        }
        size
    }

    /// Encode the frame as a transport write
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_size());

        buf.put_slice(self.device_id.as_str().as_bytes());
        buf.put_u8(b':');

        if self.marker.starts_value() {
            buf.put_slice(START_MARKER);
        }
        if let Some(len) = self.declared_len {
            buf.put_slice(len_tag(len).as_bytes());
        }

        buf.put_slice(&self.payload);

        if self.marker.completes_value() {
            buf.put_slice(END_MARKER);
        }

        buf.freeze()
    }
}

pub(crate) fn len_tag(len: usize) -> String {
    format!("[len:{len}]")
}

/// Locate `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split a leading `[len:N]` tag off `body`.
///
/// Returns `Ok(None)` when `body` does not start with the tag prefix, or when
/// the tag is not closed within `body`: a write may end inside the tag, and
/// the rest arrives with the next fragment.
pub(crate) fn split_len_tag(body: &[u8]) -> Result<Option<(usize, &[u8])>, WireError> {
    let Some(rest) = body.strip_prefix(LEN_TAG_PREFIX) else {
        return Ok(None);
    };
    let Some(close) = rest.iter().position(|&b| b == b']') else {
        return Ok(None);
    };
    let digits = &rest[..close];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(WireError::LengthTag);
    }
    let len = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(WireError::LengthTag)?;
    Ok(Some((len, &rest[close + 1..])))
}

/// Frame decoder for parsing inbound writes
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self
    }

    /// Decode one write.
    ///
    /// `[START]` is recognised only directly after the separator. The first
    /// `[END]` closes the fragment and anything after it is discarded. A
    /// `[len:N]` tag is recognised at the head of an opening fragment.
    pub fn decode(&self, raw: &[u8]) -> Result<Frame, WireError> {
        if raw.len() < FRAME_PREFIX_LEN {
            return Err(WireError::Short(raw.len()));
        }
        if raw[SEPARATOR_OFFSET] != b':' {
            return Err(WireError::DeviceId);
        }
        let device_id = DeviceId::parse(&raw[..DEVICE_ID_LEN])?;

        let mut body = &raw[FRAME_PREFIX_LEN..];

        let start = body.starts_with(START_MARKER);
        if start {
            body = &body[START_MARKER.len()..];
        }

        let end = match find(body, END_MARKER) {
            Some(pos) => {
                if pos + END_MARKER.len() < body.len() {
                    tracing::trace!(
                        "Discarding {} bytes after [END] from {}",
                        body.len() - pos - END_MARKER.len(),
                        device_id
                    );
                }
                body = &body[..pos];
                true
            }
            None => false,
        };

        let marker = FragmentMarker::from_markers(start, end);

        let mut declared_len = None;
        if marker.starts_value() {
            if let Some((len, rest)) = split_len_tag(body)? {
                declared_len = Some(len);
                body = rest;
            }
        }

        Ok(Frame {
            device_id,
            marker,
            payload: Bytes::copy_from_slice(body),
            declared_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV: &str = "11111111-2222-3333-4444-555555555555";

    fn write(body: &str) -> Vec<u8> {
        format!("{DEV}:{body}").into_bytes()
    }

    #[test]
    fn test_device_id_shape() {
        assert!(DeviceId::try_from(DEV).is_ok());
        assert_eq!(
            DeviceId::try_from("111111112222-3333-4444-5555555555555"),
            Err(WireError::DeviceId)
        );
        assert_eq!(DeviceId::try_from("short"), Err(WireError::Short(5)));
    }

    #[test]
    fn test_decode_markers() {
        let decoder = FrameDecoder::new();

        let frame = decoder.decode(&write("[START]abc")).unwrap();
        assert_eq!(frame.marker, FragmentMarker::Start);
        assert_eq!(frame.payload.as_ref(), b"abc");
        assert_eq!(frame.device_id.as_str(), DEV);

        let frame = decoder.decode(&write("def")).unwrap();
        assert_eq!(frame.marker, FragmentMarker::Continuation);

        let frame = decoder.decode(&write("ghi[END]")).unwrap();
        assert_eq!(frame.marker, FragmentMarker::End);
        assert_eq!(frame.payload.as_ref(), b"ghi");

        let frame = decoder.decode(&write("[START]xyz[END]")).unwrap();
        assert_eq!(frame.marker, FragmentMarker::Whole);
        assert_eq!(frame.payload.as_ref(), b"xyz");
    }

    #[test]
    fn test_decode_discards_after_end() {
        let frame = FrameDecoder::new().decode(&write("abc[END]junk")).unwrap();
        assert_eq!(frame.marker, FragmentMarker::End);
        assert_eq!(frame.payload.as_ref(), b"abc");
    }

    #[test]
    fn test_start_only_recognised_at_head() {
        let frame = FrameDecoder::new().decode(&write("ab[START]cd")).unwrap();
        assert_eq!(frame.marker, FragmentMarker::Continuation);
        assert_eq!(frame.payload.as_ref(), b"ab[START]cd");
    }

    #[test]
    fn test_decode_len_tag() {
        let frame = FrameDecoder::new()
            .decode(&write("[START][len:9]AAAA[END]"))
            .unwrap();
        assert_eq!(frame.declared_len, Some(9));
        assert_eq!(frame.payload.as_ref(), b"AAAA");

        assert_eq!(
            FrameDecoder::new().decode(&write("[START][len:x9]AAAA[END]")),
            Err(WireError::LengthTag)
        );
    }

    #[test]
    fn test_unclosed_len_tag_is_payload() {
        let decoder = FrameDecoder::new();
        for body in ["[START][len:", "[START][len:9", "[START][len:9AAAA"] {
            let frame = decoder.decode(&write(body)).unwrap();
            assert_eq!(frame.marker, FragmentMarker::Start);
            assert_eq!(frame.declared_len, None);
            assert_eq!(frame.payload.as_ref(), body[7..].as_bytes());
        }
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let decoder = FrameDecoder::new();
        assert_eq!(decoder.decode(b"too short"), Err(WireError::Short(9)));

        let mut raw = write("[START]abc");
        raw[36] = b';';
        assert_eq!(decoder.decode(&raw), Err(WireError::DeviceId));

        let mut raw = write("[START]abc");
        raw[13] = b'x';
        assert_eq!(decoder.decode(&raw), Err(WireError::DeviceId));

        let mut raw = write("[START]abc");
        raw[0] = 0xC3;
        assert_eq!(decoder.decode(&raw), Err(WireError::NotAscii));
    }

    #[test]
    fn test_encode_decode() {
        let id = DeviceId::try_from(DEV).unwrap();
        let frame = Frame::new(id, FragmentMarker::Whole, Bytes::from_static(b"cipher"))
            .with_declared_len(6);

        let bytes = frame.encode();
        assert_eq!(bytes.len(), frame.encoded_size());
        assert_eq!(
            bytes.as_ref(),
            format!("{DEV}:[START][len:6]cipher[END]").as_bytes()
        );
        assert_eq!(FrameDecoder::new().decode(&bytes).unwrap(), frame);
    }
}
