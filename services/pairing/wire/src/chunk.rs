//! Fragmentation and reassembly of logical values.
//!
//! BLE writes are limited by the negotiated ATT MTU, so clients split a value
//! across several writes. [`Chunker`] produces those writes and
//! [`Reassembler`] is the per-field accumulation buffer on the receiving side.

use crate::error::WireError;
use crate::frame::{len_tag, DeviceId, FragmentMarker, Frame, END_MARKER, FRAME_PREFIX_LEN, START_MARKER};
use bytes::{Bytes, BytesMut};

/// Default cap on a reassembled value (8 KiB)
pub const DEFAULT_MAX_VALUE_SIZE: usize = 8 * 1024;

/// Default write size: the largest ATT attribute value
pub const DEFAULT_MAX_WRITE_SIZE: usize = 512;

/// Chunker for splitting values into transport writes
#[derive(Debug, Clone)]
pub struct Chunker {
    max_write: usize,
}

impl Chunker {
    /// Create a chunker producing writes of at most `max_write` bytes
    pub fn new(max_write: usize) -> Self {
        Self { max_write }
    }

    /// Split a value into as few writes as the write size allows
    pub fn chunk_value(
        &self,
        device_id: &DeviceId,
        value: &[u8],
        declared_len: Option<usize>,
    ) -> Result<Vec<Bytes>, WireError> {
        let tag_len = declared_len.map(|n| len_tag(n).len()).unwrap_or(0);
        // Worst case: a single write carrying both markers and the tag
        let overhead = FRAME_PREFIX_LEN + START_MARKER.len() + tag_len + END_MARKER.len();
        if self.max_write <= overhead {
            return Err(WireError::WriteTooSmall(self.max_write));
        }
        let room = self.max_write - overhead;
        let pieces = value.len().div_ceil(room).max(1);
        Ok(self.frames(device_id, value, declared_len, pieces))
    }

    /// Split a value into exactly `pieces` writes (at least one).
    ///
    /// Pieces beyond the value length are empty continuation writes.
    pub fn chunk_into(
        &self,
        device_id: &DeviceId,
        value: &[u8],
        declared_len: Option<usize>,
        pieces: usize,
    ) -> Vec<Bytes> {
        self.frames(device_id, value, declared_len, pieces.max(1))
    }

    /// Split a value at the given byte offsets.
    ///
    /// Offsets are clamped to the value length and sorted, so `cuts.len()`
    /// offsets always give `cuts.len() + 1` writes, some possibly empty.
    pub fn chunk_at(
        &self,
        device_id: &DeviceId,
        value: &[u8],
        declared_len: Option<usize>,
        cuts: &[usize],
    ) -> Vec<Bytes> {
        let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(value.len())).collect();
        cuts.sort_unstable();
        frames_at(device_id, value, declared_len, &cuts)
    }

    fn frames(
        &self,
        device_id: &DeviceId,
        value: &[u8],
        declared_len: Option<usize>,
        pieces: usize,
    ) -> Vec<Bytes> {
        let step = value.len().div_ceil(pieces).max(1);
        let cuts: Vec<usize> = (1..pieces)
            .map(|no| std::cmp::min(no * step, value.len()))
            .collect();
        frames_at(device_id, value, declared_len, &cuts)
    }
}

fn frames_at(
    device_id: &DeviceId,
    value: &[u8],
    declared_len: Option<usize>,
    cuts: &[usize],
) -> Vec<Bytes> {
    let pieces = cuts.len() + 1;
    let mut writes = Vec::with_capacity(pieces);
    let mut offset = 0;

    for no in 0..pieces {
        let end = cuts.get(no).copied().unwrap_or(value.len());
        let chunk = Bytes::copy_from_slice(&value[offset..end]);

        let marker = match (no == 0, no == pieces - 1) {
            (true, true) => FragmentMarker::Whole,
            (true, false) => FragmentMarker::Start,
            (false, true) => FragmentMarker::End,
            (false, false) => FragmentMarker::Continuation,
        };

        let mut frame = Frame::new(device_id.clone(), marker, chunk);
        if no == 0 {
            if let Some(len) = declared_len {
                frame = frame.with_declared_len(len);
            }
        }
        writes.push(frame.encode());
        offset = end;
    }

    writes
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WRITE_SIZE)
    }
}

/// A completed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    /// Concatenated fragment payloads
    pub value: Bytes,
    /// Length tag captured from the opening fragment
    pub declared_len: Option<usize>,
}

/// Accumulation buffer for one field of one device
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    declared_len: Option<usize>,
    max_value: usize,
}

impl Reassembler {
    /// Create a reassembler bounded to `max_value` bytes
    pub fn new(max_value: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            declared_len: None,
            max_value,
        }
    }

    /// Add a fragment and potentially return the complete value.
    ///
    /// An opening fragment discards whatever was buffered before. Exceeding
    /// the cap discards the partial value and reports [`WireError::Size`].
    pub fn push(&mut self, frame: &Frame) -> Result<Option<Assembled>, WireError> {
        if frame.marker.starts_value() {
            self.reset();
            self.declared_len = frame.declared_len;
        }

        let total = self.buf.len() + frame.payload.len();
        if total > self.max_value {
            self.reset();
            return Err(WireError::Size(total));
        }
        self.buf.extend_from_slice(&frame.payload);

        if frame.marker.completes_value() {
            let value = self.buf.split().freeze();
            return Ok(Some(Assembled {
                value,
                declared_len: self.declared_len.take(),
            }));
        }

        Ok(None)
    }

    /// Drop any partial value
    pub fn reset(&mut self) {
        self.buf.clear();
        self.declared_len = None;
    }

    /// Bytes currently buffered
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_SIZE)
    }
}
