//! # FlySky Frame Encoder
//!
//! Builds escaped, checksummed frames into a fixed-capacity buffer owned by the
//! engine, so producing a frame every output period never allocates.

use super::checksum::Checksum;
use super::protocol::*;

/// One body byte after escaping (1 or 2 wire bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapedByte {
    bytes: [u8; 2],
    len: usize,
}

impl EscapedByte {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Escape a single body byte
///
/// # Examples
///
/// ```
/// use flysky_link::flysky::encoder::escape_byte;
///
/// assert_eq!(escape_byte(0x42).as_slice(), &[0x42]);
/// assert_eq!(escape_byte(0xC0).as_slice(), &[0xDB, 0xDC]);
/// assert_eq!(escape_byte(0xDB).as_slice(), &[0xDB, 0xDD]);
/// ```
pub fn escape_byte(byte: u8) -> EscapedByte {
    match byte {
        FRAME_DELIMITER => EscapedByte { bytes: [FRAME_ESCAPE, ESCAPED_DELIMITER], len: 2 },
        FRAME_ESCAPE => EscapedByte { bytes: [FRAME_ESCAPE, ESCAPED_ESCAPE], len: 2 },
        _ => EscapedByte { bytes: [byte, 0], len: 1 },
    }
}

/// Outbound frame under construction
///
/// Usage per frame: [`begin`](Self::begin), any number of
/// [`put_byte`](Self::put_byte) calls, then [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    buffer: [u8; OUTBOUND_BUFFER_SIZE],
    len: usize,
    checksum: Checksum,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; OUTBOUND_BUFFER_SIZE],
            len: 0,
            checksum: Checksum::new(),
        }
    }

    /// Discard the frame under construction
    pub fn clear(&mut self) {
        self.len = 0;
        self.checksum.reset();
    }

    /// Start a new frame: opening delimiter followed by the frame index
    pub fn begin(&mut self, frame_index: u8) {
        self.clear();
        self.put_head();
        self.put_byte(frame_index);
    }

    pub fn put_head(&mut self) {
        self.push_raw(FRAME_DELIMITER);
    }

    /// Append one body byte, escaped, and add it to the running checksum
    pub fn put_byte(&mut self, byte: u8) {
        self.checksum.update(byte);
        self.put_escaped(byte);
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put_byte(byte);
        }
    }

    pub fn put_u16_le(&mut self, value: u16) {
        self.put_slice(&value.to_le_bytes());
    }

    pub fn put_u32_le(&mut self, value: u32) {
        self.put_slice(&value.to_le_bytes());
    }

    /// Append the checksum byte; it is escaped but not accumulated
    pub fn put_checksum(&mut self) {
        let value = self.checksum.value();
        self.put_escaped(value);
    }

    pub fn put_tail(&mut self) {
        self.push_raw(FRAME_DELIMITER);
    }

    /// Close the frame: checksum then closing delimiter
    pub fn finish(&mut self) {
        self.put_checksum();
        self.put_tail();
    }

    /// Wire bytes written so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn put_escaped(&mut self, byte: u8) {
        let escaped = escape_byte(byte);
        for &wire in escaped.as_slice() {
            self.push_raw(wire);
        }
    }

    fn push_raw(&mut self, byte: u8) {
        // Capacity covers the largest command, so this only trips on a builder bug.
        debug_assert!(self.len < OUTBOUND_BUFFER_SIZE, "outbound frame overflow");
        if let Some(slot) = self.buffer.get_mut(self.len) {
            *slot = byte;
            self.len += 1;
        }
    }
}

/// Encode a complete frame from an un-escaped body (checksum excluded)
///
/// Allocates; meant for tooling and tests rather than the per-tick path.
///
/// # Examples
///
/// ```
/// use flysky_link::flysky::encoder::encode_frame;
///
/// let frame = encode_frame(&[0x01, 0x01, 0x01]);
/// assert_eq!(frame, vec![0xC0, 0x01, 0x01, 0x01, 0xFC, 0xC0]);
/// ```
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut checksum = Checksum::new();
    let mut frame = Vec::with_capacity(2 * body.len() + 4);
    frame.push(FRAME_DELIMITER);
    for &byte in body {
        checksum.update(byte);
        frame.extend_from_slice(escape_byte(byte).as_slice());
    }
    frame.extend_from_slice(escape_byte(checksum.value()).as_slice());
    frame.push(FRAME_DELIMITER);
    frame
}
