//! # FlySky Stream Decoder
//!
//! Reassembles inbound frames one byte at a time. The accumulator keeps the
//! opening delimiter as its first byte so the reply parser can reject
//! fragments that started mid-frame.

use super::protocol::*;
use tracing::trace;

/// Inbound frame accumulator with escape handling
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buffer: [u8; INBOUND_BUFFER_SIZE],
    len: usize,
    escape_pending: bool,
    overflow_count: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: [0u8; INBOUND_BUFFER_SIZE],
            len: 0,
            escape_pending: false,
            overflow_count: 0,
        }
    }

    /// Feed one raw byte
    ///
    /// # Returns
    ///
    /// * `Some(frame)` - A completed frame (opening delimiter included, closing
    ///   delimiter excluded) when `byte` is a closing delimiter
    /// * `None` - Otherwise
    ///
    /// The returned slice stays valid until the next call.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == FRAME_DELIMITER && self.len > 0 {
            let complete = self.len;
            self.len = 0;
            self.escape_pending = false;
            return Some(&self.buffer[..complete]);
        }

        if byte == FRAME_ESCAPE {
            self.escape_pending = true;
            return None;
        }

        let value = if self.escape_pending {
            self.escape_pending = false;
            match byte {
                ESCAPED_DELIMITER => FRAME_DELIMITER,
                ESCAPED_ESCAPE => FRAME_ESCAPE,
                other => other,
            }
        } else {
            byte
        };

        self.buffer[self.len] = value;
        self.len += 1;

        if self.len >= INBOUND_BUFFER_SIZE {
            self.len = 0;
            self.overflow_count = self.overflow_count.wrapping_add(1);
            trace!("Inbound buffer overflow, partial frame dropped");
        }

        None
    }

    /// Feed a chunk of raw bytes and collect every completed frame
    ///
    /// Allocating convenience over [`push`](Self::push).
    pub fn decode_stream(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Some(frame) = self.push(byte) {
                frames.push(frame.to_vec());
            }
        }
        frames
    }

    /// Drop any partial frame and pending escape
    pub fn reset(&mut self) {
        self.len = 0;
        self.escape_pending = false;
    }

    /// Bytes currently accumulated
    pub fn pending_len(&self) -> usize {
        self.len
    }

    pub fn is_escape_pending(&self) -> bool {
        self.escape_pending
    }

    /// Number of partial frames discarded because the buffer filled up
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flysky::encoder::encode_frame;

    #[test]
    fn test_decode_single_frame() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode_stream(&[0xC0, 0x01, 0x10, 0x01, 0x01, 0xEC, 0xC0]);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], vec![0xC0, 0x01, 0x10, 0x01, 0x01, 0xEC]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decode_unescapes() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode_stream(&[0xC0, 0xDB, 0xDC, 0xDB, 0xDD, 0xC0]);

        assert_eq!(frames, vec![vec![0xC0, 0xC0, 0xDB]]);
    }

    #[test]
    fn test_decode_unknown_escape_keeps_byte() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode_stream(&[0xC0, 0xDB, 0x42, 0xC0]);

        assert_eq!(frames, vec![vec![0xC0, 0x42]]);
    }

    #[test]
    fn test_decode_back_to_back_frames() {
        let mut stream = encode_frame(&[0x01, 0x10, 0x0D]);
        stream.extend(encode_frame(&[0x02, 0x10, 0x03]));

        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode_stream(&stream);
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][1..4], &[0x01, 0x10, 0x0D]);
        assert_eq!(&frames[1][1..4], &[0x02, 0x10, 0x03]);
    }

    #[test]
    fn test_decode_split_across_chunks() {
        let stream = encode_frame(&[0x05, 0x10, 0x06, 0x00, 0x34, 0x12]);
        let (first, second) = stream.split_at(4);

        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode_stream(first).is_empty());
        let frames = decoder.decode_stream(second);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_escape_round_trip() {
        let bodies: [&[u8]; 4] = [
            &[0x01, 0x02, 0x03],
            &[0xC0, 0xC0, 0xDB, 0xDB],
            &[0xDB, 0xDC, 0xDD, 0xC0],
            &[0x00, 0xFF, 0x7E, 0xC1],
        ];

        for body in bodies {
            let mut decoder = FrameDecoder::new();
            let frames = decoder.decode_stream(&encode_frame(body));
            assert_eq!(frames.len(), 1);
            // Leading delimiter, body, then checksum
            assert_eq!(&frames[0][1..=body.len()], body, "Round trip failed for {:02X?}", body);
        }
    }

    #[test]
    fn test_overflow_resets_accumulator() {
        let mut decoder = FrameDecoder::new();
        let noise = vec![0x55u8; INBOUND_BUFFER_SIZE + 10];

        let frames = decoder.decode_stream(&noise);
        assert!(frames.is_empty());
        assert_eq!(decoder.overflow_count(), 1);
        assert_eq!(decoder.pending_len(), 10);

        // The tail of the noise is discarded by the next delimiter...
        let frames = decoder.decode_stream(&[0xC0]);
        assert_eq!(frames.len(), 1);
        assert_ne!(frames[0][0], FRAME_DELIMITER);

        // ...and the following frame decodes cleanly
        let frames = decoder.decode_stream(&encode_frame(&[0x01, 0x10, 0x03]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], FRAME_DELIMITER);
    }

    #[test]
    fn test_overflow_exactly_at_capacity() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode_stream(&vec![0x11u8; INBOUND_BUFFER_SIZE]);
        assert!(frames.is_empty());
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.overflow_count(), 1);
    }

    #[test]
    fn test_delimiter_clears_pending_escape() {
        let mut decoder = FrameDecoder::new();
        decoder.decode_stream(&[0xC0, 0x01, 0xDB]);
        assert!(decoder.is_escape_pending());

        let frames = decoder.decode_stream(&[0xC0]);
        assert_eq!(frames.len(), 1);
        assert!(!decoder.is_escape_pending());
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.decode_stream(&[0xC0, 0x01, 0x02]);
        decoder.reset();
        assert_eq!(decoder.pending_len(), 0);
    }
}
