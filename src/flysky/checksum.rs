//! # FlySky Frame Checksum
//!
//! Additive checksum used by every FlySky frame.
//!
//! **Algorithm**: sum of all un-escaped body bytes modulo 256, transmitted as
//! its bitwise complement.

/// Running checksum over the body bytes of a frame being built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checksum {
    sum: u8,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pre-escaping body byte
    pub fn update(&mut self, byte: u8) {
        self.sum = self.sum.wrapping_add(byte);
    }

    /// The byte to transmit (one's complement of the running sum)
    pub fn value(&self) -> u8 {
        self.sum ^ 0xFF
    }

    pub fn reset(&mut self) {
        self.sum = 0;
    }
}

/// Calculate the transmitted checksum byte for a body slice
///
/// # Arguments
///
/// * `data` - Un-escaped body bytes (frame index, type, command, payload)
///
/// # Examples
///
/// ```
/// use flysky_link::flysky::checksum::checksum;
///
/// assert_eq!(checksum(&[0x01, 0x01, 0x01]), 0xFC);
/// ```
pub fn checksum(data: &[u8]) -> u8 {
    let mut acc = Checksum::new();
    for &byte in data {
        acc.update(byte);
    }
    acc.value()
}

/// Verify the checksum byte stored right after the first `span` body bytes
///
/// Returns false when `body` is too short to hold `span` bytes plus the
/// checksum, so a truncated frame never validates.
pub fn verify_checksum(body: &[u8], span: usize) -> bool {
    match body.get(span) {
        Some(&received) => checksum(&body[..span]) == received,
        None => false,
    }
}
