//! # Frame Wire Format Module
//!
//! Fixed protocol constants, the 8-bit additive checksum and the validated
//! `Frame` type produced by the decoder.
//!
//! ## Wire Layout
//! ```text
//! +------+------+--------+---------------------------+----------+
//! | 0xAA | 0x55 | length | payload (40 x u16 LE)     | checksum |
//! +------+------+--------+---------------------------+----------+
//!   header (2)    1 byte   80 bytes                    1 byte
//! ```
//! `length` must be exactly 80. `checksum` is the modulo-256 sum of the
//! payload bytes.

/// Two-byte frame header
pub const FRAME_HEADER: [u8; 2] = [0xAA, 0x55];

/// Samples carried by one frame
pub const SAMPLES_PER_FRAME: usize = 40;

/// Bytes per sample (16-bit little-endian)
pub const SAMPLE_WIDTH: usize = 2;

/// Payload length in bytes, also the only accepted value of the length byte
pub const PAYLOAD_LEN: usize = SAMPLES_PER_FRAME * SAMPLE_WIDTH;

/// Total encoded frame size: header, length, payload, checksum
pub const FRAME_LEN: usize = FRAME_HEADER.len() + 1 + PAYLOAD_LEN + 1;

/// Device sampling rate
pub const SAMPLE_RATE_HZ: f64 = 200.0;

/// Largest raw count of the 12-bit ADC
pub const ADC_MAX_COUNT: u16 = 4095;

/// ADC reference voltage
pub const ADC_REFERENCE_VOLTS: f64 = 3.3;

/// Modulo-256 sum of all payload bytes
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Returns true if `received` matches the checksum of `payload`
pub fn verify(payload: &[u8], received: u8) -> bool {
    checksum(payload) == received
}

/// One checksum-validated batch of samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    samples: [u16; SAMPLES_PER_FRAME],
}

impl Frame {
    /// Decode a full payload into little-endian samples.
    ///
    /// Only called by the decoder once the checksum has matched.
    pub(crate) fn from_payload(payload: &[u8; PAYLOAD_LEN]) -> Self {
        let mut samples = [0u16; SAMPLES_PER_FRAME];
        for (sample, bytes) in samples.iter_mut().zip(payload.chunks_exact(SAMPLE_WIDTH)) {
            *sample = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
}

/// Build a complete wire frame around `samples`
pub fn encode_frame(samples: &[u16; SAMPLES_PER_FRAME]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_LEN);
    out.extend_from_slice(&FRAME_HEADER);
    out.push(PAYLOAD_LEN as u8);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    let sum = checksum(&out[FRAME_HEADER.len() + 1..]);
    out.push(sum);
    out
}
