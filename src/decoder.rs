//! # Frame Decoder Module
//!
//! Resynchronizing state machine that turns an unbounded, lossy byte stream
//! into checksum-validated `Frame`s.
//!
//! ## States
//! ```text
//! WaitHeader --AA 55--> ReadLength --80--> ReadPayload --80 bytes--> ReadChecksum
//!     ^                     |                                            |
//!     +---- length error ---+----------- frame / checksum error ---------+
//! ```
//!
//! Bytes are consumed incrementally, so a frame may arrive in any number of
//! partial reads. Framing, length and checksum failures never escape as errors:
//! the decoder falls back to `WaitHeader` and reports a `DecodeEvent`.

use crate::error::AcquisitionError;
use crate::frame::{checksum, verify, Frame, FRAME_HEADER, PAYLOAD_LEN};
use crate::sensor::ByteSource;

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Hunting for the header; `matched` is how many header bytes were seen
    WaitHeader { matched: usize },
    ReadLength,
    ReadPayload,
    ReadChecksum,
}

impl DecoderState {
    const INITIAL: DecoderState = DecoderState::WaitHeader { matched: 0 };
}

/// Output of the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    /// A frame passed its checksum
    Frame(Frame),
    /// The length byte was not the fixed payload length
    LengthMismatch { declared: u8 },
    /// The payload did not sum to the received checksum
    ChecksumMismatch { computed: u8, received: u8 },
}

/// Running diagnostic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub length_errors: u64,
    pub checksum_errors: u64,
    /// Bytes dropped while hunting for a header
    pub skipped_bytes: u64,
}

pub struct FrameDecoder {
    state: DecoderState,
    payload: [u8; PAYLOAD_LEN],
    filled: usize,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::INITIAL,
            payload: [0; PAYLOAD_LEN],
            filled: 0,
            stats: DecoderStats::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any in-flight frame and start hunting for a header again
    pub fn reset(&mut self) {
        self.state = DecoderState::INITIAL;
        self.filled = 0;
    }

    /// Run the state machine over `chunk`.
    ///
    /// An empty chunk leaves the decoder untouched.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodeEvent> {
        let mut events = Vec::new();
        let mut i = 0;

        while i < chunk.len() {
            if self.state == DecoderState::ReadPayload {
                // Copy as much of the payload as this chunk holds
                let take = (PAYLOAD_LEN - self.filled).min(chunk.len() - i);
                self.payload[self.filled..self.filled + take].copy_from_slice(&chunk[i..i + take]);
                self.filled += take;
                i += take;
                if self.filled == PAYLOAD_LEN {
                    self.state = DecoderState::ReadChecksum;
                }
                continue;
            }

            if let Some(event) = self.step(chunk[i]) {
                events.push(event);
            }
            i += 1;
        }

        events
    }

    /// Perform one read from `source` and decode whatever arrived.
    ///
    /// A zero-byte read is "no progress". A read fault resets the decoder to
    /// `WaitHeader` before the error is returned.
    pub fn read_from<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        buf: &mut [u8],
    ) -> Result<Vec<DecodeEvent>, AcquisitionError> {
        match source.read_bytes(buf) {
            Ok(0) => Ok(Vec::new()),
            Ok(n) => Ok(self.feed(&buf[..n])),
            Err(e) => {
                self.reset();
                Err(AcquisitionError::Read(e))
            }
        }
    }

    fn step(&mut self, byte: u8) -> Option<DecodeEvent> {
        match self.state {
            DecoderState::WaitHeader { matched } => {
                if byte == FRAME_HEADER[matched] {
                    self.state = if matched + 1 == FRAME_HEADER.len() {
                        DecoderState::ReadLength
                    } else {
                        DecoderState::WaitHeader { matched: matched + 1 }
                    };
                } else if byte == FRAME_HEADER[0] {
                    // The failing byte may itself start a header
                    self.stats.skipped_bytes += matched as u64;
                    self.state = DecoderState::WaitHeader { matched: 1 };
                } else {
                    self.stats.skipped_bytes += matched as u64 + 1;
                    self.state = DecoderState::INITIAL;
                }
                None
            }
            DecoderState::ReadLength => {
                if byte as usize == PAYLOAD_LEN {
                    self.filled = 0;
                    self.state = DecoderState::ReadPayload;
                    None
                } else {
                    self.stats.length_errors += 1;
                    self.state = DecoderState::INITIAL;
                    Some(DecodeEvent::LengthMismatch { declared: byte })
                }
            }
            DecoderState::ReadPayload => {
                self.payload[self.filled] = byte;
                self.filled += 1;
                if self.filled == PAYLOAD_LEN {
                    self.state = DecoderState::ReadChecksum;
                }
                None
            }
            DecoderState::ReadChecksum => {
                self.reset();
                if verify(&self.payload, byte) {
                    self.stats.frames += 1;
                    Some(DecodeEvent::Frame(Frame::from_payload(&self.payload)))
                } else {
                    self.stats.checksum_errors += 1;
                    Some(DecodeEvent::ChecksumMismatch {
                        computed: checksum(&self.payload),
                        received: byte,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_frame, FRAME_LEN, SAMPLES_PER_FRAME};
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::io;

    fn ramp_samples(start: u16) -> [u16; SAMPLES_PER_FRAME] {
        let mut samples = [0u16; SAMPLES_PER_FRAME];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = start + i as u16;
        }
        samples
    }

    fn frames_of(events: &[DecodeEvent]) -> Vec<Frame> {
        events
            .iter()
            .filter_map(|e| match e {
                DecodeEvent::Frame(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    /// Replays a fixed script of read results
    struct ScriptedSource {
        reads: VecDeque<io::Result<Vec<u8>>>,
    }

    impl ByteSource for ScriptedSource {
        fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_decodes_single_frame() {
        let samples = ramp_samples(1000);
        let mut decoder = FrameDecoder::new();

        let events = decoder.feed(&encode_frame(&samples));

        assert_eq!(events.len(), 1);
        assert_eq!(frames_of(&events)[0].samples(), &samples[..]);
        assert_eq!(decoder.state(), DecoderState::WaitHeader { matched: 0 });
        assert_eq!(decoder.stats().frames, 1);
    }

    #[test]
    fn test_single_byte_delivery() {
        let samples = ramp_samples(7);
        let bytes = encode_frame(&samples);
        let mut decoder = FrameDecoder::new();

        let mut events = Vec::new();
        for b in &bytes {
            events.extend(decoder.feed(std::slice::from_ref(b)));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(frames_of(&events)[0].samples(), &samples[..]);
    }

    #[test]
    fn test_empty_feed_makes_no_progress() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0xAA, 0x55]);
        assert_eq!(decoder.state(), DecoderState::ReadLength);

        for _ in 0..10 {
            assert!(decoder.feed(&[]).is_empty());
        }
        assert_eq!(decoder.state(), DecoderState::ReadLength);
    }

    #[test]
    fn test_length_mismatch_resyncs_on_next_header() {
        let samples = ramp_samples(300);
        let mut stream = vec![0xAA, 0x55, 0x02, 0x01, 0x02, 0x03];
        stream.extend(encode_frame(&samples));

        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], DecodeEvent::LengthMismatch { declared: 0x02 });
        assert_eq!(frames_of(&events)[0].samples(), &samples[..]);
        assert_eq!(decoder.stats().length_errors, 1);
    }

    #[test]
    fn test_length_byte_is_not_reused_as_header() {
        // 0xAA in the length position is consumed as a bad length
        let samples = ramp_samples(0);
        let mut stream = vec![0xAA, 0x55, 0xAA];
        stream.extend(encode_frame(&samples));

        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(events[0], DecodeEvent::LengthMismatch { declared: 0xAA });
        assert_eq!(frames_of(&events).len(), 1);
    }

    #[test]
    fn test_repeated_first_header_byte_is_a_fresh_candidate() {
        let samples = ramp_samples(42);
        let mut stream = vec![0xAA];
        stream.extend(encode_frame(&samples));

        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(frames_of(&events).len(), 1);
        assert_eq!(decoder.stats().skipped_bytes, 1);
    }

    #[test]
    fn test_checksum_mismatch_then_recovery() {
        let good = ramp_samples(2000);
        let mut bad = encode_frame(&ramp_samples(100));
        bad[FRAME_LEN - 1] = bad[FRAME_LEN - 1].wrapping_add(1);

        let mut stream = bad.clone();
        stream.extend(encode_frame(&good));

        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DecodeEvent::ChecksumMismatch { .. }));
        assert_eq!(frames_of(&events)[0].samples(), &good[..]);
        assert_eq!(decoder.stats().checksum_errors, 1);
    }

    #[test]
    fn test_header_bytes_inside_discarded_payload() {
        // 0x55AA encodes as AA 55 on the wire
        let mut noisy = [0x55AAu16; SAMPLES_PER_FRAME];
        noisy[3] = 0x50AA;
        let mut bad = encode_frame(&noisy);
        bad[10] ^= 0x04;

        let good = ramp_samples(900);
        let mut stream = bad;
        stream.extend(encode_frame(&good));

        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(&stream);

        let frames = frames_of(&events);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &good[..]);
    }

    #[test]
    fn test_noise_without_frames() {
        let noise = [0x00, 0xAA, 0x00, 0x55, 0xAA, 0x12, 0x55, 0xFF, 0xAA];
        let mut decoder = FrameDecoder::new();

        let events = decoder.feed(&noise);

        assert!(events.is_empty());
        assert_eq!(decoder.state(), DecoderState::WaitHeader { matched: 1 });
        assert_eq!(decoder.stats().skipped_bytes, 8);
    }

    #[test]
    fn test_read_error_resets_decoder() {
        let samples = ramp_samples(5);
        let bytes = encode_frame(&samples);
        let mut source = ScriptedSource {
            reads: VecDeque::from(vec![
                Ok(bytes[..20].to_vec()),
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")),
                Ok(Vec::new()),
                Ok(bytes.clone()),
            ]),
        };
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 256];

        assert!(decoder.read_from(&mut source, &mut buf).unwrap().is_empty());
        assert_eq!(decoder.state(), DecoderState::ReadPayload);

        let err = decoder.read_from(&mut source, &mut buf).unwrap_err();
        assert!(matches!(err, AcquisitionError::Read(_)));
        assert_eq!(decoder.state(), DecoderState::WaitHeader { matched: 0 });

        assert!(decoder.read_from(&mut source, &mut buf).unwrap().is_empty());

        let events = decoder.read_from(&mut source, &mut buf).unwrap();
        assert_eq!(frames_of(&events)[0].samples(), &samples[..]);
    }

    proptest! {
        #[test]
        fn no_header_bytes_means_no_frames(
            noise in prop::collection::vec(any::<u8>().prop_filter("no header start", |b| *b != 0xAA), 0..512)
        ) {
            let mut decoder = FrameDecoder::new();
            let events = decoder.feed(&noise);
            prop_assert!(events.is_empty());
            prop_assert_eq!(decoder.state(), DecoderState::WaitHeader { matched: 0 });
        }

        #[test]
        fn corrupted_frames_in_noise_yield_no_frames(
            pieces in prop::collection::vec(
                (
                    prop::collection::vec(any::<u8>(), 0..64),
                    prop::collection::vec(0u16..=4095, SAMPLES_PER_FRAME),
                    0usize..PAYLOAD_LEN * 8,
                ),
                1..4,
            ),
            trailing in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut stream = Vec::new();
            for (noise, samples, bit) in pieces {
                let samples: [u16; SAMPLES_PER_FRAME] = samples.try_into().unwrap();
                let mut frame = encode_frame(&samples);
                frame[3 + bit / 8] ^= 1 << (bit % 8);
                stream.extend(noise);
                stream.extend(frame);
            }
            stream.extend(trailing);

            let mut decoder = FrameDecoder::new();
            let events = decoder.feed(&stream);

            prop_assert!(frames_of(&events).is_empty(), "decoded a frame from {:?}", events);
            prop_assert_eq!(decoder.stats().frames, 0);
        }

        #[test]
        fn chunking_does_not_change_result(
            samples in prop::collection::vec(0u16..=4095, SAMPLES_PER_FRAME),
            chunk_sizes in prop::collection::vec(1usize..12, 1..40),
        ) {
            let samples: [u16; SAMPLES_PER_FRAME] = samples.try_into().unwrap();
            let bytes = encode_frame(&samples);

            let mut whole = FrameDecoder::new();
            let expected = whole.feed(&bytes);

            let mut chunked = FrameDecoder::new();
            let mut events = Vec::new();
            let mut offset = 0;
            let mut sizes = chunk_sizes.iter().cycle();
            while offset < bytes.len() {
                let size = (*sizes.next().unwrap()).min(bytes.len() - offset);
                events.extend(chunked.feed(&bytes[offset..offset + size]));
                offset += size;
            }

            prop_assert_eq!(events.len(), 1);
            prop_assert_eq!(events, expected);
        }

        #[test]
        fn single_bit_flip_is_rejected(
            samples in prop::collection::vec(0u16..=4095, SAMPLES_PER_FRAME),
            bit in 0usize..PAYLOAD_LEN * 8,
        ) {
            let samples: [u16; SAMPLES_PER_FRAME] = samples.try_into().unwrap();
            let mut corrupted = encode_frame(&samples);
            corrupted[3 + bit / 8] ^= 1 << (bit % 8);

            let good = ramp_samples(1234);
            let mut stream = corrupted;
            stream.extend(encode_frame(&good));

            let mut decoder = FrameDecoder::new();
            let events = decoder.feed(&stream);

            prop_assert!(
                matches!(events[0], DecodeEvent::ChecksumMismatch { .. }),
                "expected a checksum mismatch first, got {:?}",
                events[0]
            );
            let frames = frames_of(&events);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].samples(), &good[..]);
        }
    }
}
