//! # Acquisition Module
//!
//! The background activity that reads the device, drives the frame decoder
//! and feeds the shared sample window.
//!
//! The acquisition thread is the only writer of the `SampleWindow`. Everything
//! else it has to say (connection state, decoder counters, read faults) goes
//! to the UI thread as `SensorUpdate` messages.

use crate::decoder::{DecodeEvent, DecoderStats, FrameDecoder};
use crate::timeseries::SampleWindow;
use chrono::{DateTime, Local};
use crossbeam_channel::Sender;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Largest single read handed to the decoder
const READ_CHUNK: usize = 256;

/// How often counters are published to the UI
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Granularity of the stop-flag check while backing off
const BACKOFF_SLICE: Duration = Duration::from_millis(50);

/// A device that yields bytes with bounded waiting.
///
/// `read_bytes` returns as soon as data is available or a short timeout
/// expires. `Ok(0)` means nothing arrived this time. Dropping the source
/// closes the device.
pub trait ByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl ByteSource for Box<dyn serialport::SerialPort> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match io::Read::read(self, buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SensorUpdate {
    ConnectionStatus(ConnectionStatus),
    Stats(AcquisitionStats),
    /// Reading the device failed; `consecutive` counts faults since the last good read
    ReadFault { message: String, consecutive: u32 },
}

#[derive(Debug, Clone)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

/// Snapshot of acquisition health for display
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcquisitionStats {
    pub decoder: DecoderStats,
    pub read_faults: u64,
    pub last_frame_at: Option<DateTime<Local>>,
}

/// Read `source` until `should_stop` is set.
///
/// Each decoded frame is pushed whole into `window`. Discarded frames are
/// logged and counted. A read fault resets the decoder, is reported, and is
/// followed by a `retry_delay` backoff that still honours `should_stop`.
pub fn run_acquisition<S: ByteSource + ?Sized>(
    source: &mut S,
    window: &SampleWindow,
    should_stop: &AtomicBool,
    updates: &Sender<SensorUpdate>,
    retry_delay: Duration,
) -> AcquisitionStats {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; READ_CHUNK];
    let mut stats = AcquisitionStats::default();
    let mut consecutive_faults = 0u32;
    let mut last_publish = Instant::now();

    log::info!("Acquisition started");

    while !should_stop.load(Ordering::Relaxed) {
        match decoder.read_from(source, &mut buf) {
            Ok(events) => {
                consecutive_faults = 0;
                for event in events {
                    match event {
                        DecodeEvent::Frame(frame) => {
                            log::debug!("Frame received, first sample {}", frame.samples()[0]);
                            window.push(frame.samples());
                            stats.last_frame_at = Some(Local::now());
                        }
                        DecodeEvent::LengthMismatch { declared } => {
                            log::warn!("Discarded frame: length byte {} is not the expected payload length", declared);
                        }
                        DecodeEvent::ChecksumMismatch { computed, received } => {
                            log::warn!(
                                "Discarded frame: checksum mismatch (computed {:#04x}, received {:#04x})",
                                computed,
                                received
                            );
                        }
                    }
                }
            }
            Err(e) => {
                consecutive_faults = consecutive_faults.saturating_add(1);
                stats.read_faults += 1;
                log::warn!("{} (consecutive faults: {})", e, consecutive_faults);
                let _ = updates.send(SensorUpdate::ReadFault {
                    message: e.to_string(),
                    consecutive: consecutive_faults,
                });
                backoff(retry_delay, should_stop);
            }
        }

        if last_publish.elapsed() >= STATS_INTERVAL {
            stats.decoder = decoder.stats();
            let _ = updates.send(SensorUpdate::Stats(stats));
            last_publish = Instant::now();
        }
    }

    stats.decoder = decoder.stats();
    let _ = updates.send(SensorUpdate::Stats(stats));
    log::debug!("Decoder left in {:?}", decoder.state());
    log::info!(
        "Acquisition stopped: {} frames, {} length errors, {} checksum errors, {} read faults",
        stats.decoder.frames,
        stats.decoder.length_errors,
        stats.decoder.checksum_errors,
        stats.read_faults
    );
    stats
}

/// Sleep for `delay`, waking early if `should_stop` is set
fn backoff(delay: Duration, should_stop: &AtomicBool) {
    let deadline = Instant::now() + delay;
    loop {
        if should_stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep(BACKOFF_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_frame, SAMPLES_PER_FRAME};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Plays back scripted reads, then raises the stop flag
    struct ScriptedSource {
        reads: VecDeque<io::Result<Vec<u8>>>,
        stop: Arc<AtomicBool>,
    }

    impl ByteSource for ScriptedSource {
        fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => {
                    self.stop.store(true, Ordering::Relaxed);
                    Ok(0)
                }
            }
        }
    }

    fn frame_bytes(value: u16) -> Vec<u8> {
        encode_frame(&[value; SAMPLES_PER_FRAME])
    }

    #[test]
    fn test_frames_reach_window_in_order() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut corrupted = frame_bytes(2);
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;

        let mut stream = frame_bytes(1);
        stream.extend(corrupted);
        stream.extend([0xAA, 0x55, 0x02, 0x01, 0x02, 0x03]);
        stream.extend(frame_bytes(3));

        let mut source = ScriptedSource {
            reads: stream.chunks(50).map(|c| Ok(c.to_vec())).collect(),
            stop: stop.clone(),
        };
        let window = SampleWindow::new(1000);
        let (tx, rx) = crossbeam_channel::unbounded();

        let stats = run_acquisition(&mut source, &window, &stop, &tx, Duration::ZERO);

        let snapshot = window.snapshot();
        assert_eq!(snapshot.len(), 2 * SAMPLES_PER_FRAME);
        assert!(snapshot[..SAMPLES_PER_FRAME].iter().all(|&v| v == 1));
        assert!(snapshot[SAMPLES_PER_FRAME..].iter().all(|&v| v == 3));

        assert_eq!(stats.decoder.frames, 2);
        assert_eq!(stats.decoder.checksum_errors, 1);
        assert_eq!(stats.decoder.length_errors, 1);
        assert!(stats.last_frame_at.is_some());

        let published: Vec<SensorUpdate> = rx.try_iter().collect();
        assert!(matches!(published.last(), Some(SensorUpdate::Stats(s)) if s.decoder.frames == 2));
    }

    #[test]
    fn test_read_fault_is_reported_and_recovered() {
        let stop = Arc::new(AtomicBool::new(false));
        let bytes = frame_bytes(9);
        let mut source = ScriptedSource {
            reads: VecDeque::from(vec![
                Ok(bytes[..30].to_vec()),
                Err(io::Error::new(io::ErrorKind::Other, "framing fault")),
                Err(io::Error::new(io::ErrorKind::Other, "framing fault")),
                Ok(bytes[30..].to_vec()),
                Ok(bytes.clone()),
            ]),
            stop: stop.clone(),
        };
        let window = SampleWindow::new(1000);
        let (tx, rx) = crossbeam_channel::unbounded();

        let stats = run_acquisition(&mut source, &window, &stop, &tx, Duration::from_millis(1));

        // The half frame before the fault is lost; the complete one after it survives
        assert_eq!(window.len(), SAMPLES_PER_FRAME);
        assert_eq!(stats.read_faults, 2);
        assert_eq!(stats.decoder.frames, 1);

        let faults: Vec<u32> = rx
            .try_iter()
            .filter_map(|u| match u {
                SensorUpdate::ReadFault { consecutive, .. } => Some(consecutive),
                _ => None,
            })
            .collect();
        assert_eq!(faults, vec![1, 2]);
    }

    #[test]
    fn test_stop_flag_interrupts_backoff() {
        let stop = AtomicBool::new(true);
        let started = Instant::now();

        backoff(Duration::from_secs(10), &stop);

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_stopped_before_start_reads_nothing() {
        let stop = Arc::new(AtomicBool::new(true));
        let mut source = ScriptedSource {
            reads: VecDeque::from(vec![Ok(frame_bytes(1))]),
            stop: stop.clone(),
        };
        let window = SampleWindow::new(100);
        let (tx, _rx) = crossbeam_channel::unbounded();

        run_acquisition(&mut source, &window, &stop, &tx, Duration::ZERO);

        assert!(window.is_empty());
        assert_eq!(source.reads.len(), 1);
    }
}
