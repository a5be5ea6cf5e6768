//! # Synthetic ECG Source
//!
//! A `ByteSource` that speaks the device's wire protocol without hardware.
//! Each beat is a flat baseline with small P and T bumps around a sharp R
//! spike that clears the default detection threshold.
//!
//! Paced mode releases frames at the real sample rate and waits at most one
//! read timeout per call, like a serial port would. Unpaced mode produces a
//! frame on every read, for tests.

use crate::frame::{encode_frame, ADC_MAX_COUNT, ADC_REFERENCE_VOLTS, SAMPLES_PER_FRAME};
use crate::sensor::ByteSource;
use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

const BASELINE_VOLTS: f64 = 0.8;
const R_AMPLITUDE_VOLTS: f64 = 1.6;
const R_WIDTH_S: f64 = 0.012;

struct Pacing {
    started: Instant,
    read_timeout: Duration,
}

pub struct SyntheticEcg {
    bpm: f64,
    sample_rate_hz: f64,
    next_sample: u64,
    frames_emitted: u64,
    pending: VecDeque<u8>,
    corrupt_every: Option<u64>,
    pacing: Option<Pacing>,
}

impl SyntheticEcg {
    pub fn new(bpm: f64, sample_rate_hz: f64) -> Self {
        Self {
            bpm,
            sample_rate_hz,
            next_sample: 0,
            frames_emitted: 0,
            pending: VecDeque::new(),
            corrupt_every: None,
            pacing: None,
        }
    }

    /// Release frames in real time, blocking each read for at most `read_timeout`
    pub fn paced(mut self, read_timeout: Duration) -> Self {
        self.pacing = Some(Pacing {
            started: Instant::now(),
            read_timeout,
        });
        self
    }

    /// Break the checksum of every `n`th frame
    pub fn corrupt_every(mut self, n: u64) -> Self {
        self.corrupt_every = (n > 0).then_some(n);
        self
    }

    /// Raw ADC count of sample number `n`
    pub fn sample_at(&self, n: u64) -> u16 {
        let t = n as f64 / self.sample_rate_hz;
        let beat = 60.0 / self.bpm;
        // R spike sits a quarter of the way into each beat
        let phase = t % beat - beat * 0.25;

        let r = R_AMPLITUDE_VOLTS * (-(phase / R_WIDTH_S).powi(2)).exp();
        let p = 0.12 * (-((phase + 0.16) / 0.03).powi(2)).exp();
        let t_wave = 0.25 * (-((phase - 0.25) / 0.05).powi(2)).exp();
        let volts = BASELINE_VOLTS + p + r + t_wave;

        let counts = volts / ADC_REFERENCE_VOLTS * ADC_MAX_COUNT as f64;
        counts.round().clamp(0.0, ADC_MAX_COUNT as f64) as u16
    }

    fn frames_due(&self) -> u64 {
        match &self.pacing {
            Some(pacing) => {
                let elapsed = pacing.started.elapsed().as_secs_f64();
                let produced = (elapsed * self.sample_rate_hz) as u64 / SAMPLES_PER_FRAME as u64;
                produced.saturating_sub(self.frames_emitted)
            }
            None => 1,
        }
    }

    /// Time until the next frame is due in paced mode
    fn until_next_frame(&self) -> Duration {
        match &self.pacing {
            Some(pacing) => {
                let next_at = (self.frames_emitted + 1) as f64 * SAMPLES_PER_FRAME as f64
                    / self.sample_rate_hz;
                let wait = next_at - pacing.started.elapsed().as_secs_f64();
                Duration::from_secs_f64(wait.max(0.0)).min(pacing.read_timeout)
            }
            None => Duration::ZERO,
        }
    }

    fn emit_frame(&mut self) {
        let mut samples = [0u16; SAMPLES_PER_FRAME];
        for s in samples.iter_mut() {
            *s = self.sample_at(self.next_sample);
            self.next_sample += 1;
        }

        let mut bytes = encode_frame(&samples);
        self.frames_emitted += 1;
        if let Some(n) = self.corrupt_every {
            if self.frames_emitted % n == 0 {
                let last = bytes.len() - 1;
                bytes[last] = bytes[last].wrapping_add(1);
            }
        }
        self.pending.extend(bytes);
    }
}

impl ByteSource for SyntheticEcg {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            let mut due = self.frames_due();
            if due == 0 {
                std::thread::sleep(self.until_next_frame());
                due = self.frames_due();
            }
            for _ in 0..due {
                self.emit_frame();
            }
        }

        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}
