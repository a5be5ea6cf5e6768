//! # Sample Window Module
//!
//! Bounded, time-ordered storage shared between the acquisition thread (sole
//! writer) and the estimation/render tick (sole reader).
//!
//! Samples carry no timestamps. Position in the window times the fixed sample
//! interval is the time axis.

use crate::frame::{ADC_MAX_COUNT, ADC_REFERENCE_VOLTS};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fixed-capacity FIFO of the most recent raw samples.
///
/// Clones share the same buffer. One `push` is applied under a single lock, so
/// a snapshot never sees half of a frame.
#[derive(Clone)]
pub struct SampleWindow {
    data: Arc<Mutex<VecDeque<u16>>>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Window holding `seconds` of data at `sample_rate_hz`
    pub fn with_duration(seconds: f64, sample_rate_hz: f64) -> Self {
        Self::new((seconds * sample_rate_hz) as usize)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `samples` in order, evicting the oldest entries once full
    pub fn push(&self, samples: &[u16]) {
        let mut data = self.lock();
        // Only the newest `capacity` samples of a long batch can survive
        let incoming = &samples[samples.len().saturating_sub(self.capacity)..];
        let overflow = (data.len() + incoming.len()).saturating_sub(self.capacity);
        data.drain(..overflow);
        data.extend(incoming.iter().copied());
    }

    /// Ordered copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<u16> {
        self.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u16>> {
        // A panicking writer cannot leave the deque half-updated
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Raw ADC count to volts conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcScale {
    pub full_scale: u16,
    pub reference_volts: f64,
}

impl Default for AdcScale {
    fn default() -> Self {
        Self {
            full_scale: ADC_MAX_COUNT,
            reference_volts: ADC_REFERENCE_VOLTS,
        }
    }
}

impl AdcScale {
    pub fn volts(&self, raw: u16) -> f64 {
        raw as f64 / self.full_scale as f64 * self.reference_volts
    }

    pub fn to_volts(&self, raw: &[u16]) -> Vec<f64> {
        raw.iter().map(|&r| self.volts(r)).collect()
    }
}

/// Seconds since the first sample for each of `len` samples
pub fn time_axis(len: usize, sample_rate_hz: f64) -> impl Iterator<Item = f64> {
    let interval = 1.0 / sample_rate_hz;
    (0..len).map(move |i| i as f64 * interval)
}

pub trait VoltSliceExt {
    fn min_max(&self) -> Option<(f64, f64)>;
}

impl VoltSliceExt for [f64] {
    fn min_max(&self) -> Option<(f64, f64)> {
        self.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
    }
}
