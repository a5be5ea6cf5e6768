//! # Heart Rate Estimation Module
//!
//! Peak-based BPM estimation over a snapshot of the sample window, after
//! conversion to volts.
//!
//! ## Algorithm
//! 1. Skip windows shorter than the minimum peak distance.
//! 2. Find local maxima at or above the voltage threshold.
//! 3. Enforce the minimum peak distance, keeping the highest peak of any
//!    crowded group (earlier index wins a tie).
//! 4. BPM = 60 / mean interval between consecutive surviving peaks.
//!
//! Fewer than two peaks leaves the previous estimate in place. The displayed
//! heart rate only changes when a pass succeeds.

/// A detected heartbeat marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Index into the snapshot
    pub index: usize,
    /// Signal value at `index`
    pub value: f64,
}

/// Detection parameters, fixed for the lifetime of the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub threshold_volts: f64,
    /// Minimum spacing between peaks in samples
    pub min_peak_distance: usize,
    pub sample_rate_hz: f64,
}

/// Minimum peak spacing in samples for a given physiological ceiling.
///
/// 200 BPM at 200 Hz gives 60 samples (0.3 s).
pub fn min_peak_distance(sample_rate_hz: f64, max_heart_rate_bpm: f64) -> usize {
    (sample_rate_hz * 60.0 / max_heart_rate_bpm) as usize
}

/// The value shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeartRateEstimate {
    /// Last valid BPM; `None` until the first successful pass
    pub bpm: Option<f64>,
    /// Whether the most recent pass produced `bpm`
    pub is_current: bool,
}

/// Result of one estimation pass
#[derive(Debug, Clone, PartialEq)]
pub struct EstimationPass {
    pub peaks: Vec<Peak>,
    /// BPM measured by this pass, if it had enough peaks
    pub measured: Option<f64>,
    pub estimate: HeartRateEstimate,
}

pub struct HeartRateEstimator {
    settings: EstimatorSettings,
    last_valid: Option<f64>,
}

impl HeartRateEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self {
            settings,
            last_valid: None,
        }
    }

    pub fn estimate(&self) -> HeartRateEstimate {
        HeartRateEstimate {
            bpm: self.last_valid,
            is_current: false,
        }
    }

    /// Run one pass over `volts` (oldest sample first)
    pub fn update(&mut self, volts: &[f64]) -> EstimationPass {
        let peaks = if volts.len() < self.settings.min_peak_distance {
            Vec::new()
        } else {
            find_peaks(
                volts,
                self.settings.threshold_volts,
                self.settings.min_peak_distance,
            )
        };

        let measured = bpm_from_peaks(&peaks, self.settings.sample_rate_hz);
        match measured {
            Some(bpm) => {
                log::debug!("Heart rate {:.1} BPM from {} peaks", bpm, peaks.len());
                self.last_valid = Some(bpm);
            }
            None => {
                log::trace!("Not enough peaks ({}), keeping previous estimate", peaks.len());
            }
        }

        EstimationPass {
            peaks,
            measured,
            estimate: HeartRateEstimate {
                bpm: self.last_valid,
                is_current: measured.is_some(),
            },
        }
    }
}

/// Local maxima of `signal` that reach `threshold` and are at least
/// `min_distance` samples apart, in index order.
///
/// A flat top counts as one peak at its middle sample. The first and last
/// samples are never peaks.
pub fn find_peaks(signal: &[f64], threshold: f64, min_distance: usize) -> Vec<Peak> {
    let candidates: Vec<Peak> = local_maxima(signal)
        .into_iter()
        .filter(|&index| signal[index] >= threshold)
        .map(|index| Peak {
            index,
            value: signal[index],
        })
        .collect();

    select_by_distance(candidates, min_distance)
}

/// Mean-interval heart rate; `None` with fewer than two peaks
pub fn bpm_from_peaks(peaks: &[Peak], sample_rate_hz: f64) -> Option<f64> {
    if peaks.len() < 2 {
        return None;
    }

    let span = (peaks[peaks.len() - 1].index - peaks[0].index) as f64;
    let mean_interval_s = span / (peaks.len() - 1) as f64 / sample_rate_hz;
    if mean_interval_s <= 0.0 {
        return None;
    }

    Some(60.0 / mean_interval_s)
}

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if x.len() < 3 {
        return maxima;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }

    maxima
}

fn select_by_distance(peaks: Vec<Peak>, min_distance: usize) -> Vec<Peak> {
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    // Highest first, earlier index first among equals
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        peaks[b]
            .value
            .total_cmp(&peaks[a].value)
            .then(peaks[a].index.cmp(&peaks[b].index))
    });

    let mut keep = vec![true; peaks.len()];
    for &p in &order {
        if !keep[p] {
            continue;
        }

        let mut k = p;
        while k > 0 && peaks[p].index - peaks[k - 1].index < min_distance {
            k -= 1;
            keep[k] = false;
        }

        let mut k = p + 1;
        while k < peaks.len() && peaks[k].index - peaks[p].index < min_distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(peak, kept)| kept.then_some(peak))
        .collect()
}
