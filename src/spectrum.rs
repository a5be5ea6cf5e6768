//! # Spectrum Module
//!
//! One-sided magnitude spectrum of the display window and its strongest
//! components. Magnitudes are `|X_k| / sqrt(n)`; bin `k` sits at
//! `k * sample_rate / n` Hz.
//!
//! The window mean is removed before the transform so the ECG baseline does
//! not swamp the 0 Hz bin.

use rustfft::{num_complex::Complex, FftPlanner};

/// Number of dominant components reported alongside the spectrum
pub const DOMINANT_COUNT: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    /// `(frequency Hz, magnitude)` for bins below Nyquist
    pub bins: Vec<(f64, f64)>,
    /// Strongest bins above 0 Hz, largest first
    pub dominant: Vec<(f64, f64)>,
}

/// Holds the FFT planner so plans are reused from tick to tick
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f64>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    pub fn analyze(&mut self, volts: &[f64], sample_rate_hz: f64) -> Spectrum {
        let n = volts.len();
        if n < 2 {
            return Spectrum::default();
        }

        let mean = volts.iter().sum::<f64>() / n as f64;
        let mut buffer: Vec<Complex<f64>> = volts
            .iter()
            .map(|&v| Complex::new(v - mean, 0.0))
            .collect();

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let scale = (n as f64).sqrt();
        let bin_width = sample_rate_hz / n as f64;
        let bins: Vec<(f64, f64)> = buffer
            .iter()
            .take(n / 2)
            .enumerate()
            .map(|(k, c)| (k as f64 * bin_width, c.norm() / scale))
            .collect();

        let dominant = top_peaks(&bins, DOMINANT_COUNT);
        log::trace!("Spectrum of {} samples, dominant {:?}", n, dominant);

        Spectrum { bins, dominant }
    }
}

/// The `count` largest bins above 0 Hz, largest first (lower frequency wins ties)
pub fn top_peaks(bins: &[(f64, f64)], count: usize) -> Vec<(f64, f64)> {
    let mut candidates: Vec<(f64, f64)> = bins.iter().skip(1).copied().collect();
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.total_cmp(&b.0)));
    candidates.truncate(count);
    candidates
}
