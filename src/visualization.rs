//! # Visualization Helpers Module
//!
//! Turns one estimation tick (window snapshot in volts plus the estimator's
//! pass) into plain data the chart can draw: time/voltage points, peak
//! markers, axis ranges and the heart-rate label.
//!
//! With the spectrum display on, `SpectrumView` does the same for the
//! magnitude spectrum and its dominant components.
//!
//! ## Axes
//! - X: seconds since the oldest sample in the window (index x 5 ms), fixed
//!   to the configured display duration so the trace fills in from the left.
//! - Y: follows the signal with a 0.2 V margin once there is enough data,
//!   otherwise the full ADC range with 0.5 V margins.

use crate::frame::ADC_REFERENCE_VOLTS;
use crate::heart_rate::{EstimationPass, HeartRateEstimate};
use crate::spectrum::Spectrum;
use crate::timeseries::{time_axis, VoltSliceExt};

/// Margin around the signal's own range
const AUTO_RANGE_MARGIN_V: f64 = 0.2;

/// Samples needed before the y axis follows the signal
const AUTO_RANGE_MIN_SAMPLES: usize = 10;

/// Everything the ECG chart needs for one frame of the display
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformView {
    pub points: Vec<(f64, f64)>,
    pub peaks: Vec<(f64, f64)>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub estimate: HeartRateEstimate,
}

impl Default for WaveformView {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            peaks: Vec::new(),
            x_range: (0.0, 1.0),
            y_range: default_y_range(),
            estimate: HeartRateEstimate::default(),
        }
    }
}

impl WaveformView {
    pub fn build(volts: &[f64], pass: &EstimationPass, sample_rate_hz: f64, display_seconds: f64) -> Self {
        let points: Vec<(f64, f64)> = time_axis(volts.len(), sample_rate_hz)
            .zip(volts.iter().copied())
            .collect();

        let peaks = pass
            .peaks
            .iter()
            .filter(|p| p.index < volts.len())
            .map(|p| (p.index as f64 / sample_rate_hz, p.value))
            .collect();

        let y_range = if volts.len() > AUTO_RANGE_MIN_SAMPLES {
            volts
                .min_max()
                .map(|(min, max)| (min - AUTO_RANGE_MARGIN_V, max + AUTO_RANGE_MARGIN_V))
                .unwrap_or_else(default_y_range)
        } else {
            default_y_range()
        };

        Self {
            points,
            peaks,
            x_range: (0.0, display_seconds),
            y_range,
            estimate: pass.estimate,
        }
    }

    pub fn heart_rate_label(&self) -> String {
        heart_rate_label(&self.estimate)
    }
}

pub fn heart_rate_label(estimate: &HeartRateEstimate) -> String {
    match estimate.bpm {
        Some(bpm) => format!("Heart Rate: {:.0} BPM", bpm),
        None => "Heart Rate: -- BPM".to_string(),
    }
}

/// Magnitude spectrum ready for the spectrum chart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumView {
    pub points: Vec<(f64, f64)>,
    pub dominant: Vec<(f64, f64)>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl SpectrumView {
    pub fn build(spectrum: &Spectrum, sample_rate_hz: f64) -> Self {
        let peak = spectrum
            .bins
            .iter()
            .map(|&(_, m)| m)
            .fold(0.0_f64, f64::max);

        Self {
            points: spectrum.bins.clone(),
            dominant: spectrum.dominant.clone(),
            x_range: (0.0, sample_rate_hz / 2.0),
            y_range: (0.0, if peak > 0.0 { peak * 1.1 } else { 1.0 }),
        }
    }

    /// One line per dominant component, strongest first
    pub fn dominant_labels(&self) -> Vec<String> {
        self.dominant
            .iter()
            .enumerate()
            .map(|(i, (freq, mag))| format!("#{}: {:.2} Hz, Amplitude: {:.4}", i + 1, freq, mag))
            .collect()
    }
}

fn default_y_range() -> (f64, f64) {
    (-0.5, ADC_REFERENCE_VOLTS + 0.5)
}
