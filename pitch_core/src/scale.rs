//! Mel frequency scale (Slaney variant) and its mapping onto spectrogram bands.
//!
//! The mel index is linear below 1 kHz and logarithmic above it. Band
//! indices rescale the mel index so that the scale floor lands on band 0 and
//! the ceiling on band `bands`. Neither conversion clamps: frequencies outside
//! `[floor_hz, ceil_hz]` produce band indices outside `[0, bands]`.
//!
//! Frequencies passed to the logarithmic branch must be positive. Zero (an
//! unvoiced contour entry) falls into the linear branch.

use serde::{Deserialize, Serialize};

/// Hz per mel step in the linear region (the slope is 3/200 mel per Hz).
const F_SP: f64 = 200.0 / 3.0;
/// Breakpoint between the linear and logarithmic regions.
const MIN_LOG_HZ: f64 = 1000.0;
/// Mel index at the breakpoint.
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn logstep() -> f64 {
    6.4f64.ln() / 27.0
}

/// Convert a frequency in Hz to a (real valued) mel index.
pub fn hz_to_mel_index(frequency_hz: f64) -> f64 {
    if frequency_hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (frequency_hz / MIN_LOG_HZ).ln() / logstep()
    } else {
        frequency_hz / F_SP
    }
}

/// Inverse of [`hz_to_mel_index`].
pub fn mel_index_to_hz(mel_index: f64) -> f64 {
    if mel_index >= MIN_LOG_MEL {
        MIN_LOG_HZ * (logstep() * (mel_index - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel_index
    }
}

/// Rescale a frequency onto `[0, band_count]` so that `floor_hz -> 0` and
/// `ceil_hz -> band_count`. Not rounded and not clipped.
pub fn frequency_to_band_index(frequency_hz: f64, floor_hz: f64, ceil_hz: f64, band_count: usize) -> f64 {
    let mel_min = hz_to_mel_index(floor_hz);
    let mel_max = hz_to_mel_index(ceil_hz);
    (hz_to_mel_index(frequency_hz) - mel_min) / (mel_max - mel_min) * band_count as f64
}

/// Inverse of [`frequency_to_band_index`].
pub fn band_index_to_frequency(band_index: f64, floor_hz: f64, ceil_hz: f64, band_count: usize) -> f64 {
    let mel_min = hz_to_mel_index(floor_hz);
    let mel_max = hz_to_mel_index(ceil_hz);
    mel_index_to_hz(mel_min + band_index / band_count as f64 * (mel_max - mel_min))
}

/// Frequency range and band count shared by the heatmap and the contour overlay.
///
/// Both must use the same values or the pitch line drifts off the harmonics
/// it is meant to trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MelScale {
    pub floor_hz: f64,
    pub ceil_hz: f64,
    pub bands: usize,
}

impl Default for MelScale {
    fn default() -> Self {
        Self {
            floor_hz: 40.0,
            ceil_hz: 16000.0,
            bands: 128,
        }
    }
}

impl MelScale {
    pub fn band_index(&self, frequency_hz: f64) -> f64 {
        frequency_to_band_index(frequency_hz, self.floor_hz, self.ceil_hz, self.bands)
    }

    pub fn frequency(&self, band_index: f64) -> f64 {
        band_index_to_frequency(band_index, self.floor_hz, self.ceil_hz, self.bands)
    }

    /// `bands` frequencies evenly spaced in mel space, floor and ceiling included.
    pub fn band_frequencies(&self) -> Vec<f64> {
        let mel_min = hz_to_mel_index(self.floor_hz);
        let mel_max = hz_to_mel_index(self.ceil_hz);
        if self.bands < 2 {
            return vec![self.floor_hz; self.bands];
        }
        let mel_step = (mel_max - mel_min) / (self.bands - 1) as f64;

        (0..self.bands)
            .map(|i| mel_index_to_hz(mel_min + i as f64 * mel_step))
            .collect()
    }
}
