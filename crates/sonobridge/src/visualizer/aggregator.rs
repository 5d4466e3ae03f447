//! Band aggregation
//!
//! Maps the OS transform buffer onto a handful of perceptual bands with
//! logarithmic scaling. A capture that delivers nothing but zeros gets a
//! smooth synthetic oscillation instead, so the consumer can tell a muted
//! session apart from a broken pipeline.

use std::ops::Range;

use crate::clock::SharedClock;
use crate::config::bands::{
    BAND_COUNT, FALLBACK_MAX, FALLBACK_MIN, FALLBACK_PERIOD_MS, FALLBACK_PHASE_STEP,
    LOG_SCALE_DIVISOR,
};

use super::types::{BandVector, SignalTag, SpectralFrame};

/// Converts spectral frames into band vectors
pub struct BandAggregator {
    clock: SharedClock,
}

impl BandAggregator {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }

    /// Aggregate one frame. The frame is consumed.
    pub fn aggregate(&self, frame: SpectralFrame) -> BandVector {
        if frame.len() < 2 {
            return BandVector::zeroed();
        }

        if frame.is_silent() {
            log::trace!("all-zero frame ({} bytes), synthesizing fallback", frame.len());
            return self.fallback();
        }

        let samples = frame.samples();
        let half = frame.bin_count();
        let mut values = [0.0f64; BAND_COUNT];

        for (band, value) in values.iter_mut().enumerate() {
            // Empty range keeps the default of 0.0
            if let Some(mean) = mean_magnitude(samples, band_range(band, half)) {
                *value = log_scale(mean);
            }
        }

        BandVector::new(values, SignalTag::Normal)
    }

    /// Deterministic oscillation used when the capture carries no signal
    pub fn fallback(&self) -> BandVector {
        let t = self.clock.now().as_secs_f64() * 1000.0 / FALLBACK_PERIOD_MS;
        let mid = (FALLBACK_MIN + FALLBACK_MAX) / 2.0;
        let amplitude = (FALLBACK_MAX - FALLBACK_MIN) / 2.0;

        let mut values = [0.0f64; BAND_COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            let phase = t + i as f64 * FALLBACK_PHASE_STEP;
            *value = (mid + amplitude * phase.sin()).clamp(FALLBACK_MIN, FALLBACK_MAX);
        }
        BandVector::new(values, SignalTag::NoSignalFallback)
    }
}

/// Source range (byte indices) for `band` given `half` complex bins.
///
/// Band 0 deliberately reads the same range as band 1.
pub fn band_range(band: usize, half: usize) -> Range<usize> {
    let effective = if band == 0 { 1 } else { band };
    let start = effective * half / BAND_COUNT;
    let end = ((effective + 1) * half / BAND_COUNT).min(half.saturating_sub(1));
    start..end
}

/// Mean magnitude of the (real, imaginary) pairs starting inside `range`.
/// `None` when the range contains no complete pair.
fn mean_magnitude(samples: &[i8], range: Range<usize>) -> Option<f64> {
    let mut sum = 0.0f64;
    let mut count = 0usize;

    for j in range.step_by(2) {
        if j + 1 >= samples.len() {
            break;
        }
        let real = samples[j] as f64;
        let imaginary = samples[j + 1] as f64;
        let magnitude = (real * real + imaginary * imaginary).sqrt();
        sum += if magnitude.is_finite() { magnitude } else { 0.0 };
        count += 1;
    }

    if count > 0 {
        Some(sum / count as f64)
    } else {
        None
    }
}

fn log_scale(mean: f64) -> f64 {
    let scaled = (mean + 1.0).ln() / LOG_SCALE_DIVISOR;
    if scaled.is_finite() {
        scaled.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
