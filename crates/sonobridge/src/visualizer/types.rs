//! Shared visualizer types
//!
//! Pure data types passed between the sampler, aggregator, gate and consumer.

use std::fmt;

use crate::config::bands::BAND_COUNT;
use crate::config::capture::DEFAULT_SESSION_ID;

/// Identifies which OS audio session is being analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CaptureSession(i32);

impl CaptureSession {
    /// The default output mix
    pub const DEFAULT_MIX: CaptureSession = CaptureSession(DEFAULT_SESSION_ID);

    /// Build from a host-supplied id. Non-positive ids select the default mix.
    pub fn from_raw(id: i32) -> Self {
        if id > 0 {
            Self(id)
        } else {
            Self::DEFAULT_MIX
        }
    }

    pub fn id(&self) -> i32 {
        self.0
    }

    pub fn is_default_mix(&self) -> bool {
        self.0 == DEFAULT_SESSION_ID
    }
}

impl fmt::Display for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default_mix() {
            write!(f, "session 0 (default mix)")
        } else {
            write!(f, "session {}", self.0)
        }
    }
}

/// One capture window of the OS frequency-domain transform.
///
/// The buffer holds interleaved signed (real, imaginary) byte pairs, exactly
/// as the OS capture API hands them over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectralFrame {
    samples: Vec<i8>,
    sampling_rate: u32,
}

impl SpectralFrame {
    pub fn new(samples: Vec<i8>, sampling_rate: u32) -> Self {
        Self {
            samples,
            sampling_rate,
        }
    }

    pub fn samples(&self) -> &[i8] {
        &self.samples
    }

    /// Sampling rate (Hz) at capture time
    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of complex bins (half the byte length)
    pub fn bin_count(&self) -> usize {
        self.samples.len() / 2
    }

    /// True when every byte is zero, i.e. the analyzed session is muted or idle
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }
}

/// What a `BandVector` represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalTag {
    /// Bands derived from real spectral data
    #[default]
    Normal,
    /// Synthesized oscillation because the capture delivered only zeros
    NoSignalFallback,
    /// Capture permission was refused
    PermissionDenied,
    /// The capture could not be started or failed while running
    CaptureError,
}

impl SignalTag {
    /// Special signals bypass rate limiting and are deduplicated
    pub fn is_special(self) -> bool {
        matches!(self, SignalTag::PermissionDenied | SignalTag::CaptureError)
    }

    /// Sentinel each band carries on the legacy list-of-doubles wire format
    pub fn wire_sentinel(self) -> Option<f64> {
        match self {
            SignalTag::PermissionDenied => Some(-1.0),
            SignalTag::CaptureError => Some(-2.0),
            SignalTag::Normal | SignalTag::NoSignalFallback => None,
        }
    }
}

impl fmt::Display for SignalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalTag::Normal => write!(f, "normal"),
            SignalTag::NoSignalFallback => write!(f, "no-signal-fallback"),
            SignalTag::PermissionDenied => write!(f, "permission-denied"),
            SignalTag::CaptureError => write!(f, "capture-error"),
        }
    }
}

/// Fixed-size set of normalized band intensities (0.0..=1.0) plus its tag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandVector {
    pub values: [f64; BAND_COUNT],
    pub tag: SignalTag,
}

impl Default for BandVector {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl BandVector {
    pub fn new(values: [f64; BAND_COUNT], tag: SignalTag) -> Self {
        Self { values, tag }
    }

    /// All-zero `normal` vector
    pub fn zeroed() -> Self {
        Self::new([0.0; BAND_COUNT], SignalTag::Normal)
    }

    /// Value-less vector carrying only a tag (used for special signals)
    pub fn signal(tag: SignalTag) -> Self {
        Self::new([0.0; BAND_COUNT], tag)
    }

    pub fn is_special(&self) -> bool {
        self.tag.is_special()
    }

    /// Values as sent over the legacy wire format: special signals replace
    /// every band with their sentinel.
    pub fn wire_values(&self) -> [f64; BAND_COUNT] {
        match self.tag.wire_sentinel() {
            Some(sentinel) => [sentinel; BAND_COUNT],
            None => self.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- CaptureSession ---

    #[test]
    fn capture_session_positive_id_kept() {
        let session = CaptureSession::from_raw(17);
        assert_eq!(session.id(), 17);
        assert!(!session.is_default_mix());
    }

    #[test]
    fn capture_session_non_positive_is_default_mix() {
        assert_eq!(CaptureSession::from_raw(0), CaptureSession::DEFAULT_MIX);
        assert_eq!(CaptureSession::from_raw(-3), CaptureSession::DEFAULT_MIX);
        assert!(CaptureSession::default().is_default_mix());
    }

    #[test]
    fn capture_session_display() {
        assert_eq!(
            CaptureSession::DEFAULT_MIX.to_string(),
            "session 0 (default mix)"
        );
        assert_eq!(CaptureSession::from_raw(9).to_string(), "session 9");
    }

    // --- SpectralFrame ---

    #[test]
    fn frame_accessors() {
        let frame = SpectralFrame::new(vec![1, -2, 3, -4], 44100);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.bin_count(), 2);
        assert_eq!(frame.sampling_rate(), 44100);
        assert_eq!(frame.samples(), &[1, -2, 3, -4]);
        assert!(!frame.is_empty());
    }

    #[test]
    fn frame_silence_detection() {
        assert!(SpectralFrame::new(vec![0; 8], 44100).is_silent());
        assert!(!SpectralFrame::new(vec![0, 0, 0, 1], 44100).is_silent());
        assert!(SpectralFrame::new(Vec::new(), 44100).is_silent());
    }

    // --- SignalTag ---

    #[test]
    fn only_permission_and_capture_errors_are_special() {
        assert!(!SignalTag::Normal.is_special());
        assert!(!SignalTag::NoSignalFallback.is_special());
        assert!(SignalTag::PermissionDenied.is_special());
        assert!(SignalTag::CaptureError.is_special());
    }

    #[test]
    fn signal_tag_display() {
        assert_eq!(SignalTag::Normal.to_string(), "normal");
        assert_eq!(SignalTag::NoSignalFallback.to_string(), "no-signal-fallback");
        assert_eq!(SignalTag::PermissionDenied.to_string(), "permission-denied");
        assert_eq!(SignalTag::CaptureError.to_string(), "capture-error");
    }

    // --- BandVector ---

    #[test]
    fn band_vector_default_is_zeroed_normal() {
        let v = BandVector::default();
        assert_eq!(v.tag, SignalTag::Normal);
        assert!(v.values.iter().all(|&x| x == 0.0));
        assert_eq!(v.values.len(), BAND_COUNT);
    }

    #[test]
    fn wire_values_use_sentinels_for_special_signals() {
        assert_eq!(
            BandVector::signal(SignalTag::PermissionDenied).wire_values(),
            [-1.0; BAND_COUNT]
        );
        assert_eq!(
            BandVector::signal(SignalTag::CaptureError).wire_values(),
            [-2.0; BAND_COUNT]
        );
        let normal = BandVector::new([0.1, 0.2, 0.3, 0.4, 0.5], SignalTag::Normal);
        assert_eq!(normal.wire_values(), normal.values);
    }
}
