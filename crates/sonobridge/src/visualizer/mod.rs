//! Visualizer subsystem
//!
//! Spectral capture, band aggregation and rate-limited emission.
//!

pub mod aggregator;
pub mod gate;
pub mod pipeline;
pub mod sampler;
pub mod synthetic;
pub mod types;

pub use aggregator::BandAggregator;
pub use gate::EmissionGate;
pub use pipeline::{BandSink, Visualizer};
pub use sampler::{CaptureBackend, CaptureHandle, FrameListener, SpectralSampler};
pub use synthetic::{synthesize_frame, SyntheticCapture, SyntheticSignal};
pub use types::{BandVector, CaptureSession, SignalTag, SpectralFrame};
