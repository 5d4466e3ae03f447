//! Capture → aggregate → gate → consumer
//!
//! `Visualizer` wires the sampler's frame callback into the aggregator and
//! emission gate. The whole chain for one frame runs under a single mutex, so
//! at most one aggregation is in flight and vectors reach the sink in capture
//! order.

use std::sync::{Arc, Mutex};

use crate::clock::SharedClock;
use crate::config::BridgeConfig;
use crate::error::CaptureError;

use super::aggregator::BandAggregator;
use super::gate::EmissionGate;
use super::sampler::{CaptureBackend, SpectralSampler};
use super::types::{BandVector, CaptureSession, SignalTag, SpectralFrame};

/// Consumer-side delivery callback. Must not block.
pub type BandSink = Arc<dyn Fn(BandVector) + Send + Sync>;

struct Pipeline {
    aggregator: BandAggregator,
    gate: EmissionGate,
    sink: BandSink,
    frames_processed: u64,
}

impl Pipeline {
    fn process(&mut self, frame: SpectralFrame) {
        self.frames_processed += 1;
        let vector = self.aggregator.aggregate(frame);
        if let Some(vector) = self.gate.submit(vector) {
            (self.sink)(vector);
        }
    }

    fn signal(&mut self, tag: SignalTag) -> bool {
        match self.gate.submit(BandVector::signal(tag)) {
            Some(vector) => {
                (self.sink)(vector);
                true
            }
            None => false,
        }
    }
}

/// The frequency-band extraction pipeline
pub struct Visualizer {
    sampler: SpectralSampler,
    pipeline: Arc<Mutex<Pipeline>>,
}

impl Visualizer {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        config: &BridgeConfig,
        clock: SharedClock,
        sink: BandSink,
    ) -> Self {
        let pipeline = Arc::new(Mutex::new(Pipeline {
            aggregator: BandAggregator::new(clock.clone()),
            gate: EmissionGate::new(clock, config.min_emission_interval()),
            sink,
            frames_processed: 0,
        }));

        let mut sampler = SpectralSampler::with_max_capture_size(backend, config.max_capture_size);
        let frame_pipeline = pipeline.clone();
        sampler.on_frame(move |frame| match frame_pipeline.lock() {
            Ok(mut pipeline) => pipeline.process(frame),
            Err(_) => log::warn!("pipeline lock poisoned, dropping frame"),
        });

        Self { sampler, pipeline }
    }

    /// Start (or restart) capture on `session`. The emission cadence starts
    /// over with the new capture.
    pub fn start(&mut self, session: CaptureSession) -> Result<(), CaptureError> {
        self.sampler.stop();
        if let Ok(mut pipeline) = self.pipeline.lock() {
            pipeline.gate.reset();
        }
        self.sampler.start(session)
    }

    /// Stop capture; frames still in flight are discarded
    pub fn stop(&mut self) {
        if !self.sampler.is_active() {
            return;
        }
        self.sampler.stop();
        log::debug!(
            "visualizer stopped: {} frames aggregated, {} vectors suppressed",
            self.frames_processed(),
            self.suppressed_count()
        );
    }

    pub fn is_active(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn session(&self) -> Option<CaptureSession> {
        self.sampler.session()
    }

    /// Push a special signal through the gate. Returns whether it was delivered.
    pub fn signal(&self, tag: SignalTag) -> bool {
        match self.pipeline.lock() {
            Ok(mut pipeline) => pipeline.signal(tag),
            Err(_) => false,
        }
    }

    /// Let the next special signal through even if it repeats the last one
    pub fn rearm_signals(&self) {
        if let Ok(mut pipeline) = self.pipeline.lock() {
            pipeline.gate.clear_special();
        }
    }

    /// Vectors the gate dropped since construction
    pub fn suppressed_count(&self) -> u64 {
        self.pipeline
            .lock()
            .map(|pipeline| pipeline.gate.suppressed_count())
            .unwrap_or(0)
    }

    /// Frames aggregated since construction
    pub fn frames_processed(&self) -> u64 {
        self.pipeline
            .lock()
            .map(|pipeline| pipeline.frames_processed)
            .unwrap_or(0)
    }
}
