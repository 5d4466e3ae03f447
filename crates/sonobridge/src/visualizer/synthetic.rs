//! Synthetic capture backend
//!
//! Produces transform frames from a generated signal on a timer thread, in the
//! same interleaved (real, imaginary) byte layout the OS capture delivers.
//! Used by the CLI and by anything that needs a capture without a device.

use std::f32::consts::PI;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::CaptureError;

use super::sampler::{CaptureBackend, CaptureHandle, FrameListener};
use super::types::{CaptureSession, SpectralFrame};

/// Signal fed into the synthetic capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyntheticSignal {
    /// Pure sine; `amplitude` in 0.0..=1.0
    Tone { frequency_hz: f32, amplitude: f32 },
    /// Digital silence (all-zero frames)
    Silence,
}

/// Capture backend driven by a generated signal
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    signal: SyntheticSignal,
    sample_rate: u32,
    size_range: (usize, usize),
    max_rate: u32,
}

impl SyntheticCapture {
    pub fn new(signal: SyntheticSignal) -> Self {
        Self {
            signal,
            sample_rate: 44_100,
            size_range: (128, 1024),
            max_rate: 20_000,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_size_range(mut self, min: usize, max: usize) -> Self {
        self.size_range = (min, max);
        self
    }

    /// Frame delivery rate in milliHertz
    pub fn with_max_rate(mut self, rate: u32) -> Self {
        self.max_rate = rate;
        self
    }
}

impl CaptureBackend for SyntheticCapture {
    fn capture_size_range(&self) -> (usize, usize) {
        self.size_range
    }

    fn max_capture_rate(&self) -> u32 {
        self.max_rate
    }

    fn open(&mut self, session: CaptureSession) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        log::debug!("synthetic capture opened on {}", session);
        Ok(Box::new(SyntheticHandle {
            signal: self.signal,
            sample_rate: self.sample_rate,
            capture_size: self.size_range.1,
            listener: None,
            rate: self.max_rate,
            producer: None,
        }))
    }
}

struct Producer {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

struct SyntheticHandle {
    signal: SyntheticSignal,
    sample_rate: u32,
    capture_size: usize,
    listener: Option<FrameListener>,
    rate: u32,
    producer: Option<Producer>,
}

impl SyntheticHandle {
    fn spawn_producer(&mut self) -> Result<(), CaptureError> {
        let listener = self
            .listener
            .clone()
            .ok_or_else(|| CaptureError::Init("no frame listener set".to_string()))?;
        if self.rate == 0 {
            return Err(CaptureError::Init("capture rate is zero".to_string()));
        }
        let period = Duration::from_micros(1_000_000_000 / self.rate as u64);
        let frame = synthesize_frame(self.signal, self.capture_size, self.sample_rate);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("synthetic-capture".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => listener(frame.clone()),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| CaptureError::Init(format!("failed to spawn capture thread: {}", e)))?;

        self.producer = Some(Producer { stop_tx, thread });
        Ok(())
    }

    fn stop_producer(&mut self) {
        if let Some(producer) = self.producer.take() {
            let _ = producer.stop_tx.send(());
            let _ = producer.thread.join();
        }
    }
}

impl CaptureHandle for SyntheticHandle {
    fn set_capture_size(&mut self, size: usize) -> Result<(), CaptureError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(CaptureError::Init(format!("unsupported capture size {}", size)));
        }
        self.capture_size = size;
        Ok(())
    }

    fn set_frame_listener(&mut self, listener: FrameListener, rate: u32) -> Result<(), CaptureError> {
        self.listener = Some(listener);
        self.rate = rate;
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), CaptureError> {
        match (enabled, self.producer.is_some()) {
            (true, false) => self.spawn_producer(),
            (false, true) => {
                self.stop_producer();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn is_enabled(&self) -> bool {
        self.producer.is_some()
    }

    fn release(&mut self) {
        self.stop_producer();
        self.listener = None;
    }
}

impl Drop for SyntheticHandle {
    fn drop(&mut self) {
        self.stop_producer();
    }
}

/// Forward transform of `capture_size` samples of `signal`, packed as
/// interleaved signed (real, imaginary) bytes for the first
/// `capture_size / 2` bins
pub fn synthesize_frame(signal: SyntheticSignal, capture_size: usize, sample_rate: u32) -> SpectralFrame {
    let (frequency_hz, amplitude) = match signal {
        SyntheticSignal::Silence => return SpectralFrame::new(vec![0; capture_size], sample_rate),
        SyntheticSignal::Tone {
            frequency_hz,
            amplitude,
        } => (frequency_hz, amplitude.clamp(0.0, 1.0)),
    };

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(capture_size);
    let mut buffer: Vec<Complex<f32>> = (0..capture_size)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            Complex::new(amplitude * (2.0 * PI * frequency_hz * t).sin(), 0.0)
        })
        .collect();
    fft.process(&mut buffer);

    // A full-scale sine peaks at n/2 in its bin
    let norm = 2.0 / capture_size as f32 * 127.0;
    let to_byte = |x: f32| (x * norm).round().clamp(-128.0, 127.0) as i8;

    let mut samples = vec![0i8; capture_size];
    for (k, bin) in buffer.iter().take(capture_size / 2).enumerate() {
        samples[2 * k] = to_byte(bin.re);
        samples[2 * k + 1] = to_byte(bin.im);
    }
    SpectralFrame::new(samples, sample_rate)
}
