//! Spectral sampler
//!
//! Owns at most one OS frequency-domain capture at a time. The native handle
//! is wrapped in a guard as soon as it is opened, so every exit path
//! (including a failure halfway through configuration) releases it.
//!
//! Each capture carries a liveness flag behind an `RwLock`. Frame callbacks
//! hold the read side while they run and `stop()` takes the write side, so
//! once `stop()` returns no frame of that capture reaches the handler.

use std::sync::{Arc, Mutex, RwLock};

use crate::config::capture::MAX_CAPTURE_SIZE;
use crate::error::CaptureError;

use super::types::{CaptureSession, SpectralFrame};

/// Per-frame callback handed to the OS capture
pub type FrameListener = Arc<dyn Fn(SpectralFrame) + Send + Sync>;

/// The OS frequency-domain capture API
pub trait CaptureBackend: Send {
    /// Supported capture sizes as (min, max)
    fn capture_size_range(&self) -> (usize, usize);

    /// Highest frame delivery rate the OS supports (milliHertz)
    fn max_capture_rate(&self) -> u32;

    /// Open a capture on `session`. The returned handle is not yet enabled.
    fn open(&mut self, session: CaptureSession) -> Result<Box<dyn CaptureHandle>, CaptureError>;
}

/// One native capture instance
pub trait CaptureHandle: Send {
    fn set_capture_size(&mut self, size: usize) -> Result<(), CaptureError>;

    fn set_frame_listener(&mut self, listener: FrameListener, rate: u32)
        -> Result<(), CaptureError>;

    fn set_enabled(&mut self, enabled: bool) -> Result<(), CaptureError>;

    fn is_enabled(&self) -> bool;

    /// Release the native resource. Called exactly once.
    fn release(&mut self);
}

/// Releases the wrapped handle on drop
struct CaptureGuard {
    handle: Option<Box<dyn CaptureHandle>>,
}

impl CaptureGuard {
    fn new(handle: Box<dyn CaptureHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn configure(
        &mut self,
        capture_size: usize,
        listener: FrameListener,
        rate: u32,
    ) -> Result<(), CaptureError> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| CaptureError::Init("capture handle already released".to_string()))?;
        handle.set_capture_size(capture_size)?;
        handle.set_frame_listener(listener, rate)?;
        handle.set_enabled(true)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if handle.is_enabled() {
                if let Err(e) = handle.set_enabled(false) {
                    log::debug!("ignoring capture disable error: {}", e);
                }
            }
            handle.release();
        }
    }
}

struct ActiveCapture {
    session: CaptureSession,
    capture_size: usize,
    live: Arc<RwLock<bool>>,
    _guard: CaptureGuard,
}

fn mark_dead(live: &RwLock<bool>) {
    match live.write() {
        Ok(mut flag) => *flag = false,
        Err(poisoned) => *poisoned.into_inner() = false,
    }
}

/// Wraps the OS capture and forwards frames to the registered handler
pub struct SpectralSampler {
    backend: Box<dyn CaptureBackend>,
    max_capture_size: usize,
    handler: Arc<Mutex<Option<FrameListener>>>,
    active: Option<ActiveCapture>,
}

impl SpectralSampler {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self::with_max_capture_size(backend, MAX_CAPTURE_SIZE)
    }

    pub fn with_max_capture_size(backend: Box<dyn CaptureBackend>, max_capture_size: usize) -> Self {
        Self {
            backend,
            max_capture_size,
            handler: Arc::new(Mutex::new(None)),
            active: None,
        }
    }

    /// Register the handler invoked once per capture tick. Replaces any
    /// previous handler, including for a capture that is already running.
    pub fn on_frame<F>(&mut self, handler: F)
    where
        F: Fn(SpectralFrame) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.handler.lock() {
            *slot = Some(Arc::new(handler));
        }
    }

    /// Start capturing `session`, stopping any capture already running
    pub fn start(&mut self, session: CaptureSession) -> Result<(), CaptureError> {
        self.stop();

        let (_, max_supported) = self.backend.capture_size_range();
        let capture_size = max_supported.min(self.max_capture_size);
        if capture_size < 2 {
            return Err(CaptureError::Init(format!(
                "unusable capture size {}",
                capture_size
            )));
        }
        let rate = self.backend.max_capture_rate();

        let mut guard = CaptureGuard::new(self.backend.open(session)?);
        let live = Arc::new(RwLock::new(true));

        let listener: FrameListener = {
            let live = live.clone();
            let handler = self.handler.clone();
            Arc::new(move |frame: SpectralFrame| {
                let Ok(alive) = live.read() else {
                    return;
                };
                if !*alive {
                    return;
                }
                let current = handler.lock().ok().and_then(|slot| slot.clone());
                if let Some(handler) = current {
                    handler(frame);
                }
            })
        };

        if let Err(e) = guard.configure(capture_size, listener, rate) {
            mark_dead(&live);
            log::warn!("capture configuration failed for {}: {}", session, e);
            return Err(e);
        }

        log::info!(
            "capture started on {} (size {}, rate {} mHz)",
            session,
            capture_size,
            rate
        );
        self.active = Some(ActiveCapture {
            session,
            capture_size,
            live,
            _guard: guard,
        });
        Ok(())
    }

    /// Stop and release the capture. No-op when nothing is running.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            mark_dead(&active.live);
            log::info!("capture stopped on {}", active.session);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<CaptureSession> {
        self.active.as_ref().map(|a| a.session)
    }

    pub fn capture_size(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.capture_size)
    }
}

impl Drop for SpectralSampler {
    fn drop(&mut self) {
        self.stop();
    }
}
