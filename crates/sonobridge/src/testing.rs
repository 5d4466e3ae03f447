//! Recording doubles for the OS collaborators, shared by the unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{BridgeError, CaptureError, Result};
use crate::session::platform::{AudioPlatform, MediaCommand};
use crate::visualizer::sampler::{CaptureBackend, CaptureHandle, FrameListener};
use crate::visualizer::types::{CaptureSession, SpectralFrame};

// --- Capture ---

#[derive(Clone, Default)]
pub struct CaptureLog {
    pub opened: Vec<CaptureSession>,
    pub released: usize,
    pub live_handles: usize,
    pub enabled: bool,
    pub capture_size: Option<usize>,
    pub rate: Option<u32>,
    listener: Option<FrameListener>,
}

struct CaptureState {
    log: CaptureLog,
    size_range: (usize, usize),
    fail_open: Option<CaptureError>,
    fail_configure: Option<CaptureError>,
}

/// Capture backend whose frames are pushed by hand
#[derive(Clone)]
pub struct MockCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl MockCapture {
    pub const MAX_RATE: u32 = 20_000;

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState {
                log: CaptureLog::default(),
                size_range: (128, 1024),
                fail_open: None,
                fail_configure: None,
            })),
        }
    }

    pub fn log(&self) -> CaptureLog {
        self.state.lock().unwrap().log.clone()
    }

    pub fn set_size_range(&self, min: usize, max: usize) {
        self.state.lock().unwrap().size_range = (min, max);
    }

    pub fn fail_open(&self, err: CaptureError) {
        self.state.lock().unwrap().fail_open = Some(err);
    }

    pub fn fail_configure(&self, err: CaptureError) {
        self.state.lock().unwrap().fail_configure = Some(err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_open = None;
        state.fail_configure = None;
    }

    pub fn listener(&self) -> Option<FrameListener> {
        self.state.lock().unwrap().log.listener.clone()
    }

    /// Deliver a frame the way the OS capture thread would
    pub fn push_frame(&self, frame: SpectralFrame) {
        if let Some(listener) = self.listener() {
            listener(frame);
        }
    }
}

impl CaptureBackend for MockCapture {
    fn capture_size_range(&self) -> (usize, usize) {
        self.state.lock().unwrap().size_range
    }

    fn max_capture_rate(&self) -> u32 {
        Self::MAX_RATE
    }

    fn open(&mut self, session: CaptureSession) -> std::result::Result<Box<dyn CaptureHandle>, CaptureError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_open.clone() {
            return Err(err);
        }
        state.log.opened.push(session);
        state.log.live_handles += 1;
        Ok(Box::new(MockHandle {
            state: self.state.clone(),
            enabled: false,
        }))
    }
}

struct MockHandle {
    state: Arc<Mutex<CaptureState>>,
    enabled: bool,
}

impl CaptureHandle for MockHandle {
    fn set_capture_size(&mut self, size: usize) -> std::result::Result<(), CaptureError> {
        self.state.lock().unwrap().log.capture_size = Some(size);
        Ok(())
    }

    fn set_frame_listener(
        &mut self,
        listener: FrameListener,
        rate: u32,
    ) -> std::result::Result<(), CaptureError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_configure.clone() {
            return Err(err);
        }
        state.log.listener = Some(listener);
        state.log.rate = Some(rate);
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) -> std::result::Result<(), CaptureError> {
        self.enabled = enabled;
        self.state.lock().unwrap().log.enabled = enabled;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.log.released += 1;
        state.log.live_handles -= 1;
        state.log.listener = None;
    }
}

// --- Platform ---

#[derive(Debug, Clone, Default)]
pub struct PlatformLog {
    pub permission_requests: Vec<i32>,
    pub focus_requests: usize,
    pub focus_abandons: usize,
    pub media_commands: Vec<MediaCommand>,
    pub wake_lock_acquires: Vec<(String, Duration)>,
    pub wake_lock_releases: usize,
    pub service_starts: usize,
    pub service_stops: usize,
    pub exemption_requests: usize,
    pub settings_opened: usize,
}

#[derive(Debug, Clone)]
pub struct PlatformBehavior {
    pub permission_granted: bool,
    pub grant_focus: bool,
    pub fail_service_start: bool,
    pub fail_service_stop: bool,
    pub fail_wake_lock: bool,
    pub fail_media: bool,
    pub fail_exemption_request: bool,
    pub service_table: Option<bool>,
    pub other_audio_playing: bool,
    pub music_active: bool,
    pub battery_exempt: bool,
}

impl Default for PlatformBehavior {
    fn default() -> Self {
        Self {
            permission_granted: true,
            grant_focus: true,
            fail_service_start: false,
            fail_service_stop: false,
            fail_wake_lock: false,
            fail_media: false,
            fail_exemption_request: false,
            service_table: None,
            other_audio_playing: false,
            music_active: false,
            battery_exempt: false,
        }
    }
}

/// Platform double that records every call
#[derive(Clone, Default)]
pub struct MockPlatform {
    log: Arc<Mutex<PlatformLog>>,
    behavior: Arc<Mutex<PlatformBehavior>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> PlatformLog {
        self.log.lock().unwrap().clone()
    }

    pub fn configure(&self, f: impl FnOnce(&mut PlatformBehavior)) {
        f(&mut self.behavior.lock().unwrap());
    }

    fn behavior(&self) -> PlatformBehavior {
        self.behavior.lock().unwrap().clone()
    }
}

impl AudioPlatform for MockPlatform {
    fn has_capture_permission(&self) -> bool {
        self.behavior().permission_granted
    }

    fn request_capture_permission(&mut self, request_code: i32) {
        self.log.lock().unwrap().permission_requests.push(request_code);
    }

    fn request_audio_focus(&mut self) -> bool {
        self.log.lock().unwrap().focus_requests += 1;
        self.behavior().grant_focus
    }

    fn abandon_audio_focus(&mut self) {
        self.log.lock().unwrap().focus_abandons += 1;
    }

    fn send_media_command(&mut self, command: MediaCommand) -> Result<()> {
        self.log.lock().unwrap().media_commands.push(command);
        if self.behavior().fail_media {
            return Err(BridgeError::Platform("broadcast rejected".to_string()));
        }
        Ok(())
    }

    fn is_music_active(&self) -> bool {
        self.behavior().music_active
    }

    fn is_other_audio_playing(&self) -> bool {
        self.behavior().other_audio_playing
    }

    fn acquire_wake_lock(&mut self, tag: &str, timeout: Duration) -> Result<()> {
        if self.behavior().fail_wake_lock {
            return Err(BridgeError::Platform("power service unavailable".to_string()));
        }
        self.log
            .lock()
            .unwrap()
            .wake_lock_acquires
            .push((tag.to_string(), timeout));
        Ok(())
    }

    fn release_wake_lock(&mut self) {
        self.log.lock().unwrap().wake_lock_releases += 1;
    }

    fn start_foreground_service(&mut self) -> Result<()> {
        self.log.lock().unwrap().service_starts += 1;
        if self.behavior().fail_service_start {
            return Err(BridgeError::ServiceStartFailed(
                "background start not allowed".to_string(),
            ));
        }
        Ok(())
    }

    fn stop_foreground_service(&mut self) -> Result<()> {
        self.log.lock().unwrap().service_stops += 1;
        if self.behavior().fail_service_stop {
            return Err(BridgeError::ServiceStopFailed("no such service".to_string()));
        }
        Ok(())
    }

    fn query_service_running(&self) -> Option<bool> {
        self.behavior().service_table
    }

    fn is_ignoring_battery_optimizations(&self) -> bool {
        self.behavior().battery_exempt
    }

    fn request_battery_optimization_exemption(&mut self) -> Result<()> {
        self.log.lock().unwrap().exemption_requests += 1;
        if self.behavior().fail_exemption_request {
            return Err(BridgeError::Platform("activity not found".to_string()));
        }
        Ok(())
    }

    fn open_battery_optimization_settings(&mut self) -> Result<()> {
        self.log.lock().unwrap().settings_opened += 1;
        Ok(())
    }
}
