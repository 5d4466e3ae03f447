//! Simulated OS platform
//!
//! Logs every directive and hands permission prompts to the main loop, which
//! answers them the way a user would.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use sonobridge::error::Result;
use sonobridge::session::{AudioPlatform, MediaCommand};

pub struct SimulatedPlatform {
    permission_granted: Arc<AtomicBool>,
    prompts: Sender<i32>,
    service_running: bool,
}

impl SimulatedPlatform {
    /// `permission_granted` is shared with whoever answers the prompts
    pub fn new(permission_granted: Arc<AtomicBool>, prompts: Sender<i32>) -> Self {
        Self {
            permission_granted,
            prompts,
            service_running: false,
        }
    }
}

impl AudioPlatform for SimulatedPlatform {
    fn has_capture_permission(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    fn request_capture_permission(&mut self, request_code: i32) {
        log::info!("[os] permission prompt shown (request {})", request_code);
        let _ = self.prompts.send(request_code);
    }

    fn request_audio_focus(&mut self) -> bool {
        log::info!("[os] audio focus granted");
        true
    }

    fn abandon_audio_focus(&mut self) {
        log::info!("[os] audio focus abandoned");
    }

    fn send_media_command(&mut self, command: MediaCommand) -> Result<()> {
        log::info!("[os] media button: {}", command);
        Ok(())
    }

    fn acquire_wake_lock(&mut self, tag: &str, timeout: Duration) -> Result<()> {
        log::info!("[os] wake lock '{}' acquired ({}s)", tag, timeout.as_secs());
        Ok(())
    }

    fn release_wake_lock(&mut self) {
        log::info!("[os] wake lock released");
    }

    fn start_foreground_service(&mut self) -> Result<()> {
        self.service_running = true;
        log::info!("[os] foreground service started");
        Ok(())
    }

    fn stop_foreground_service(&mut self) -> Result<()> {
        self.service_running = false;
        log::info!("[os] foreground service stopped");
        Ok(())
    }

    fn query_service_running(&self) -> Option<bool> {
        Some(self.service_running)
    }
}
