//! OS collaborator interface
//!
//! Everything the coordinator asks of the operating system goes through
//! `AudioPlatform`. Asynchronous answers (permission prompts, focus changes,
//! interruptions) come back as `OsEvent`s on the control queue rather than
//! through this trait.

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Directive forwarded to the OS media-session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Play,
    Pause,
    Stop,
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaCommand::Play => write!(f, "play"),
            MediaCommand::Pause => write!(f, "pause"),
            MediaCommand::Stop => write!(f, "stop"),
        }
    }
}

/// The operating system's audio, power and service primitives
pub trait AudioPlatform: Send {
    /// Whether the capture permission is currently granted
    fn has_capture_permission(&self) -> bool;

    /// Show the permission prompt. The answer arrives later as
    /// `OsEvent::PermissionResult` carrying the same `request_code`.
    fn request_capture_permission(&mut self, request_code: i32);

    /// Ask for audio focus; `true` when granted immediately
    fn request_audio_focus(&mut self) -> bool;

    fn abandon_audio_focus(&mut self);

    /// Best-effort media-session directive (media button broadcast or similar)
    fn send_media_command(&mut self, command: MediaCommand) -> Result<()>;

    /// Whether the OS reports music output as active
    fn is_music_active(&self) -> bool {
        false
    }

    /// Whether another application is producing audio
    fn is_other_audio_playing(&self) -> bool {
        false
    }

    /// Acquire a partial wake lock that the OS releases on its own after `timeout`
    fn acquire_wake_lock(&mut self, tag: &str, timeout: Duration) -> Result<()>;

    fn release_wake_lock(&mut self);

    fn start_foreground_service(&mut self) -> Result<()>;

    fn stop_foreground_service(&mut self) -> Result<()>;

    /// Authoritative service liveness from the OS process table, when the
    /// platform can read it
    fn query_service_running(&self) -> Option<bool> {
        None
    }

    /// Platforms without battery optimization are always exempt
    fn is_ignoring_battery_optimizations(&self) -> bool {
        true
    }

    /// Ask the user to exempt the app from battery optimization
    fn request_battery_optimization_exemption(&mut self) -> Result<()> {
        Ok(())
    }

    /// Open the battery optimization settings page
    fn open_battery_optimization_settings(&mut self) -> Result<()> {
        Ok(())
    }
}
