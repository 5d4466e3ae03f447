//! Session coordination types
//!
//! States, inbound OS events, consumer commands and outbound events.

use std::fmt;

use crate::error::CaptureError;
use crate::visualizer::types::{BandVector, CaptureSession};

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    #[default]
    Idle,
    /// Start requested; waiting on permission or capture initialization
    Starting,
    /// Capturing with focus held
    Active,
    /// Capture running but focus lost or interrupted
    Suspended,
    /// Permission denied or capture failed; cleared by the next start request
    Error,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "Idle"),
            CoordinatorState::Starting => write!(f, "Starting"),
            CoordinatorState::Active => write!(f, "Active"),
            CoordinatorState::Suspended => write!(f, "Suspended"),
            CoordinatorState::Error => write!(f, "Error"),
        }
    }
}

/// Where an advisory value last came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisorySource {
    /// What the coordinator last asked the OS to do
    Requested,
    /// A report pushed by the host (may lag the OS)
    Reported,
    /// Read from the OS process table at the time of the query
    Queried,
}

/// Best-effort mirror of OS state. Only a `Queried` value reflects the OS
/// at the moment it was read; the others may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advisory<T> {
    pub value: T,
    pub source: AdvisorySource,
}

impl<T> Advisory<T> {
    pub fn requested(value: T) -> Self {
        Self {
            value,
            source: AdvisorySource::Requested,
        }
    }

    pub fn reported(value: T) -> Self {
        Self {
            value,
            source: AdvisorySource::Reported,
        }
    }

    pub fn queried(value: T) -> Self {
        Self {
            value,
            source: AdvisorySource::Queried,
        }
    }
}

/// Mutable session record owned by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub focus_held: bool,
    /// True only while an acquisition exists and its expiry has not passed
    pub wake_lock_held: bool,
    pub service_running: Advisory<bool>,
    /// Last OS-confirmed playback state
    pub last_known_playing: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            focus_held: false,
            wake_lock_held: false,
            service_running: Advisory::requested(false),
            last_known_playing: false,
        }
    }
}

/// Kind of an OS audio-focus callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    Gain,
    Loss,
    LossTransient,
    /// Another app ducks our output; focus is kept
    LossTransientCanDuck,
}

/// Asynchronous notifications from the OS, delivered through the control queue
#[derive(Debug, Clone, PartialEq)]
pub enum OsEvent {
    /// Answer to a capture-permission prompt
    PermissionResult { request_code: i32, granted: bool },
    FocusChanged(FocusChange),
    InterruptionBegan,
    InterruptionEnded,
    /// The running capture failed
    CaptureFailed(CaptureError),
    /// Host-confirmed playback state
    PlaybackStateReported(bool),
    /// Host-reported foreground-service liveness
    ServiceStateReported(bool),
}

/// Commands accepted from the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand {
    StartVisualizer { session_id: i32 },
    StopVisualizer,
    IsVisualizerActive,
    PausePlayback,
    ResumePlayback,
    StopPlayback,
    IsPlaying,
    RequestAudioFocus,
    AbandonAudioFocus,
    AcquireWakeLock,
    ReleaseWakeLock,
    IsWakeLockHeld,
    StartForegroundService,
    StopForegroundService,
    IsAudioServiceRunning,
    IsBatteryOptimizationExempted,
    RequestBatteryOptimizationExemption,
    ShowBatteryOptimizationSettings,
    Detach,
}

impl fmt::Display for BridgeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeCommand::StartVisualizer { session_id } => {
                write!(f, "startVisualizer({})", session_id)
            }
            BridgeCommand::StopVisualizer => write!(f, "stopVisualizer"),
            BridgeCommand::IsVisualizerActive => write!(f, "isVisualizerActive"),
            BridgeCommand::PausePlayback => write!(f, "pausePlayback"),
            BridgeCommand::ResumePlayback => write!(f, "resumePlayback"),
            BridgeCommand::StopPlayback => write!(f, "stopPlayback"),
            BridgeCommand::IsPlaying => write!(f, "isPlaying"),
            BridgeCommand::RequestAudioFocus => write!(f, "requestAudioFocus"),
            BridgeCommand::AbandonAudioFocus => write!(f, "abandonAudioFocus"),
            BridgeCommand::AcquireWakeLock => write!(f, "acquireWakeLock"),
            BridgeCommand::ReleaseWakeLock => write!(f, "releaseWakeLock"),
            BridgeCommand::IsWakeLockHeld => write!(f, "isWakeLockHeld"),
            BridgeCommand::StartForegroundService => write!(f, "startForegroundService"),
            BridgeCommand::StopForegroundService => write!(f, "stopForegroundService"),
            BridgeCommand::IsAudioServiceRunning => write!(f, "isAudioServiceRunning"),
            BridgeCommand::IsBatteryOptimizationExempted => {
                write!(f, "isBatteryOptimizationExempted")
            }
            BridgeCommand::RequestBatteryOptimizationExemption => {
                write!(f, "requestBatteryOptimizationExemption")
            }
            BridgeCommand::ShowBatteryOptimizationSettings => {
                write!(f, "showBatteryOptimizationSettings")
            }
            BridgeCommand::Detach => write!(f, "detach"),
        }
    }
}

/// Events delivered to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// One emitted band vector
    Bands(BandVector),
    FocusChanged { has_focus: bool },
    StateChanged {
        from: CoordinatorState,
        to: CoordinatorState,
    },
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: CoordinatorState,
    pub session_state: SessionState,
    /// Session of the running capture, if any
    pub capture: Option<CaptureSession>,
    /// A permission prompt is outstanding
    pub awaiting_permission: bool,
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_defaults_to_idle() {
        assert_eq!(CoordinatorState::default(), CoordinatorState::Idle);
        assert_eq!(CoordinatorState::Suspended.to_string(), "Suspended");
    }

    #[test]
    fn session_state_default() {
        let state = SessionState::default();
        assert!(!state.focus_held);
        assert!(!state.wake_lock_held);
        assert!(!state.last_known_playing);
        assert_eq!(state.service_running, Advisory::requested(false));
    }

    #[test]
    fn advisory_constructors_record_source() {
        assert_eq!(Advisory::reported(true).source, AdvisorySource::Reported);
        assert_eq!(Advisory::queried(false).source, AdvisorySource::Queried);
        assert!(Advisory::requested(true).value);
    }

    #[test]
    fn command_display_uses_host_names() {
        assert_eq!(
            BridgeCommand::StartVisualizer { session_id: 7 }.to_string(),
            "startVisualizer(7)"
        );
        assert_eq!(BridgeCommand::IsWakeLockHeld.to_string(), "isWakeLockHeld");
    }
}
