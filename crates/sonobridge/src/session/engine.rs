//! Bridge engine
//!
//! Runs the `SessionCoordinator` on a dedicated control thread. Consumer
//! commands and OS notifications are queued through one crossbeam channel and
//! handled strictly in arrival order; band vectors and state notifications
//! come back on the event channel.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::clock::{MonotonicClock, SharedClock};
use crate::config::capture::DEFAULT_SESSION_ID;
use crate::config::engine::{COMMAND_QUEUE_CAPACITY, EVENT_QUEUE_CAPACITY, REPLY_TIMEOUT_MS};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, CaptureError, Result};
use crate::visualizer::sampler::CaptureBackend;

use super::coordinator::SessionCoordinator;
use super::platform::AudioPlatform;
use super::types::{BridgeCommand, BridgeEvent, FocusChange, OsEvent, SessionSnapshot};

enum ControlMessage {
    Command {
        command: BridgeCommand,
        reply: Option<Sender<bool>>,
    },
    Os(OsEvent),
    Snapshot(Sender<SessionSnapshot>),
    Shutdown,
}

/// Cloneable handle through which OS callbacks reach the control thread
#[derive(Clone)]
pub struct OsEvents {
    tx: Sender<ControlMessage>,
}

impl OsEvents {
    /// Queue an event. Returns false if the queue is full or the engine is gone.
    pub fn post(&self, event: OsEvent) -> bool {
        match self.tx.try_send(ControlMessage::Os(event)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("control queue full, dropping OS event");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn permission_result(&self, request_code: i32, granted: bool) -> bool {
        self.post(OsEvent::PermissionResult {
            request_code,
            granted,
        })
    }

    pub fn focus_changed(&self, change: FocusChange) -> bool {
        self.post(OsEvent::FocusChanged(change))
    }

    pub fn interruption_began(&self) -> bool {
        self.post(OsEvent::InterruptionBegan)
    }

    pub fn interruption_ended(&self) -> bool {
        self.post(OsEvent::InterruptionEnded)
    }

    pub fn capture_failed(&self, err: CaptureError) -> bool {
        self.post(OsEvent::CaptureFailed(err))
    }
}

/// Bridge between the host's playback layer and the OS audio subsystem
pub struct BridgeEngine {
    cmd_tx: Sender<ControlMessage>,
    event_rx: Receiver<BridgeEvent>,
    reply_timeout: Duration,
    thread: Option<JoinHandle<()>>,
}

impl BridgeEngine {
    /// Spawn the control thread using the monotonic clock
    pub fn new(
        config: BridgeConfig,
        backend: Box<dyn CaptureBackend>,
        platform: Box<dyn AudioPlatform>,
    ) -> Result<Self> {
        Self::with_clock(config, backend, platform, MonotonicClock::shared())
    }

    pub fn with_clock(
        config: BridgeConfig,
        backend: Box<dyn CaptureBackend>,
        platform: Box<dyn AudioPlatform>,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = bounded::<ControlMessage>(COMMAND_QUEUE_CAPACITY);
        let (event_tx, event_rx) = bounded::<BridgeEvent>(EVENT_QUEUE_CAPACITY);
        let tick = config.control_tick();
        let coordinator = SessionCoordinator::new(&config, backend, platform, clock, event_tx);

        let thread = thread::Builder::new()
            .name("session-control".to_string())
            .spawn(move || Self::run(coordinator, cmd_rx, tick))
            .map_err(|e| BridgeError::Engine(format!("Failed to spawn control thread: {}", e)))?;

        Ok(Self {
            cmd_tx,
            event_rx,
            reply_timeout: Duration::from_millis(REPLY_TIMEOUT_MS),
            thread: Some(thread),
        })
    }

    /// Session id that selects the default output mix
    pub fn default_audio_session_id() -> i32 {
        DEFAULT_SESSION_ID
    }

    /// Queue a command without waiting for its result
    pub fn send(&self, command: BridgeCommand) {
        let _ = self.cmd_tx.send_timeout(
            ControlMessage::Command {
                command,
                reply: None,
            },
            self.reply_timeout,
        );
    }

    /// Run a command and wait for its result. An unresponsive or stopped
    /// engine answers `false`.
    pub fn ask(&self, command: BridgeCommand) -> bool {
        let (reply_tx, reply_rx) = bounded(1);
        let message = ControlMessage::Command {
            command,
            reply: Some(reply_tx),
        };
        if self.cmd_tx.send_timeout(message, self.reply_timeout).is_err() {
            log::warn!("control thread unavailable for {}", command);
            return false;
        }
        reply_rx.recv_timeout(self.reply_timeout).unwrap_or(false)
    }

    // --- Visualizer ---

    pub fn start_visualizer(&self, session_id: i32) -> bool {
        self.ask(BridgeCommand::StartVisualizer { session_id })
    }

    pub fn stop_visualizer(&self) -> bool {
        self.ask(BridgeCommand::StopVisualizer)
    }

    pub fn is_visualizer_active(&self) -> bool {
        self.ask(BridgeCommand::IsVisualizerActive)
    }

    // --- Playback ---

    pub fn pause_playback(&self) {
        self.send(BridgeCommand::PausePlayback);
    }

    pub fn resume_playback(&self) {
        self.send(BridgeCommand::ResumePlayback);
    }

    pub fn stop_playback(&self) {
        self.send(BridgeCommand::StopPlayback);
    }

    pub fn is_playing(&self) -> bool {
        self.ask(BridgeCommand::IsPlaying)
    }

    /// Host-confirmed playback state
    pub fn report_playback_state(&self, playing: bool) {
        self.os_events().post(OsEvent::PlaybackStateReported(playing));
    }

    // --- Focus ---

    pub fn request_audio_focus(&self) -> bool {
        self.ask(BridgeCommand::RequestAudioFocus)
    }

    pub fn abandon_audio_focus(&self) {
        self.send(BridgeCommand::AbandonAudioFocus);
    }

    // --- Wake lock ---

    pub fn acquire_wake_lock(&self) {
        self.send(BridgeCommand::AcquireWakeLock);
    }

    pub fn release_wake_lock(&self) {
        self.send(BridgeCommand::ReleaseWakeLock);
    }

    pub fn is_wake_lock_held(&self) -> bool {
        self.ask(BridgeCommand::IsWakeLockHeld)
    }

    // --- Foreground service ---

    pub fn start_foreground_service(&self) -> bool {
        self.ask(BridgeCommand::StartForegroundService)
    }

    pub fn stop_foreground_service(&self) -> bool {
        self.ask(BridgeCommand::StopForegroundService)
    }

    pub fn is_audio_service_running(&self) -> bool {
        self.ask(BridgeCommand::IsAudioServiceRunning)
    }

    /// Host-reported service liveness
    pub fn report_service_running(&self, running: bool) {
        self.os_events().post(OsEvent::ServiceStateReported(running));
    }

    // --- Battery optimization ---

    pub fn is_battery_optimization_exempted(&self) -> bool {
        self.ask(BridgeCommand::IsBatteryOptimizationExempted)
    }

    pub fn request_battery_optimization_exemption(&self) -> bool {
        self.ask(BridgeCommand::RequestBatteryOptimizationExemption)
    }

    pub fn show_battery_optimization_settings(&self) -> bool {
        self.ask(BridgeCommand::ShowBatteryOptimizationSettings)
    }

    /// Stop capture, drop focus and the wake lock, reset session state
    pub fn detach(&self) {
        self.ask(BridgeCommand::Detach);
    }

    // --- Plumbing ---

    /// Handle for OS callbacks
    pub fn os_events(&self) -> OsEvents {
        OsEvents {
            tx: self.cmd_tx.clone(),
        }
    }

    /// Non-blocking poll for the next event
    pub fn try_recv_event(&self) -> Option<BridgeEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Get a reference to the event receiver for use with `select!`
    pub fn event_receiver(&self) -> &Receiver<BridgeEvent> {
        &self.event_rx
    }

    /// Current coordinator state as seen by the control thread
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = bounded(1);
        self.cmd_tx
            .send_timeout(ControlMessage::Snapshot(tx), self.reply_timeout)
            .ok()?;
        rx.recv_timeout(self.reply_timeout).ok()
    }

    /// Graceful shutdown (consumes self)
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let _ = self.cmd_tx.send(ControlMessage::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// The control loop, running on the dedicated thread
    fn run(mut coordinator: SessionCoordinator, cmd_rx: Receiver<ControlMessage>, tick: Duration) {
        log::debug!("control thread started");
        loop {
            match cmd_rx.recv_timeout(tick) {
                Ok(ControlMessage::Command { command, reply }) => {
                    let result = coordinator.execute(command);
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
                Ok(ControlMessage::Os(event)) => coordinator.handle_os_event(event),
                Ok(ControlMessage::Snapshot(reply)) => {
                    let _ = reply.send(coordinator.snapshot());
                }
                Ok(ControlMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    coordinator.detach();
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
            coordinator.tick();
        }
        log::debug!("control thread exiting");
    }
}

impl Drop for BridgeEngine {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
