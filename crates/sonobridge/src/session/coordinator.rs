//! Session coordinator
//!
//! State machine for the visualizer lifecycle, audio focus, wake-lock
//! ownership and foreground-service liveness. Owned by the control thread;
//! everything from the OS arrives as an `OsEvent`, everything from the
//! consumer as a `BridgeCommand`. Failures never escape: they become tagged
//! band vectors, `false` results or no-ops.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};

use crate::clock::SharedClock;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, CaptureError};
use crate::visualizer::pipeline::{BandSink, Visualizer};
use crate::visualizer::sampler::CaptureBackend;
use crate::visualizer::types::{CaptureSession, SignalTag};

use super::platform::{AudioPlatform, MediaCommand};
use super::types::{
    Advisory, BridgeCommand, BridgeEvent, CoordinatorState, FocusChange, OsEvent, SessionSnapshot,
    SessionState,
};
use super::wake_lock::WakeLock;

/// Send without blocking; a full or closed consumer queue drops the event
fn emit(events: &Sender<BridgeEvent>, event: BridgeEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => log::debug!("event queue full, dropping {:?}", event),
        Err(TrySendError::Disconnected(_)) => {}
    }
}

pub struct SessionCoordinator {
    permission_request_code: i32,
    state: CoordinatorState,
    session: SessionState,
    visualizer: Visualizer,
    platform: Box<dyn AudioPlatform>,
    wake_lock: WakeLock,
    events: Sender<BridgeEvent>,
    /// Session to capture once the outstanding permission prompt is answered
    pending_session: Option<CaptureSession>,
    /// Focus was lost and not yet regained
    focus_lost: bool,
    /// Inside an OS interruption (begin seen, end not yet)
    interrupted: bool,
    /// Wake lock taken on `Active` entry
    lock_for_capture: bool,
    /// Wake lock taken by an explicit consumer request
    lock_for_consumer: bool,
}

impl SessionCoordinator {
    pub fn new(
        config: &BridgeConfig,
        backend: Box<dyn CaptureBackend>,
        platform: Box<dyn AudioPlatform>,
        clock: SharedClock,
        events: Sender<BridgeEvent>,
    ) -> Self {
        let band_events = events.clone();
        let sink: BandSink = Arc::new(move |vector| emit(&band_events, BridgeEvent::Bands(vector)));

        Self {
            permission_request_code: config.permission_request_code,
            state: CoordinatorState::Idle,
            session: SessionState::default(),
            visualizer: Visualizer::new(backend, config, clock.clone(), sink),
            platform,
            wake_lock: WakeLock::new(config.wake_lock_tag.clone(), config.wake_lock_timeout(), clock),
            events,
            pending_session: None,
            focus_lost: false,
            interrupted: false,
            lock_for_capture: false,
            lock_for_consumer: false,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut session_state = self.session;
        session_state.wake_lock_held = self.wake_lock.is_held();
        SessionSnapshot {
            state: self.state,
            session_state,
            capture: self.visualizer.session(),
            awaiting_permission: self.pending_session.is_some(),
            interrupted: self.interrupted,
        }
    }

    /// Run one consumer command. Commands without a result report `true`.
    pub fn execute(&mut self, command: BridgeCommand) -> bool {
        log::debug!("command {}", command);
        match command {
            BridgeCommand::StartVisualizer { session_id } => self.start_visualizer(session_id),
            BridgeCommand::StopVisualizer => self.stop_visualizer(),
            BridgeCommand::IsVisualizerActive => self.is_visualizer_active(),
            BridgeCommand::PausePlayback => {
                self.pause_playback();
                true
            }
            BridgeCommand::ResumePlayback => {
                self.resume_playback();
                true
            }
            BridgeCommand::StopPlayback => {
                self.stop_playback();
                true
            }
            BridgeCommand::IsPlaying => self.is_playing(),
            BridgeCommand::RequestAudioFocus => self.request_audio_focus(),
            BridgeCommand::AbandonAudioFocus => {
                self.abandon_audio_focus();
                true
            }
            BridgeCommand::AcquireWakeLock => self.acquire_wake_lock(),
            BridgeCommand::ReleaseWakeLock => {
                self.release_wake_lock();
                true
            }
            BridgeCommand::IsWakeLockHeld => self.is_wake_lock_held(),
            BridgeCommand::StartForegroundService => self.start_foreground_service(),
            BridgeCommand::StopForegroundService => self.stop_foreground_service(),
            BridgeCommand::IsAudioServiceRunning => self.is_audio_service_running(),
            BridgeCommand::IsBatteryOptimizationExempted => {
                self.is_battery_optimization_exempted()
            }
            BridgeCommand::RequestBatteryOptimizationExemption => {
                self.request_battery_optimization_exemption()
            }
            BridgeCommand::ShowBatteryOptimizationSettings => {
                self.show_battery_optimization_settings()
            }
            BridgeCommand::Detach => {
                self.detach();
                true
            }
        }
    }

    /// Dispatch one OS notification
    pub fn handle_os_event(&mut self, event: OsEvent) {
        match event {
            OsEvent::PermissionResult {
                request_code,
                granted,
            } => self.on_permission_result(request_code, granted),
            OsEvent::FocusChanged(change) => self.on_focus_change(change),
            OsEvent::InterruptionBegan => self.on_interruption_began(),
            OsEvent::InterruptionEnded => self.on_interruption_ended(),
            OsEvent::CaptureFailed(err) => self.on_capture_error(err),
            OsEvent::PlaybackStateReported(playing) => self.session.last_known_playing = playing,
            OsEvent::ServiceStateReported(running) => {
                self.session.service_running = Advisory::reported(running)
            }
        }
    }

    /// Periodic housekeeping from the control loop
    pub fn tick(&mut self) {
        if self.wake_lock.expire_if_due() {
            self.lock_for_capture = false;
            self.lock_for_consumer = false;
        }
    }

    // --- Visualizer ---

    pub fn start_visualizer(&mut self, session_id: i32) -> bool {
        let target = CaptureSession::from_raw(session_id);
        // A fresh start request may repeat an earlier alarm
        self.visualizer.rearm_signals();

        if self.pending_session.is_some() {
            log::debug!("permission prompt outstanding, retargeting to {}", target);
            self.pending_session = Some(target);
            return true;
        }

        if !self.platform.has_capture_permission() {
            log::info!("capture permission missing, prompting");
            self.visualizer.stop();
            self.release_capture_lock();
            self.pending_session = Some(target);
            self.transition(CoordinatorState::Starting);
            self.platform
                .request_capture_permission(self.permission_request_code);
            return true;
        }

        self.transition(CoordinatorState::Starting);
        self.begin_capture(target)
    }

    pub fn stop_visualizer(&mut self) -> bool {
        self.pending_session = None;
        self.visualizer.stop();
        self.release_capture_lock();
        self.transition(CoordinatorState::Idle);
        true
    }

    pub fn is_visualizer_active(&self) -> bool {
        self.visualizer.is_active()
    }

    fn begin_capture(&mut self, target: CaptureSession) -> bool {
        match self.visualizer.start(target) {
            Ok(()) => {
                self.enter_running();
                true
            }
            Err(err) => {
                self.fail_capture(err);
                false
            }
        }
    }

    /// Enter `Active`, or `Suspended` if focus is currently lost
    fn enter_running(&mut self) {
        if self.focus_lost {
            self.transition(CoordinatorState::Suspended);
        } else {
            self.transition(CoordinatorState::Active);
            self.acquire_capture_lock();
        }
    }

    fn fail_capture(&mut self, err: CaptureError) {
        log::warn!("capture failed: {}", BridgeError::from(err));
        self.visualizer.stop();
        self.release_capture_lock();
        self.transition(CoordinatorState::Error);
        self.visualizer.signal(SignalTag::CaptureError);
    }

    // --- OS callbacks ---

    pub fn on_permission_result(&mut self, request_code: i32, granted: bool) {
        if request_code != self.permission_request_code {
            log::debug!("ignoring permission result for request {}", request_code);
            return;
        }
        let Some(target) = self.pending_session.take() else {
            log::debug!("permission result with no start pending");
            return;
        };

        if granted {
            log::info!("capture permission granted");
            self.begin_capture(target);
        } else {
            log::warn!("{}", BridgeError::PermissionDenied);
            self.transition(CoordinatorState::Error);
            self.visualizer.signal(SignalTag::PermissionDenied);
        }
    }

    pub fn on_focus_change(&mut self, change: FocusChange) {
        match change {
            // Focus comes back with the interruption end, not before
            FocusChange::Gain if self.interrupted => {
                log::debug!("focus gain during interruption deferred")
            }
            FocusChange::Gain => self.focus_regained(),
            FocusChange::Loss | FocusChange::LossTransient => self.focus_dropped(),
            FocusChange::LossTransientCanDuck => log::debug!("focus ducked, keeping state"),
        }
    }

    pub fn on_interruption_began(&mut self) {
        log::info!("interruption began");
        self.interrupted = true;
        self.session.last_known_playing = false;
        self.focus_dropped();
    }

    pub fn on_interruption_ended(&mut self) {
        if !self.interrupted {
            log::debug!("interruption end without begin");
        }
        log::info!("interruption ended");
        self.interrupted = false;
        self.focus_regained();
    }

    pub fn on_capture_error(&mut self, err: CaptureError) {
        match self.state {
            CoordinatorState::Starting | CoordinatorState::Active | CoordinatorState::Suspended => {
                self.fail_capture(err)
            }
            CoordinatorState::Idle | CoordinatorState::Error => {
                log::debug!("capture error in {} ignored: {}", self.state, err)
            }
        }
    }

    fn focus_dropped(&mut self) {
        let had_focus = self.session.focus_held || !self.focus_lost;
        self.session.focus_held = false;
        self.focus_lost = true;
        if self.state == CoordinatorState::Active {
            self.transition(CoordinatorState::Suspended);
        }
        if had_focus {
            emit(&self.events, BridgeEvent::FocusChanged { has_focus: false });
        }
    }

    fn focus_regained(&mut self) {
        let was_lost = self.focus_lost || !self.session.focus_held;
        self.session.focus_held = true;
        self.focus_lost = false;
        if self.state == CoordinatorState::Suspended {
            self.transition(CoordinatorState::Active);
            self.acquire_capture_lock();
        }
        if was_lost {
            emit(&self.events, BridgeEvent::FocusChanged { has_focus: true });
        }
    }

    // --- Playback directives ---

    pub fn pause_playback(&mut self) {
        self.send_media(MediaCommand::Pause);
    }

    pub fn resume_playback(&mut self) {
        self.send_media(MediaCommand::Play);
    }

    pub fn stop_playback(&mut self) {
        self.send_media(MediaCommand::Stop);
        self.stop_foreground_service();
    }

    pub fn is_playing(&self) -> bool {
        self.session.last_known_playing || self.platform.is_music_active()
    }

    fn send_media(&mut self, command: MediaCommand) {
        if let Err(e) = self.platform.send_media_command(command) {
            log::warn!("media command {} not delivered: {}", command, e);
        }
    }

    // --- Focus ---

    pub fn request_audio_focus(&mut self) -> bool {
        if self.interrupted {
            log::warn!("{} during interruption", BridgeError::FocusRequestFailed);
            return false;
        }
        if self.platform.request_audio_focus() {
            self.focus_regained();
            true
        } else {
            log::warn!("{}", BridgeError::FocusRequestFailed);
            false
        }
    }

    pub fn abandon_audio_focus(&mut self) {
        self.platform.abandon_audio_focus();
        self.session.focus_held = false;
    }

    // --- Wake lock ---

    pub fn acquire_wake_lock(&mut self) -> bool {
        match self.wake_lock.acquire(self.platform.as_mut()) {
            Ok(()) => {
                self.lock_for_consumer = true;
                true
            }
            Err(e) => {
                log::warn!("wake lock not acquired: {}", e);
                false
            }
        }
    }

    pub fn release_wake_lock(&mut self) {
        self.wake_lock.release(self.platform.as_mut());
        self.lock_for_capture = false;
        self.lock_for_consumer = false;
    }

    pub fn is_wake_lock_held(&self) -> bool {
        self.wake_lock.is_held()
    }

    fn acquire_capture_lock(&mut self) {
        match self.wake_lock.acquire(self.platform.as_mut()) {
            Ok(()) => self.lock_for_capture = true,
            Err(e) => log::warn!("wake lock not acquired on activation: {}", e),
        }
    }

    /// Drop the capture's claim; the lock stays if the consumer holds it too
    fn release_capture_lock(&mut self) {
        if !self.lock_for_capture {
            return;
        }
        self.lock_for_capture = false;
        if !self.lock_for_consumer {
            self.wake_lock.release(self.platform.as_mut());
        }
    }

    // --- Foreground service ---

    pub fn start_foreground_service(&mut self) -> bool {
        match self.platform.start_foreground_service() {
            Ok(()) => {
                self.session.service_running = Advisory::requested(true);
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    pub fn stop_foreground_service(&mut self) -> bool {
        match self.platform.stop_foreground_service() {
            Ok(()) => {
                self.session.service_running = Advisory::requested(false);
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// An OS process-table reading wins; otherwise the advisory flag, which
    /// also counts audio from another app as a running session
    pub fn is_audio_service_running(&mut self) -> bool {
        if let Some(running) = self.platform.query_service_running() {
            self.session.service_running = Advisory::queried(running);
            return running;
        }
        self.session.service_running.value || self.platform.is_other_audio_playing()
    }

    // --- Battery optimization ---

    pub fn is_battery_optimization_exempted(&self) -> bool {
        self.platform.is_ignoring_battery_optimizations()
    }

    pub fn request_battery_optimization_exemption(&mut self) -> bool {
        if self.platform.is_ignoring_battery_optimizations() {
            return true;
        }
        match self.platform.request_battery_optimization_exemption() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("exemption request failed ({}), opening settings", e);
                self.show_battery_optimization_settings()
            }
        }
    }

    pub fn show_battery_optimization_settings(&mut self) -> bool {
        match self.platform.open_battery_optimization_settings() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("battery settings unavailable: {}", e);
                false
            }
        }
    }

    // --- Teardown ---

    /// Stop capture and give back focus and the wake lock
    pub fn detach(&mut self) {
        self.pending_session = None;
        self.visualizer.stop();
        if self.session.focus_held {
            self.platform.abandon_audio_focus();
        }
        self.release_wake_lock();
        self.session = SessionState::default();
        self.focus_lost = false;
        self.interrupted = false;
        self.transition(CoordinatorState::Idle);
        log::info!("session detached");
    }

    fn transition(&mut self, to: CoordinatorState) {
        let from = self.state;
        if from == to {
            return;
        }
        log::info!("session state {} -> {}", from, to);
        self.state = to;
        emit(&self.events, BridgeEvent::StateChanged { from, to });
    }
}
