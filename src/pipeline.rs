// src/pipeline.rs - Context object wiring source, normalizer, bridge and consumer
use crate::bridge::{PerformanceReport, ProcessingMode, TickOutcome, TrackingBridge};
use crate::config::PipelineConfig;
use crate::engine::{EngineSettings, TrackingEngine};
use crate::error::{EngineError, PipelineError};
use crate::hand::{HandInfo, LeftOrRightHand, HAND_COUNT};
use crate::normalizer::{FrameNormalizer, NormalizedFrame};
use crate::orientation::{OrientationCompensator, ViewCamera};
use crate::session::{AssetStatus, Orientation, Session, SessionFlag, DEFAULT_FINGER_INFO, MAX_FINGER_INFO};
use crate::source::{FrameSource, ResolutionPolicy, SourceEvent};
use crate::tracking::{HandTracker, StableHand, TrackerConfig};
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Capturing,
    Paused,
    Disposed,
}

impl PipelineState {
    fn label(self) -> &'static str {
        match self {
            PipelineState::Uninitialized => "uninitialized",
            PipelineState::Capturing => "capturing",
            PipelineState::Paused => "paused",
            PipelineState::Disposed => "disposed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    LicenseInitialized(AssetStatus),
    StateChanged { from: PipelineState, to: PipelineState },
    FrameProcessed { frame_number: i64 },
    SkeletonModelChanged { three_d: bool },
    SmoothingChanged(f32),
    ContourToggled(bool),
    OrientationChanged(Orientation),
    CameraChanged { front_facing: bool },
    ModeChanged(ProcessingMode),
    PerformanceReport(PerformanceReport),
    CaptureUnavailable(String),
}

/// Owns every pipeline component. Created at startup, passed to whoever
/// drives the tick, torn down with `shutdown`.
pub struct HandPipeline<E: TrackingEngine> {
    state: PipelineState,
    source: FrameSource,
    normalizer: FrameNormalizer,
    bridge: TrackingBridge<E>,
    compensator: OrientationCompensator,
    tracker: HandTracker,
    display_portrait: (u32, u32),
    license: Option<AssetStatus>,
    last_frame: Option<NormalizedFrame>,
    events: VecDeque<PipelineEvent>,
    started: Instant,
}

impl<E: TrackingEngine> HandPipeline<E> {
    pub fn new(source: FrameSource, engine: E, config: &PipelineConfig) -> Self {
        let mut bridge = TrackingBridge::new(engine, config.mode, config.downscale);
        {
            let session = bridge.session_mut();
            session.features = config.features.to_features();
            session.smoothing = config.smoothing.clamp(0.0, 1.0);
            session.gesture_smoothing = config.gesture_smoothing.clamp(0.0, 1.0);
            session.set_orientation(source.orientation().for_facing(source.front_facing()));
            session.set_add_on(source.add_on());
        }

        let display_portrait = (config.display.width, config.display.height);
        let (sw, sh) = ResolutionPolicy::display_for(display_portrait, source.orientation());
        let camera = ViewCamera::new(sw, sh, config.display.fov_degrees);
        let compensator = OrientationCompensator::new(camera, config.display.cover_screen);

        let tracker = HandTracker::new(TrackerConfig {
            filter: config.filter_settings(),
            smoothing_enabled: config.smoothing_enabled,
        });

        Self {
            state: PipelineState::Uninitialized,
            source,
            normalizer: FrameNormalizer::new(config.resolution),
            bridge,
            compensator,
            tracker,
            display_portrait,
            license: None,
            last_frame: None,
            events: VecDeque::new(),
            started: Instant::now(),
        }
    }

    /// Initializes the engine. A rejected license is recorded and published
    /// as an event; the pipeline keeps running with whatever the engine
    /// still produces.
    pub fn initialize(&mut self, settings: &EngineSettings) -> Result<AssetStatus, PipelineError> {
        self.ensure_alive()?;
        let status = match self.bridge.init(settings) {
            Ok(status) => status,
            Err(EngineError::License(answer)) => {
                self.bridge.status().unwrap_or_else(|| AssetStatus::new(answer, 0.0))
            }
        };
        self.license = Some(status);
        self.events.push_back(PipelineEvent::LicenseInitialized(status));
        Ok(status)
    }

    fn ensure_alive(&self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Disposed {
            Err(PipelineError::Disposed)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, to: PipelineState) {
        let from = self.state;
        if from == to {
            return;
        }
        info!(from = from.label(), to = to.label(), "Pipeline state changed");
        self.state = to;
        self.events.push_back(PipelineEvent::StateChanged { from, to });
    }

    pub fn tick(&mut self) -> Result<Option<TickOutcome>, PipelineError> {
        self.tick_at(Instant::now())
    }

    /// One host-loop iteration. Returns `None` while paused.
    pub fn tick_at(&mut self, now: Instant) -> Result<Option<TickOutcome>, PipelineError> {
        match self.state {
            PipelineState::Disposed => return Err(PipelineError::Disposed),
            PipelineState::Paused => return Ok(None),
            PipelineState::Uninitialized | PipelineState::Capturing => {}
        }

        let raw = match self.source.read() {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "Capture unavailable this tick");
                self.events.push_back(PipelineEvent::CaptureUnavailable(e.to_string()));
                return Err(e.into());
            }
        };
        let orientation_changed = self.handle_source_events();
        if self.state == PipelineState::Uninitialized {
            self.transition(PipelineState::Capturing);
        }

        let frame = self.normalizer.normalize(&raw)?;
        if frame.reallocated || orientation_changed {
            let (w, h) = frame.dimensions();
            self.compensator.update_borders(self.source.orientation(), w, h);
        }

        let outcome = self.bridge.tick_at(&frame, true, now);
        if let TickOutcome::Processed { frame_number } = outcome {
            let timestamp = now.saturating_duration_since(self.started).as_secs_f64();
            self.tracker.update(self.bridge.hands(), &self.compensator, timestamp);
            self.events.push_back(PipelineEvent::FrameProcessed { frame_number });
        }
        if let Some(report) = self.bridge.take_report() {
            self.events.push_back(PipelineEvent::PerformanceReport(report));
        }
        self.last_frame = Some(frame);
        Ok(Some(outcome))
    }

    /// Applies queued source notifications to the session. Returns true
    /// when the session orientation changed.
    fn handle_source_events(&mut self) -> bool {
        let mut changed = false;
        for event in self.source.drain_events() {
            match event {
                SourceEvent::OrientationChanged(orientation) => {
                    changed |= self.apply_orientation();
                    self.events.push_back(PipelineEvent::OrientationChanged(orientation));
                }
                SourceEvent::CameraChanged { front_facing } => {
                    changed |= self.apply_orientation();
                    self.events.push_back(PipelineEvent::CameraChanged { front_facing });
                }
                SourceEvent::FrameProduced { .. } => {}
            }
        }
        changed
    }

    fn apply_orientation(&mut self) -> bool {
        let base = self.source.orientation();
        let target = base.for_facing(self.source.front_facing());
        let add_on = self.source.add_on();
        let session = self.bridge.session_mut();
        session.set_add_on(add_on);
        if session.orientation() == target {
            return false;
        }
        session.set_orientation(target);

        let (sw, sh) = ResolutionPolicy::display_for(self.display_portrait, base);
        let camera = self.compensator.camera_mut();
        camera.screen_width = sw;
        camera.screen_height = sh;

        if self.bridge.registered().is_some() {
            self.bridge.invalidate_registration();
        }
        info!(orientation = ?target, "Session orientation updated");
        true
    }

    /// Feeds a device orientation reading from the host.
    pub fn observe_device_orientation(&mut self, reading: Orientation) -> bool {
        self.source.observe_device_orientation(reading)
    }

    pub fn set_front_facing(&mut self, front_facing: bool) {
        self.source.set_front_facing(front_facing);
    }

    /// Host focus notification. Losing focus pauses; regaining it
    /// re-registers the current frame and resumes.
    pub fn focus_changed(&mut self, focused: bool) {
        if focused {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn pause(&mut self) {
        if self.state != PipelineState::Capturing {
            return;
        }
        self.tracker.clear();
        self.transition(PipelineState::Paused);
    }

    pub fn resume(&mut self) {
        if self.state != PipelineState::Paused {
            return;
        }
        if let Some(frame) = &self.last_frame {
            self.bridge.register_now(frame);
        }
        self.transition(PipelineState::Capturing);
    }

    /// Stops the engine and releases every buffer. Further ticks fail.
    pub fn shutdown(&mut self) {
        if self.state == PipelineState::Disposed {
            return;
        }
        self.bridge.shutdown();
        self.tracker.clear();
        self.last_frame = None;
        self.normalizer.release();
        self.transition(PipelineState::Disposed);
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        if mode == self.bridge.mode() {
            return;
        }
        self.bridge.set_mode(mode);
        self.events.push_back(PipelineEvent::ModeChanged(mode));
    }

    pub fn toggle_mode(&mut self) -> ProcessingMode {
        let mode = self.bridge.mode().toggled();
        self.set_mode(mode);
        mode
    }

    pub fn set_skeleton_3d(&mut self, enabled: bool) {
        self.bridge.session_mut().features.skeleton_3d = i32::from(enabled);
        self.events.push_back(PipelineEvent::SkeletonModelChanged { three_d: enabled });
    }

    pub fn set_gestures(&mut self, enabled: bool) {
        self.bridge.session_mut().features.gestures = i32::from(enabled);
    }

    pub fn set_fast_mode(&mut self, enabled: bool) {
        self.bridge.session_mut().features.fast_mode = i32::from(enabled);
    }

    pub fn set_wrist_info(&mut self, enabled: bool) {
        self.bridge.session_mut().features.wrist_info = i32::from(enabled);
    }

    /// Selects the finger measured by the engine: 0 = off, 1 = thumb .. 5 = pinky.
    pub fn set_finger_info(&mut self, finger: i32) -> Result<(), PipelineError> {
        if !(0..=MAX_FINGER_INFO).contains(&finger) {
            warn!(finger, "Finger info must be between 0 and 5");
            return Err(PipelineError::InvalidFingerIndex(finger));
        }
        self.bridge.session_mut().features.finger_info = finger;
        Ok(())
    }

    pub fn toggle_finger_info(&mut self, enabled: bool) {
        let finger = if enabled { DEFAULT_FINGER_INFO } else { 0 };
        self.bridge.session_mut().features.finger_info = finger;
    }

    pub fn set_contour(&mut self, enabled: bool) {
        self.bridge.session_mut().features.contour = i32::from(enabled);
        self.events.push_back(PipelineEvent::ContourToggled(enabled));
    }

    /// Updates both the engine-side smoothing and the local filter beta.
    pub fn set_smoothing(&mut self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        self.bridge.session_mut().smoothing = value;
        self.tracker.set_smoothing(value);
        self.events.push_back(PipelineEvent::SmoothingChanged(value));
    }

    pub fn set_gesture_smoothing(&mut self, value: f32) {
        self.bridge.session_mut().gesture_smoothing = value.clamp(0.0, 1.0);
    }

    pub fn set_smoothing_enabled(&mut self, enabled: bool) {
        self.tracker.set_smoothing_enabled(enabled);
    }

    pub fn set_resolution_policy(&mut self, policy: ResolutionPolicy) {
        self.normalizer.set_policy(policy);
    }

    pub fn set_cover_screen(&mut self, cover_screen: bool) {
        self.compensator.set_cover_screen(cover_screen);
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn session(&self) -> &Session {
        self.bridge.session()
    }

    pub fn session_flag(&self) -> SessionFlag {
        self.bridge.session().flag()
    }

    pub fn license_status(&self) -> Option<AssetStatus> {
        self.license
    }

    pub fn mode(&self) -> ProcessingMode {
        self.bridge.mode()
    }

    pub fn raw_hands(&self) -> &[HandInfo; HAND_COUNT] {
        self.bridge.hands()
    }

    pub fn stable_hands(&self) -> &[StableHand; HAND_COUNT] {
        self.tracker.hands()
    }

    /// Raw result for one side, if the engine currently sees that hand.
    pub fn try_hand_info(&self, side: LeftOrRightHand) -> Option<&HandInfo> {
        let hand = &self.bridge.hands()[side.slot()?];
        hand.is_valid().then_some(hand)
    }

    pub fn any_hand_visible(&self) -> bool {
        self.bridge.hands().iter().any(HandInfo::is_valid)
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut FrameSource {
        &mut self.source
    }

    pub fn bridge(&self) -> &TrackingBridge<E> {
        &self.bridge
    }

    pub fn compensator(&self) -> &OrientationCompensator {
        &self.compensator
    }

    pub fn current_frame(&self) -> Option<&NormalizedFrame> {
        self.last_frame.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<PipelineEvent> {
        self.events.drain(..).collect()
    }
}

impl<E: TrackingEngine> Drop for HandPipeline<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
