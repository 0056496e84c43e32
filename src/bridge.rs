// src/bridge.rs - Hands frames to the tracking engine in sync or async mode
use crate::engine::{EngineSettings, RenderEvent, TrackingEngine};
use crate::error::EngineError;
use crate::hand::{HandInfo, HAND_COUNT};
use crate::normalizer::{NormalizedFrame, SharedTexture};
use crate::session::{AssetStatus, Session};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

const LATENCY_WINDOW: usize = 30;
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Blocking engine call on the caller's tick.
    Sync,
    /// Engine processes on its own thread; results are polled.
    #[default]
    Async,
}

impl ProcessingMode {
    pub fn toggled(self) -> Self {
        match self {
            ProcessingMode::Sync => ProcessingMode::Async,
            ProcessingMode::Async => ProcessingMode::Sync,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceReport {
    pub fps: u32,
    pub processing_ms: u32,
    pub mode: ProcessingMode,
}

/// Frame rate and processing latency over a rolling window.
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub avg_fps: u32,
    pub avg_processing_ms: u32,
    frame_times: VecDeque<u32>,
    frames_in_window: u32,
    window_start: Option<Instant>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: 0,
            avg_processing_ms: 0,
            frame_times: VecDeque::with_capacity(LATENCY_WINDOW),
            frames_in_window: 0,
            window_start: None,
        }
    }

    /// Records a wall-clock processing sample. A negative duration (the
    /// clock stepped backwards) is dropped.
    pub fn record_processing(&mut self, start: SystemTime, end: SystemTime) -> Option<u32> {
        match end.duration_since(start) {
            Ok(elapsed) => {
                let ms = elapsed.as_millis().min(u128::from(u32::MAX)) as u32;
                if self.frame_times.len() == LATENCY_WINDOW {
                    self.frame_times.pop_front();
                }
                self.frame_times.push_back(ms);
                Some(ms)
            }
            Err(e) => {
                trace!(behind_ms = e.duration().as_millis() as u64, "Discarding negative processing time");
                None
            }
        }
    }

    pub fn sample_count(&self) -> usize {
        self.frame_times.len()
    }

    pub fn average_processing_ms(&self) -> Option<u32> {
        if self.frame_times.is_empty() {
            return None;
        }
        let sum: u64 = self.frame_times.iter().map(|&ms| u64::from(ms)).sum();
        Some((sum / self.frame_times.len() as u64) as u32)
    }

    pub fn clear_samples(&mut self) {
        self.frame_times.clear();
    }

    /// Counts one tick. Returns the frame count once per interval.
    pub fn count_frame(&mut self, now: Instant) -> Option<u32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames_in_window += 1;
        if now.duration_since(start) < REPORT_INTERVAL {
            return None;
        }
        let fps = self.frames_in_window;
        self.frames_in_window = 0;
        self.window_start = Some(now);
        self.avg_fps = fps;
        Some(fps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Frame pixels do not match the session orientation.
    OrientationMismatch,
    /// A new registration waits for the next tick.
    RegistrationPending,
    /// No render event available to trigger the engine.
    NoRenderEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// New result accepted into the hand slots.
    Processed { frame_number: i64 },
    /// The engine returned the same result as last time.
    Repeated { frame_number: i64 },
    /// Result computed against a previous registration; ignored.
    Stale { frame_number: i64 },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy)]
struct PendingRegistration {
    /// Ticks to let pass before registering.
    deferred_ticks: u32,
}

pub struct TrackingBridge<E: TrackingEngine> {
    engine: E,
    mode: ProcessingMode,
    downscale: u32,
    session: Session,
    hands: [HandInfo; HAND_COUNT],
    status: Option<AssetStatus>,
    registered: Option<SharedTexture>,
    render_event: Option<RenderEvent>,
    pending: Option<PendingRegistration>,
    last_frame_number: i64,
    accepted_frame_number: i64,
    stale_through: i64,
    sync_frames: i64,
    metrics: PerformanceMetrics,
    report: Option<PerformanceReport>,
}

impl<E: TrackingEngine> TrackingBridge<E> {
    pub fn new(engine: E, mode: ProcessingMode, downscale: u32) -> Self {
        Self {
            engine,
            mode,
            downscale: downscale.clamp(1, 10),
            session: Session::default(),
            hands: [HandInfo::default(); HAND_COUNT],
            status: None,
            registered: None,
            render_event: None,
            pending: None,
            last_frame_number: 0,
            accepted_frame_number: 0,
            stale_through: 0,
            sync_frames: 0,
            metrics: PerformanceMetrics::new(),
            report: None,
        }
    }

    /// One-time engine setup. A rejected license is returned as an error but
    /// the bridge stays usable; the engine decides what it still produces.
    pub fn init(&mut self, settings: &EngineSettings) -> Result<AssetStatus, EngineError> {
        let status = self.engine.init(settings);
        self.status = Some(status);
        self.render_event = self.engine.render_event();
        let answer = status.license_answer();
        if status.is_licensed() {
            info!(version = status.version, "Tracking engine initialized");
            Ok(status)
        } else {
            warn!(?answer, message = ?answer.user_message(), "Tracking engine license rejected");
            Err(EngineError::License(answer))
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn status(&self) -> Option<AssetStatus> {
        self.status
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn hands(&self) -> &[HandInfo; HAND_COUNT] {
        &self.hands
    }

    pub fn registered(&self) -> Option<&SharedTexture> {
        self.registered.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn take_report(&mut self) -> Option<PerformanceReport> {
        self.report.take()
    }

    /// Marks the current registration obsolete. Any result the engine is
    /// still computing belongs to it and is dropped. Async mode lets one
    /// tick pass before re-registering; sync mode re-registers on the next.
    pub fn invalidate_registration(&mut self) {
        let deferred_ticks = match self.mode {
            ProcessingMode::Sync => 0,
            ProcessingMode::Async => 1,
        };
        self.stale_through = self.last_frame_number + 1;
        debug!(
            stale_through = self.stale_through,
            deferred_ticks,
            "Registration invalidated"
        );
        self.pending = Some(PendingRegistration { deferred_ticks });
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        if mode == self.mode {
            return;
        }
        info!(?mode, "Switching processing mode");
        self.mode = mode;
        self.metrics.clear_samples();
        if self.registered.is_none() {
            return;
        }
        self.invalidate_registration();
        if let Some(pending) = self.pending.as_mut() {
            pending.deferred_ticks = 0;
        }
    }

    /// Registers `frame` with the engine right away, bypassing the
    /// one-tick delay. Used when resuming.
    pub fn register_now(&mut self, frame: &NormalizedFrame) {
        self.apply_registration(frame);
    }

    fn apply_registration(&mut self, frame: &NormalizedFrame) {
        if self.registered.is_some() {
            // The engine may have started another pass on the old buffer
            // while registration was deferred.
            self.stale_through = self.stale_through.max(self.last_frame_number + 1);
        }
        let (width, height) = frame.dimensions();
        self.engine.set_resolution(width, height);
        self.engine.set_mask_buffers(&frame.masks);
        if self.mode == ProcessingMode::Async {
            self.engine.set_texture(&frame.texture, self.downscale);
            if self.render_event.is_none() {
                self.render_event = self.engine.render_event();
            }
        }
        debug!(
            width,
            height,
            generation = frame.texture.generation(),
            mode = ?self.mode,
            "Registered frame with engine"
        );
        // Replacing the handle releases the previous buffer only now.
        self.registered = Some(frame.texture.clone());
        self.pending = None;
    }

    fn needs_registration(&self, frame: &NormalizedFrame) -> bool {
        match &self.registered {
            Some(current) => !current.same_buffer(&frame.texture),
            None => true,
        }
    }

    pub fn tick(&mut self, frame: &NormalizedFrame, frame_updated: bool) -> TickOutcome {
        self.tick_at(frame, frame_updated, Instant::now())
    }

    pub fn tick_at(&mut self, frame: &NormalizedFrame, frame_updated: bool, now: Instant) -> TickOutcome {
        let outcome = self.run_tick(frame, frame_updated);
        if let Some(fps) = self.metrics.count_frame(now) {
            self.publish_report(fps);
        }
        outcome
    }

    fn run_tick(&mut self, frame: &NormalizedFrame, frame_updated: bool) -> TickOutcome {
        let expected = frame.orientation.for_facing(frame.front_facing);
        if expected != self.session.orientation() {
            debug!(
                frame = ?expected,
                session = ?self.session.orientation(),
                "Skipping tick: frame orientation does not match session"
            );
            return TickOutcome::Skipped(SkipReason::OrientationMismatch);
        }

        if self.pending.is_none() && self.needs_registration(frame) {
            if self.registered.is_none() {
                // First registration has nothing in flight to go stale.
                self.pending = Some(PendingRegistration { deferred_ticks: 0 });
            } else {
                self.invalidate_registration();
            }
        }

        if let Some(pending) = self.pending.as_mut() {
            if pending.deferred_ticks > 0 {
                pending.deferred_ticks -= 1;
                if self.mode == ProcessingMode::Async {
                    self.drain_old_results();
                }
                return TickOutcome::Skipped(SkipReason::RegistrationPending);
            }
            self.apply_registration(frame);
        }

        match self.mode {
            ProcessingMode::Sync => self.process_sync(frame),
            ProcessingMode::Async => {
                if frame_updated {
                    match &self.render_event {
                        Some(event) => event.issue(RenderEvent::PROCESS),
                        None => return TickOutcome::Skipped(SkipReason::NoRenderEvent),
                    }
                }
                self.poll()
            }
        }
    }

    fn process_sync(&mut self, frame: &NormalizedFrame) -> TickOutcome {
        {
            let pixels = frame.texture.read();
            match &frame.second {
                Some(second) => {
                    let second = second.read();
                    self.engine.set_stereo_frame_arrays(pixels.as_raw(), second.as_raw());
                }
                None => self.engine.set_frame_array(pixels.as_raw()),
            }
        }
        let start = SystemTime::now();
        self.engine.process_two_hands(&mut self.hands, &mut self.session);
        let end = SystemTime::now();
        self.metrics.record_processing(start, end);

        self.sync_frames += 1;
        TickOutcome::Processed {
            frame_number: self.sync_frames,
        }
    }

    fn poll(&mut self) -> TickOutcome {
        let mut hands = self.hands;
        let frame_number = self.engine.copy_latest_result(&mut hands, &mut self.session);
        self.last_frame_number = self.last_frame_number.max(frame_number);

        if frame_number <= self.stale_through && self.stale_through > 0 {
            if frame_number > self.accepted_frame_number {
                debug!(frame_number, stale_through = self.stale_through, "Discarding stale result");
            }
            return TickOutcome::Stale { frame_number };
        }
        if frame_number == self.accepted_frame_number {
            return TickOutcome::Repeated { frame_number };
        }
        self.hands = hands;
        self.accepted_frame_number = frame_number;
        TickOutcome::Processed { frame_number }
    }

    /// Everything the engine finishes before re-registration was computed
    /// on the old buffer. Only the frame number is kept.
    fn drain_old_results(&mut self) {
        let mut hands = self.hands;
        let frame_number = self.engine.copy_latest_result(&mut hands, &mut self.session);
        if frame_number > self.last_frame_number {
            debug!(frame_number, "Dropping result computed on the replaced buffer");
            self.last_frame_number = frame_number;
        }
    }

    fn publish_report(&mut self, fps: u32) {
        let processing_ms = match self.mode {
            ProcessingMode::Async => {
                let info = self.engine.performance_info();
                u32::try_from(info.processing_ms).unwrap_or(0)
            }
            ProcessingMode::Sync => {
                let avg = self.metrics.average_processing_ms().unwrap_or(0);
                self.metrics.clear_samples();
                avg
            }
        };
        self.metrics.avg_processing_ms = processing_ms;
        let report = PerformanceReport {
            fps,
            processing_ms,
            mode: self.mode,
        };
        info!(fps, processing_ms, mode = ?self.mode, "Tracking performance");
        self.report = Some(report);
    }

    /// Clears both hand slots, e.g. while paused.
    pub fn clear_hands(&mut self) {
        self.hands = [HandInfo::default(); HAND_COUNT];
    }

    /// Stops the engine and drops every buffer handle.
    pub fn shutdown(&mut self) {
        self.engine.stop();
        self.registered = None;
        self.render_event = None;
        self.pending = None;
        self.clear_hands();
        info!("Tracking engine stopped");
    }
}
