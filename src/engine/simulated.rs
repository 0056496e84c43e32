// src/engine/simulated.rs - Stand-in engine producing a synthetic moving hand
//
// Honors the same contract as the native library: a blocking sync path and
// an async path where a worker thread processes the registered texture when
// triggered and the caller polls for the latest result.
use super::{EngineSettings, PerformanceInfo, RenderEvent, TrackingEngine};
use crate::hand::{HandInfo, Quat, Vec3, HAND_COUNT, JOINT_COUNT};
use crate::normalizer::{MaskBuffers, SharedTexture};
use crate::session::{AssetStatus, LicenseAnswer, Session, SessionFlag};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

const SIM_FPS: f64 = 30.0;
const MIN_PROCESS_SIDE: u32 = 64;
const ENGINE_VERSION: f32 = 2.0;

enum WorkerMsg {
    Process,
    Stop,
}

struct Shared {
    texture: Option<SharedTexture>,
    masks: Option<MaskBuffers>,
    resolution: (u32, u32),
    session: Session,
    latest: [HandInfo; HAND_COUNT],
    latest_session: Session,
    frame_number: i64,
    processing_ms: i32,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            texture: None,
            masks: None,
            resolution: (0, 0),
            session: Session::default(),
            latest: [HandInfo::default(); HAND_COUNT],
            latest_session: Session::default(),
            frame_number: 0,
            processing_ms: 0,
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulatedEngine {
    license: LicenseAnswer,
    shared: Arc<Mutex<Shared>>,
    trigger: Option<Sender<WorkerMsg>>,
    worker: Option<JoinHandle<()>>,
    frame_len: usize,
    sync_frames: i64,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::with_license(LicenseAnswer::Ok)
    }

    /// An engine whose `init` reports the given license answer.
    pub fn with_license(license: LicenseAnswer) -> Self {
        Self {
            license,
            shared: Arc::new(Mutex::new(Shared::default())),
            trigger: None,
            worker: None,
            frame_len: 0,
            sync_frames: 0,
        }
    }

    fn spawn_worker(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel::<WorkerMsg>();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("sim-hand-engine".into())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        WorkerMsg::Process => process_registered(&shared),
                        WorkerMsg::Stop => break,
                    }
                }
                debug!("Simulated engine worker exiting");
            });
        match handle {
            Ok(handle) => {
                self.trigger = Some(tx);
                self.worker = Some(handle);
            }
            Err(e) => warn!(error = %e, "Failed to spawn simulated engine worker"),
        }
    }

    fn join_worker(&mut self) {
        if let Some(tx) = self.trigger.take() {
            let _ = tx.send(WorkerMsg::Stop);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.join_worker();
    }
}

fn session_flag(width: u32, height: u32) -> SessionFlag {
    if width == 0 || height == 0 {
        SessionFlag::ImageSizeIsZero
    } else if width.min(height) < MIN_PROCESS_SIDE {
        SessionFlag::ImageIsTooSmall
    } else {
        SessionFlag::None
    }
}

/// Worker-thread body for one triggered frame.
fn process_registered(shared: &Mutex<Shared>) {
    let start = Instant::now();
    let (texture, session, frame_number) = {
        let state = lock(shared);
        (state.texture.clone(), state.session, state.frame_number + 1)
    };
    let Some(texture) = texture else {
        return;
    };

    let (width, height) = texture.dimensions();
    let mut session = session;
    session.set_flag(session_flag(width, height));
    let mut hands = [HandInfo::default(); HAND_COUNT];
    if session.flag() == SessionFlag::None {
        let brightness = {
            let pixels = texture.read();
            mean_luma(pixels.as_raw())
        };
        simulate_hands(frame_number as f64 / SIM_FPS, brightness, &session, &mut hands);
    }

    let mut state = lock(shared);
    // A texture swapped in while this frame ran still gets this result; the
    // caller decides whether it is stale.
    state.latest = hands;
    state.latest_session = session;
    state.frame_number = frame_number;
    state.processing_ms = start.elapsed().as_millis() as i32;
}

fn mean_luma(rgba: &[u8]) -> f32 {
    if rgba.is_empty() {
        return 0.0;
    }
    let stride = (rgba.len() / 4 / 256).max(1);
    let (sum, count) = rgba
        .chunks_exact(4)
        .step_by(stride)
        .fold((0u64, 0u64), |(s, c), px| {
            (s + (u64::from(px[0]) + u64::from(px[1]) + u64::from(px[2])) / 3, c + 1)
        });
    if count == 0 {
        0.0
    } else {
        sum as f32 / count as f32 / 255.0
    }
}

/// Fan of five fingers, four joints each, around a wrist that drifts on a
/// slow Lissajous path. An all-black frame yields no hand.
fn simulate_hands(t: f64, brightness: f32, session: &Session, hands: &mut [HandInfo; HAND_COUNT]) {
    if brightness <= 0.0 {
        return;
    }
    let tracked = if session.features.two_hands == 0 { 1 } else { HAND_COUNT };
    for (slot, hand) in hands.iter_mut().enumerate().take(tracked) {
        let side = if slot == 0 { -1.0 } else { 1.0 };
        let phase = slot as f64 * 1.5;
        let wrist_x = 0.5 + side * (0.15 + 0.1 * (t * 0.5 + phase).cos());
        let wrist_y = 0.35 + 0.1 * (t + phase).sin();
        let openness = 0.75 + 0.25 * (t * 0.3 + phase).sin();

        let info = &mut hand.tracking_info;
        info.skeleton.confidence = 1.0;
        info.depth_estimation = (0.5 + 0.2 * (t * 0.2).sin()) as f32;
        info.skeleton.joint_positions[0] = Vec3::new(wrist_x as f32, wrist_y as f32, 0.0);
        for finger in 0..5 {
            let angle = std::f64::consts::FRAC_PI_2 + side * (finger as f64 - 2.0) * 0.3;
            for segment in 1..=4 {
                let index = 1 + finger * 4 + (segment - 1);
                let reach = segment as f64 * 0.035 * openness;
                info.skeleton.joint_positions[index] = Vec3::new(
                    (wrist_x + angle.cos() * reach) as f32,
                    (wrist_y + angle.sin() * reach) as f32,
                    0.0,
                );
            }
        }
        for joint in 0..JOINT_COUNT {
            let p = info.skeleton.joint_positions[joint];
            info.world_skeleton.joint_positions[joint] =
                Vec3::new(p.x - 0.5, p.y - 0.5, -0.02 * joint as f32 / JOINT_COUNT as f32);
            let half = (0.1 * (t + joint as f64 * 0.1).sin()) as f32 * 0.5;
            info.world_skeleton.joint_rotations[joint] = Quat::new(0.0, 0.0, half.sin(), half.cos());
        }
        info.bounding_box.top_left = Vec3::new((wrist_x - 0.15) as f32, (wrist_y + 0.2) as f32, 0.0);
        info.bounding_box.width = 0.3;
        info.bounding_box.height = 0.25;

        let gesture = &mut hand.gesture_info;
        gesture.left_right_hand = slot as i32;
        gesture.hand_side = 1;
        gesture.mano_class = if openness > 0.6 { 0 } else { 1 };
        gesture.continuous = if openness > 0.6 { 1 } else { 3 };
        let frame = (t * SIM_FPS).round() as i64;
        gesture.trigger = if session.features.gestures != 0 && frame % 90 == 45 { 0 } else { -1 };
        hand.warning = 0;
    }
}

impl TrackingEngine for SimulatedEngine {
    fn init(&mut self, settings: &EngineSettings) -> AssetStatus {
        info!(
            image_format = ?settings.image_format,
            license = ?self.license,
            "Initializing simulated hand engine"
        );
        self.spawn_worker();
        AssetStatus::new(self.license, ENGINE_VERSION)
    }

    fn stop(&mut self) {
        self.join_worker();
        let mut state = lock(&self.shared);
        state.texture = None;
        state.masks = None;
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        lock(&self.shared).resolution = (width, height);
    }

    fn set_texture(&mut self, texture: &SharedTexture, downscale: u32) {
        debug!(
            width = texture.width(),
            height = texture.height(),
            downscale,
            "Simulated engine texture registered"
        );
        lock(&self.shared).texture = Some(texture.clone());
    }

    fn set_frame_array(&mut self, pixels: &[u8]) {
        self.frame_len = pixels.len();
    }

    fn set_stereo_frame_arrays(&mut self, pixels: &[u8], _second: &[u8]) {
        self.frame_len = pixels.len();
    }

    fn set_mask_buffers(&mut self, masks: &MaskBuffers) {
        lock(&self.shared).masks = Some(masks.clone());
    }

    fn process_two_hands(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) {
        let (width, height) = lock(&self.shared).resolution;
        *hands = [HandInfo::default(); HAND_COUNT];
        let expected = width as usize * height as usize * 4;
        let flag = if self.frame_len != expected {
            SessionFlag::ImageSizeIsZero
        } else {
            session_flag(width, height)
        };
        session.set_flag(flag);
        if flag != SessionFlag::None {
            return;
        }
        self.sync_frames += 1;
        simulate_hands(self.sync_frames as f64 / SIM_FPS, 1.0, session, hands);
    }

    fn copy_latest_result(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) -> i64 {
        let mut state = lock(&self.shared);
        // The caller's session is the configuration for the next frame.
        state.session = *session;
        *hands = state.latest;
        session.set_flag(state.latest_session.flag());
        state.frame_number
    }

    fn render_event(&mut self) -> Option<RenderEvent> {
        let tx = Mutex::new(self.trigger.clone()?);
        Some(RenderEvent::new(move |event_id| {
            if event_id == RenderEvent::PROCESS {
                let sender = tx.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = sender.send(WorkerMsg::Process);
            }
        }))
    }

    fn performance_info(&mut self) -> PerformanceInfo {
        PerformanceInfo {
            processing_ms: lock(&self.shared).processing_ms,
            capture_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::SharedTexture;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    fn poll_until(engine: &mut SimulatedEngine, frame: i64) -> [HandInfo; HAND_COUNT] {
        let mut hands = [HandInfo::default(); HAND_COUNT];
        let mut session = Session::default();
        for _ in 0..200 {
            if engine.copy_latest_result(&mut hands, &mut session) >= frame {
                return hands;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("worker never produced frame {frame}");
    }

    #[test]
    fn async_worker_processes_registered_texture() {
        let mut engine = SimulatedEngine::new();
        assert!(engine.init(&EngineSettings::default()).is_licensed());
        let texture = SharedTexture::new(RgbaImage::from_pixel(480, 270, Rgba([128, 128, 128, 255])), 1);
        engine.set_resolution(480, 270);
        engine.set_texture(&texture, 1);

        let event = engine.render_event().expect("render event");
        event.issue(RenderEvent::PROCESS);
        let hands = poll_until(&mut engine, 1);
        assert!(hands.iter().all(HandInfo::is_valid));
        engine.stop();
    }

    #[test]
    fn sync_path_checks_frame_size() {
        let mut engine = SimulatedEngine::new();
        engine.init(&EngineSettings::default());
        engine.set_resolution(4, 4);
        engine.set_frame_array(&[0; 64]);
        let mut hands = [HandInfo::default(); HAND_COUNT];
        let mut session = Session::default();
        engine.process_two_hands(&mut hands, &mut session);
        assert_eq!(session.flag(), SessionFlag::ImageIsTooSmall);

        engine.set_resolution(128, 128);
        engine.set_frame_array(&[0; 16]);
        engine.process_two_hands(&mut hands, &mut session);
        assert_eq!(session.flag(), SessionFlag::ImageSizeIsZero);

        engine.set_frame_array(&vec![0; 128 * 128 * 4]);
        engine.process_two_hands(&mut hands, &mut session);
        assert_eq!(session.flag(), SessionFlag::None);
        assert!(hands[0].is_valid());
        assert!(hands[1].is_valid());
    }

    #[test]
    fn single_hand_when_two_hands_disabled() {
        let mut session = Session::default();
        session.features.two_hands = 0;
        let mut hands = [HandInfo::default(); HAND_COUNT];
        simulate_hands(1.0, 1.0, &session, &mut hands);
        assert!(hands[0].is_valid());
        assert!(!hands[1].is_valid());
    }

    #[test]
    fn rejected_license_is_reported() {
        let mut engine = SimulatedEngine::with_license(LicenseAnswer::Expired);
        let status = engine.init(&EngineSettings::default());
        assert_eq!(status.license_answer(), LicenseAnswer::Expired);
    }
}
