// Scripted engine that records every call made across the engine boundary.
#![allow(dead_code)]

use hand_pipeline::engine::{EngineSettings, PerformanceInfo, RenderEvent, TrackingEngine};
use hand_pipeline::hand::{HandInfo, Vec3, HAND_COUNT, JOINT_COUNT};
use hand_pipeline::normalizer::{MaskBuffers, SharedTexture};
use hand_pipeline::session::{AssetStatus, LicenseAnswer, Session};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    Stop,
    SetResolution(u32, u32),
    SetTexture(u32, u32),
    SetFrameArray(usize),
    SetStereoFrameArrays(usize, usize),
    SetMaskBuffers(u32, u32),
    Process,
    CopyLatest,
    Trigger(i32),
}

#[derive(Clone, Default)]
pub struct Script {
    pub calls: Arc<Mutex<Vec<Call>>>,
    /// Result the async poll returns: frame number and both hands.
    pub latest: Arc<Mutex<(i64, [HandInfo; HAND_COUNT])>>,
    pub textures: Arc<Mutex<Vec<SharedTexture>>>,
}

impl Script {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_since(&self, mark: usize) -> Vec<Call> {
        self.calls.lock().unwrap()[mark..].to_vec()
    }

    pub fn publish(&self, frame_number: i64, hands: [HandInfo; HAND_COUNT]) {
        *self.latest.lock().unwrap() = (frame_number, hands);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct ScriptedEngine {
    pub script: Script,
    pub process_delay: Duration,
    pub processing_ms: i32,
}

impl ScriptedEngine {
    pub fn new() -> (Self, Script) {
        let script = Script::default();
        let engine = Self {
            script: script.clone(),
            process_delay: Duration::ZERO,
            processing_ms: 17,
        };
        (engine, script)
    }
}

impl TrackingEngine for ScriptedEngine {
    fn init(&mut self, _settings: &EngineSettings) -> AssetStatus {
        self.script.record(Call::Init);
        AssetStatus::new(LicenseAnswer::Ok, 1.0)
    }

    fn stop(&mut self) {
        self.script.record(Call::Stop);
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        self.script.record(Call::SetResolution(width, height));
    }

    fn set_texture(&mut self, texture: &SharedTexture, _downscale: u32) {
        self.script.record(Call::SetTexture(texture.width(), texture.height()));
        self.script.textures.lock().unwrap().push(texture.clone());
    }

    fn set_frame_array(&mut self, pixels: &[u8]) {
        self.script.record(Call::SetFrameArray(pixels.len()));
    }

    fn set_stereo_frame_arrays(&mut self, pixels: &[u8], second: &[u8]) {
        self.script.record(Call::SetStereoFrameArrays(pixels.len(), second.len()));
    }

    fn set_mask_buffers(&mut self, masks: &MaskBuffers) {
        let (w, h) = masks.dimensions();
        self.script.record(Call::SetMaskBuffers(w, h));
    }

    fn process_two_hands(&mut self, hands: &mut [HandInfo; HAND_COUNT], _session: &mut Session) {
        self.script.record(Call::Process);
        if !self.process_delay.is_zero() {
            thread::sleep(self.process_delay);
        }
        *hands = [visible_hand(0), visible_hand(1)];
    }

    fn copy_latest_result(&mut self, hands: &mut [HandInfo; HAND_COUNT], _session: &mut Session) -> i64 {
        self.script.record(Call::CopyLatest);
        let (frame_number, latest) = *self.script.latest.lock().unwrap();
        *hands = latest;
        frame_number
    }

    fn render_event(&mut self) -> Option<RenderEvent> {
        let calls = Arc::clone(&self.script.calls);
        Some(RenderEvent::new(move |id| calls.lock().unwrap().push(Call::Trigger(id))))
    }

    fn performance_info(&mut self) -> PerformanceInfo {
        PerformanceInfo {
            processing_ms: self.processing_ms,
            capture_ms: 0,
        }
    }
}

/// A confident hand in `slot` with every joint at `x`.
pub fn hand_at(slot: i32, x: f32) -> HandInfo {
    let mut hand = HandInfo::default();
    hand.gesture_info.left_right_hand = slot;
    hand.tracking_info.skeleton.confidence = 1.0;
    hand.tracking_info.depth_estimation = 0.5;
    for joint in 0..JOINT_COUNT {
        hand.tracking_info.skeleton.joint_positions[joint] = Vec3::new(x, 0.5, 0.0);
    }
    hand
}

pub fn visible_hand(slot: i32) -> HandInfo {
    hand_at(slot, 0.5)
}

pub fn no_hands() -> [HandInfo; HAND_COUNT] {
    [HandInfo::default(); HAND_COUNT]
}
