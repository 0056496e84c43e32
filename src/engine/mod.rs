// src/engine/mod.rs - Boundary to the external hand tracking engine
#[cfg(feature = "native-engine")]
mod native;
mod simulated;

#[cfg(feature = "native-engine")]
pub use native::NativeEngine;
pub use simulated::SimulatedEngine;

use crate::hand::{HandInfo, HAND_COUNT};
use crate::normalizer::{MaskBuffers, SharedTexture};
use crate::session::{AssetStatus, Session};
use std::fmt;
use std::sync::Arc;

/// Pixel layouts understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ImageFormat {
    Bgr = 1,
    Rgb = 2,
    Rgba = 3,
    Bgra = 4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub platform: i32,
    pub image_format: ImageFormat,
    pub license_key: String,
    pub seg_mode: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            platform: 0,
            image_format: ImageFormat::Rgba,
            license_key: String::new(),
            seg_mode: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerformanceInfo {
    pub processing_ms: i32,
    pub capture_ms: i32,
}

/// One-shot trigger that wakes the engine's worker thread.
#[derive(Clone)]
pub struct RenderEvent(Arc<dyn Fn(i32) + Send + Sync>);

impl RenderEvent {
    pub const PROCESS: i32 = 1;

    pub fn new(f: impl Fn(i32) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn issue(&self, event_id: i32) {
        (self.0)(event_id)
    }
}

impl fmt::Debug for RenderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderEvent")
    }
}

/// Calls the bridge makes into the engine. Implementations never panic and
/// never return errors: status comes back through out-parameters, exactly
/// like the native ABI.
pub trait TrackingEngine: Send {
    fn init(&mut self, settings: &EngineSettings) -> AssetStatus;

    fn stop(&mut self);

    fn set_resolution(&mut self, width: u32, height: u32);

    /// Async mode: registers the buffer the worker thread reads from.
    fn set_texture(&mut self, texture: &SharedTexture, downscale: u32);

    /// Sync mode: pushes a copy of the pixels for the next process call.
    fn set_frame_array(&mut self, pixels: &[u8]);

    fn set_stereo_frame_arrays(&mut self, pixels: &[u8], second: &[u8]);

    /// Registers the per-hand occlusion mask buffers.
    fn set_mask_buffers(&mut self, masks: &MaskBuffers);

    /// Sync mode: blocks until both hands are written.
    fn process_two_hands(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session);

    /// Async mode: copies the latest finished result, returning its frame
    /// number. May return the same result on consecutive calls.
    fn copy_latest_result(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) -> i64;

    fn render_event(&mut self) -> Option<RenderEvent>;

    fn performance_info(&mut self) -> PerformanceInfo;
}

impl<E: TrackingEngine + ?Sized> TrackingEngine for Box<E> {
    fn init(&mut self, settings: &EngineSettings) -> AssetStatus {
        (**self).init(settings)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        (**self).set_resolution(width, height)
    }

    fn set_texture(&mut self, texture: &SharedTexture, downscale: u32) {
        (**self).set_texture(texture, downscale)
    }

    fn set_frame_array(&mut self, pixels: &[u8]) {
        (**self).set_frame_array(pixels)
    }

    fn set_stereo_frame_arrays(&mut self, pixels: &[u8], second: &[u8]) {
        (**self).set_stereo_frame_arrays(pixels, second)
    }

    fn set_mask_buffers(&mut self, masks: &MaskBuffers) {
        (**self).set_mask_buffers(masks)
    }

    fn process_two_hands(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) {
        (**self).process_two_hands(hands, session)
    }

    fn copy_latest_result(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) -> i64 {
        (**self).copy_latest_result(hands, session)
    }

    fn render_event(&mut self) -> Option<RenderEvent> {
        (**self).render_event()
    }

    fn performance_info(&mut self) -> PerformanceInfo {
        (**self).performance_info()
    }
}
