// src/engine/native.rs - extern "C" binding to the native hand tracking library
use super::{EngineSettings, PerformanceInfo, RenderEvent, TrackingEngine};
use crate::hand::{HandInfo, HAND_COUNT};
use crate::normalizer::{MaskBuffers, SharedTexture};
use crate::session::{AssetStatus, Session};
use std::ffi::{c_char, c_int, c_void, CString};
use std::sync::PoisonError;
use tracing::{debug, warn};

#[repr(C)]
struct ManoSettings {
    platform: c_int,
    image_format: c_int,
    serial_key: *const c_char,
    seg_mode: c_int,
}

type RenderEventFn = extern "C" fn(c_int);

#[link(name = "hand_engine")]
extern "C" {
    #[link_name = "initSetupWithKey"]
    fn init_setup_with_key(settings: ManoSettings, status: *mut AssetStatus);

    #[link_name = "stop"]
    fn engine_stop();

    #[link_name = "setResolution"]
    fn set_resolution(width: c_int, height: c_int);

    #[link_name = "SetTextureFromUnity"]
    fn set_texture_handle(handle: *const c_void, width: c_int, height: c_int, splitting: c_int);

    #[link_name = "GetRenderEventFunc"]
    fn get_render_event_func() -> Option<RenderEventFn>;

    #[link_name = "copyHandInfo"]
    fn copy_hand_info(first: *mut HandInfo, second: *mut HandInfo, session: *mut Session) -> c_int;

    #[link_name = "processFrameTwoHands"]
    fn process_frame_two_hands(first: *mut HandInfo, second: *mut HandInfo, session: *mut Session);

    #[link_name = "setLeftFrameArray"]
    fn set_left_frame_array(frame: *const u8);

    #[link_name = "setStereoFrameArrays"]
    fn set_stereo_frame_arrays(frame: *const u8, second: *const u8);

    #[link_name = "setMRFrameArrays"]
    fn set_mr_frame_arrays(first: *mut u8, second: *mut u8);

    #[link_name = "getPerformanceInfo"]
    fn get_performance_info(processing_ms: *mut c_int, capture_ms: *mut c_int);
}

/// Keeps every buffer handed to native code alive for as long as the
/// library may dereference it.
///
/// The library reads the registered texture and writes the mask buffers
/// from its own worker without taking their `RwLock`s. A same-size frame
/// copied into the registered texture can therefore race with an async
/// pass and yield one result computed on a partly updated frame. Mask
/// contents are only coherent between passes.
#[derive(Default)]
pub struct NativeEngine {
    serial_key: Option<CString>,
    texture: Option<SharedTexture>,
    masks: Option<MaskBuffers>,
    frame: Vec<u8>,
    second: Vec<u8>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_c_int(value: u32) -> c_int {
    c_int::try_from(value).unwrap_or(c_int::MAX)
}

impl TrackingEngine for NativeEngine {
    fn init(&mut self, settings: &EngineSettings) -> AssetStatus {
        let key = match CString::new(settings.license_key.as_str()) {
            Ok(key) => key,
            Err(_) => {
                warn!("License key contains a NUL byte, sending empty key");
                CString::default()
            }
        };
        let mut status = AssetStatus::default();
        let raw = ManoSettings {
            platform: settings.platform,
            image_format: settings.image_format as c_int,
            serial_key: key.as_ptr(),
            seg_mode: settings.seg_mode,
        };
        unsafe { init_setup_with_key(raw, &mut status) };
        self.serial_key = Some(key);
        status
    }

    fn stop(&mut self) {
        unsafe { engine_stop() };
        self.texture = None;
        self.masks = None;
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        unsafe { set_resolution(to_c_int(width), to_c_int(height)) };
    }

    fn set_texture(&mut self, texture: &SharedTexture, downscale: u32) {
        let handle = texture.native_handle() as *const c_void;
        unsafe {
            set_texture_handle(
                handle,
                to_c_int(texture.width()),
                to_c_int(texture.height()),
                to_c_int(downscale),
            )
        };
        // Only now is the previous texture safe to release.
        self.texture = Some(texture.clone());
    }

    fn set_frame_array(&mut self, pixels: &[u8]) {
        self.frame.clear();
        self.frame.extend_from_slice(pixels);
        unsafe { set_left_frame_array(self.frame.as_ptr()) };
    }

    fn set_stereo_frame_arrays(&mut self, pixels: &[u8], second: &[u8]) {
        self.frame.clear();
        self.frame.extend_from_slice(pixels);
        self.second.clear();
        self.second.extend_from_slice(second);
        unsafe { set_stereo_frame_arrays(self.frame.as_ptr(), self.second.as_ptr()) };
    }

    fn set_mask_buffers(&mut self, masks: &MaskBuffers) {
        let mut first = masks.first.write().unwrap_or_else(PoisonError::into_inner);
        let mut second = masks.second.write().unwrap_or_else(PoisonError::into_inner);
        // Held until the library has taken the pointers.
        unsafe { set_mr_frame_arrays(first.as_mut_ptr(), second.as_mut_ptr()) };
        drop(second);
        drop(first);
        self.masks = Some(masks.clone());
    }

    fn process_two_hands(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) {
        let [first, second] = hands;
        unsafe { process_frame_two_hands(first, second, session) };
    }

    fn copy_latest_result(&mut self, hands: &mut [HandInfo; HAND_COUNT], session: &mut Session) -> i64 {
        let [first, second] = hands;
        i64::from(unsafe { copy_hand_info(first, second, session) })
    }

    fn render_event(&mut self) -> Option<RenderEvent> {
        let func = unsafe { get_render_event_func() };
        if func.is_none() {
            debug!("Native library exposes no render event");
        }
        func.map(|f| RenderEvent::new(move |id| f(id)))
    }

    fn performance_info(&mut self) -> PerformanceInfo {
        let mut info = PerformanceInfo::default();
        unsafe { get_performance_info(&mut info.processing_ms, &mut info.capture_ms) };
        info
    }
}
