// src/source/camera.rs - Native camera capture with device fallback
use crate::error::CaptureError;
use image::{DynamicImage, RgbaImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
    RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use tracing::{debug, info, warn};

const FRONT_FACING_HINTS: [&str; 3] = ["front", "user", "facetime"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub index: u32,
    pub name: String,
    pub front_facing: bool,
}

impl CameraDevice {
    fn from_info(info: &CameraInfo) -> Option<Self> {
        let index = info.index().as_index().ok()?;
        let name = info.human_name();
        let haystack = format!("{} {}", name, info.description()).to_lowercase();
        let front_facing = FRONT_FACING_HINTS.iter().any(|hint| haystack.contains(hint));
        Some(Self {
            index,
            name,
            front_facing,
        })
    }
}

pub fn list_devices() -> Result<Vec<CameraDevice>, CaptureError> {
    let infos = nokhwa::query(ApiBackend::Auto).map_err(|e| CaptureError::Stream(e.to_string()))?;
    Ok(infos.iter().filter_map(CameraDevice::from_info).collect())
}

/// Preferred index first, then the first device of the requested facing,
/// then whatever is available.
pub fn select_device(
    devices: &[CameraDevice],
    preferred: Option<u32>,
    front_facing: bool,
) -> Option<&CameraDevice> {
    if let Some(index) = preferred {
        if let Some(device) = devices.iter().find(|d| d.index == index) {
            return Some(device);
        }
        warn!(index, "Preferred camera not found, falling back");
    }
    if let Some(device) = devices.iter().find(|d| d.front_facing == front_facing) {
        return Some(device);
    }
    let fallback = devices.first();
    if let Some(device) = fallback {
        warn!(
            front_facing,
            device = %device.name,
            "No camera with requested facing, using first available"
        );
    }
    fallback
}

pub struct CameraCapture {
    camera: Option<Camera>,
    device: Option<CameraDevice>,
    preferred_index: Option<u32>,
    front_facing: bool,
    requested_resolution: Option<(u32, u32)>,
}

impl CameraCapture {
    /// The device is opened lazily on the first capture and reopened after
    /// any failure.
    pub fn new(
        preferred_index: Option<u32>,
        front_facing: bool,
        requested_resolution: Option<(u32, u32)>,
    ) -> Self {
        Self {
            camera: None,
            device: None,
            preferred_index,
            front_facing,
            requested_resolution,
        }
    }

    pub fn requested_front_facing(&self) -> bool {
        self.front_facing
    }

    pub fn device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    /// Closes the current device; the next capture picks one matching the
    /// new facing.
    pub fn request_facing(&mut self, front_facing: bool) {
        self.front_facing = front_facing;
        self.preferred_index = None;
        self.close();
    }

    pub fn set_requested_resolution(&mut self, resolution: Option<(u32, u32)>) {
        if self.requested_resolution != resolution {
            self.requested_resolution = resolution;
            self.close();
        }
    }

    fn requested_format(&self) -> RequestedFormat<'static> {
        match self.requested_resolution {
            Some((w, h)) => RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                CameraFormat::new(Resolution::new(w, h), FrameFormat::MJPEG, 30),
            )),
            None => RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        }
    }

    fn open(&mut self) -> Result<(), CaptureError> {
        let devices = list_devices()?;
        let device = select_device(&devices, self.preferred_index, self.front_facing)
            .cloned()
            .ok_or(CaptureError::NoDevice)?;

        let mut camera = Camera::new(CameraIndex::Index(device.index), self.requested_format())
            .map_err(|e| CaptureError::DeviceBusy(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let resolution = camera.resolution();
        info!(
            index = device.index,
            name = %device.name,
            width = resolution.width(),
            height = resolution.height(),
            "Opened camera"
        );
        self.camera = Some(camera);
        self.device = Some(device);
        Ok(())
    }

    pub fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        if self.camera.is_none() {
            self.open()?;
        }
        let Some(camera) = self.camera.as_mut() else {
            return Err(CaptureError::NoDevice);
        };

        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                debug!(error = %e, "Camera frame failed, reopening next tick");
                self.close();
                return Err(CaptureError::Stream(e.to_string()));
            }
        };
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::Decode(e.to_string()))?;
        Ok(DynamicImage::ImageRgb8(decoded).to_rgba8())
    }

    pub fn close(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            let _ = camera.stop_stream();
        }
        self.device = None;
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.close();
    }
}
