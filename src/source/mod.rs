// src/source/mod.rs - Frame acquisition from camera, AR passthrough or video file
mod camera;
mod passthrough;
mod video;

pub use camera::{list_devices, select_device, CameraCapture, CameraDevice};
pub use passthrough::{PassthroughCapture, PassthroughCompositor};
pub use video::{VideoCapture, VideoFileReader};

use crate::error::CaptureError;
use crate::orientation::OrientationTracker;
use crate::session::{AddOn, Orientation};
use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

/// One captured frame in RGBA8, already mirrored for front-facing capture.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub image: RgbaImage,
    /// Second eye for stereo input.
    pub second: Option<RgbaImage>,
    pub orientation: Orientation,
    pub front_facing: bool,
}

impl RawFrame {
    pub fn new(image: RgbaImage, orientation: Orientation) -> Self {
        Self {
            image,
            second: None,
            orientation,
            front_facing: false,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    FrameProduced { width: u32, height: u32 },
    OrientationChanged(Orientation),
    CameraChanged { front_facing: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorAxis {
    #[default]
    Horizontal,
    Vertical,
}

pub fn mirror_in_place(image: &mut RgbaImage, axis: MirrorAxis) {
    match axis {
        MirrorAxis::Horizontal => imageops::flip_horizontal_in_place(image),
        MirrorAxis::Vertical => imageops::flip_vertical_in_place(image),
    }
}

/// Target processing resolution: the short edge maps to `short_edge`
/// pixels, aspect preserved, optionally capped on the long edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    pub short_edge: u32,
    pub long_edge_cap: Option<u32>,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            short_edge: 480,
            long_edge_cap: None,
        }
    }
}

impl ResolutionPolicy {
    pub fn target_for(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (0, 0);
        }
        let short = width.min(height) as f64;
        let mut scale = self.short_edge as f64 / short;
        if let Some(cap) = self.long_edge_cap {
            let long = width.max(height) as f64 * scale;
            if long > cap as f64 {
                scale *= cap as f64 / long;
            }
        }
        let w = ((width as f64 * scale).round() as u32).max(1);
        let h = ((height as f64 * scale).round() as u32).max(1);
        (w, h)
    }

    /// Display size for an orientation given the display's portrait size.
    pub fn display_for(portrait: (u32, u32), orientation: Orientation) -> (u32, u32) {
        let (short, long) = (portrait.0.min(portrait.1), portrait.0.max(portrait.1));
        if orientation.is_landscape() {
            (long, short)
        } else {
            (short, long)
        }
    }
}

pub enum SourceBackend {
    DeviceCamera(CameraCapture),
    ArPassthrough(PassthroughCapture),
    VideoFile(VideoCapture),
}

impl SourceBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceBackend::DeviceCamera(_) => "camera",
            SourceBackend::ArPassthrough(_) => "ar-passthrough",
            SourceBackend::VideoFile(_) => "video",
        }
    }
}

/// A single polymorphic frame source. Owns the orientation tag attached
/// to every frame it produces and queues its notifications until drained.
pub struct FrameSource {
    backend: SourceBackend,
    orientation: OrientationTracker,
    front_facing: bool,
    mirror_axis: MirrorAxis,
    events: VecDeque<SourceEvent>,
}

impl FrameSource {
    pub fn new(backend: SourceBackend, initial: Orientation, mirror_axis: MirrorAxis) -> Self {
        let follow_device = !matches!(backend, SourceBackend::VideoFile(_));
        let front_facing = match &backend {
            SourceBackend::DeviceCamera(camera) => camera.requested_front_facing(),
            SourceBackend::ArPassthrough(ar) => ar.front_facing(),
            SourceBackend::VideoFile(_) => false,
        };
        let mut events = VecDeque::new();
        events.push_back(SourceEvent::OrientationChanged(initial));
        Self {
            backend,
            orientation: OrientationTracker::new(initial, follow_device),
            front_facing,
            mirror_axis,
            events,
        }
    }

    pub fn backend(&self) -> &SourceBackend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut SourceBackend {
        &mut self.backend
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation.current()
    }

    pub fn front_facing(&self) -> bool {
        self.front_facing
    }

    pub fn add_on(&self) -> AddOn {
        match (&self.backend, self.front_facing) {
            (SourceBackend::ArPassthrough(_), _) => AddOn::ArFoundation,
            (_, true) => AddOn::FrontFacing,
            _ => AddOn::Default,
        }
    }

    /// Feeds a device orientation reading. Fixed-orientation sources
    /// ignore it.
    pub fn observe_device_orientation(&mut self, reading: Orientation) -> bool {
        let changed = self.orientation.observe(reading);
        if changed {
            self.events.push_back(SourceEvent::OrientationChanged(reading));
        }
        changed
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation.set(orientation);
        self.events.push_back(SourceEvent::OrientationChanged(orientation));
    }

    /// Switches camera facing. Video sources have no facing and ignore it.
    pub fn set_front_facing(&mut self, front_facing: bool) {
        if front_facing == self.front_facing {
            return;
        }
        let switched = match &mut self.backend {
            SourceBackend::DeviceCamera(camera) => {
                camera.request_facing(front_facing);
                true
            }
            SourceBackend::ArPassthrough(ar) => {
                ar.request_facing(front_facing);
                true
            }
            SourceBackend::VideoFile(_) => false,
        };
        if switched {
            info!(front_facing, "Switching camera facing");
            self.front_facing = front_facing;
            self.events.push_back(SourceEvent::CameraChanged { front_facing });
        }
    }

    pub fn read(&mut self) -> Result<RawFrame, CaptureError> {
        let orientation = self.orientation.current();
        let (mut image, mut second) = match &mut self.backend {
            SourceBackend::DeviceCamera(camera) => (camera.capture()?, None),
            SourceBackend::ArPassthrough(ar) => ar.capture(orientation)?,
            SourceBackend::VideoFile(video) => (video.capture()?, None),
        };

        if self.front_facing {
            mirror_in_place(&mut image, self.mirror_axis);
            if let Some(second) = second.as_mut() {
                mirror_in_place(second, self.mirror_axis);
            }
        }

        let (width, height) = image.dimensions();
        debug!(width, height, source = self.backend.kind(), "Frame produced");
        self.events.push_back(SourceEvent::FrameProduced { width, height });

        Ok(RawFrame {
            image,
            second,
            orientation,
            front_facing: self.front_facing,
        })
    }

    pub fn drain_events(&mut self) -> Vec<SourceEvent> {
        self.events.drain(..).collect()
    }
}
