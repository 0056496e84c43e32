// src/source/passthrough.rs - Frames composited by an AR runtime
use super::ResolutionPolicy;
use crate::error::CaptureError;
use crate::session::Orientation;
use image::RgbaImage;

/// The AR runtime that owns the physical camera. It renders its camera
/// image into a frame of the requested size on its own tick.
pub trait PassthroughCompositor: Send {
    /// `None` when the runtime has no new image since the last call.
    fn composite(&mut self, width: u32, height: u32) -> Option<RgbaImage>;

    /// Second eye for headsets; mono runtimes keep the default.
    fn composite_second(&mut self, _width: u32, _height: u32) -> Option<RgbaImage> {
        None
    }

    fn request_facing(&mut self, _front_facing: bool) {}
}

pub struct PassthroughCapture {
    compositor: Box<dyn PassthroughCompositor>,
    display_portrait: (u32, u32),
    policy: ResolutionPolicy,
    front_facing: bool,
}

impl PassthroughCapture {
    pub fn new(
        compositor: Box<dyn PassthroughCompositor>,
        display_portrait: (u32, u32),
        policy: ResolutionPolicy,
    ) -> Self {
        Self {
            compositor,
            display_portrait,
            policy,
            front_facing: false,
        }
    }

    pub fn front_facing(&self) -> bool {
        self.front_facing
    }

    pub fn request_facing(&mut self, front_facing: bool) {
        self.front_facing = front_facing;
        self.compositor.request_facing(front_facing);
    }

    /// Size the runtime is asked to render at for the given orientation.
    pub fn frame_size(&self, orientation: Orientation) -> (u32, u32) {
        let display = ResolutionPolicy::display_for(self.display_portrait, orientation);
        self.policy.target_for(display.0, display.1)
    }

    pub fn capture(
        &mut self,
        orientation: Orientation,
    ) -> Result<(RgbaImage, Option<RgbaImage>), CaptureError> {
        let (width, height) = self.frame_size(orientation);
        let image = self
            .compositor
            .composite(width, height)
            .ok_or(CaptureError::NoFrame)?;
        let second = self.compositor.composite_second(width, height);
        Ok((image, second))
    }
}
