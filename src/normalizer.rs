// src/normalizer.rs - Resizes captured frames into the buffer shared with the engine
use crate::error::CaptureError;
use crate::session::Orientation;
use crate::source::{RawFrame, ResolutionPolicy};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Pixel buffer shared between the normalizer (writer), the bridge and the
/// engine worker (readers). Dimensions never change for a given buffer;
/// a resize produces a new `SharedTexture` with a new generation.
#[derive(Debug, Clone)]
pub struct SharedTexture {
    pixels: Arc<RwLock<RgbaImage>>,
    width: u32,
    height: u32,
    generation: u64,
}

impl SharedTexture {
    pub fn new(image: RgbaImage, generation: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: Arc::new(RwLock::new(image)),
            width,
            height,
            generation,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RgbaImage> {
        self.pixels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RgbaImage> {
        self.pixels.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable address of the pixel storage, handed to native code. Valid
    /// while any clone of this texture is alive.
    pub fn native_handle(&self) -> *const u8 {
        self.read().as_raw().as_ptr()
    }

    pub fn same_buffer(&self, other: &SharedTexture) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Copies `image` into the existing storage. Dimensions must match.
    /// Native code holding `native_handle` reads without taking the lock.
    fn copy_from(&self, image: &RgbaImage) -> bool {
        if image.dimensions() != self.dimensions() {
            return false;
        }
        let mut guard = self.write();
        let dst: &mut [u8] = &mut guard;
        dst.copy_from_slice(image.as_raw());
        true
    }
}

/// Pair of per-hand occlusion mask buffers, RGBA-sized.
#[derive(Debug, Clone)]
pub struct MaskBuffers {
    pub first: Arc<RwLock<Vec<u8>>>,
    pub second: Arc<RwLock<Vec<u8>>>,
    width: u32,
    height: u32,
}

impl MaskBuffers {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 4;
        Self {
            first: Arc::new(RwLock::new(vec![0; len])),
            second: Arc::new(RwLock::new(vec![0; len])),
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.first.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of one normalization pass.
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub texture: SharedTexture,
    pub second: Option<SharedTexture>,
    pub masks: MaskBuffers,
    pub orientation: Orientation,
    pub front_facing: bool,
    /// True when this pass replaced the buffers.
    pub reallocated: bool,
}

impl NormalizedFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        self.texture.dimensions()
    }
}

pub struct FrameNormalizer {
    policy: ResolutionPolicy,
    texture: Option<SharedTexture>,
    second: Option<SharedTexture>,
    masks: Option<MaskBuffers>,
    generation: u64,
}

impl FrameNormalizer {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self {
            policy,
            texture: None,
            second: None,
            masks: None,
            generation: 0,
        }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Takes effect on the next frame.
    pub fn set_policy(&mut self, policy: ResolutionPolicy) {
        self.policy = policy;
    }

    pub fn current(&self) -> Option<&SharedTexture> {
        self.texture.as_ref()
    }

    pub fn masks(&self) -> Option<&MaskBuffers> {
        self.masks.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.texture.as_ref().map(SharedTexture::dimensions)
    }

    /// Replaces the buffers with blank ones of exactly `width` x `height`.
    /// Returns false if the size was already current.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.dimensions() == Some((width, height)) {
            return false;
        }
        self.install(RgbaImage::new(width, height), None);
        true
    }

    fn install(&mut self, image: RgbaImage, second: Option<RgbaImage>) {
        let (width, height) = image.dimensions();
        self.generation += 1;
        debug!(width, height, generation = self.generation, "Reallocating frame buffers");
        // New buffers are fully populated before they replace the old ones;
        // readers holding the previous texture keep a valid buffer.
        let texture = SharedTexture::new(image, self.generation);
        let second = second.map(|img| SharedTexture::new(img, self.generation));
        let masks = MaskBuffers::new(width, height);
        self.texture = Some(texture);
        self.second = second;
        self.masks = Some(masks);
    }

    fn scaled(&self, image: &RgbaImage, target: (u32, u32)) -> RgbaImage {
        if image.dimensions() == target {
            image.clone()
        } else {
            imageops::resize(image, target.0, target.1, FilterType::Triangle)
        }
    }

    pub fn normalize(&mut self, raw: &RawFrame) -> Result<NormalizedFrame, CaptureError> {
        let (w, h) = raw.dimensions();
        let target = self.policy.target_for(w, h);
        if target.0 == 0 || target.1 == 0 {
            return Err(CaptureError::NoFrame);
        }

        let image = self.scaled(&raw.image, target);
        let second = raw.second.as_ref().map(|s| self.scaled(s, target));

        let stereo_changed = second.is_some() != self.second.is_some();
        let reuse = !stereo_changed && self.dimensions() == Some(target);
        if reuse {
            if let Some(current) = &self.texture {
                current.copy_from(&image);
            }
            if let (Some(dst), Some(src)) = (&self.second, &second) {
                dst.copy_from(src);
            }
        } else {
            self.install(image, second);
        }
        let reallocated = !reuse;

        let (Some(texture), Some(masks)) = (self.texture.clone(), self.masks.clone()) else {
            return Err(CaptureError::NoFrame);
        };
        Ok(NormalizedFrame {
            texture,
            second: self.second.clone(),
            masks,
            orientation: raw.orientation,
            front_facing: raw.front_facing,
            reallocated,
        })
    }

    /// Drops every buffer. Clones held elsewhere stay valid until dropped.
    pub fn release(&mut self) {
        self.texture = None;
        self.second = None;
        self.masks = None;
    }
}
