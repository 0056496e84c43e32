// src/orientation.rs - Maps device-space joints and rotations into a stable world frame
use crate::hand::{HandInfo, LeftOrRightHand, WRIST};
use crate::session::Orientation;
use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use once_cell::sync::Lazy;
use tracing::debug;

/// Euler angles in degrees, applied Z first, then X, then Y.
fn euler_zxy(x: f32, y: f32, z: f32) -> UnitQuaternion<f32> {
    let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), x.to_radians());
    let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), y.to_radians());
    let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), z.to_radians());
    ry * rx * rz
}

/// Static per-hand offsets indexed by hand slot (left, right).
static HAND_ROTATION_OFFSETS: Lazy<[UnitQuaternion<f32>; 2]> =
    Lazy::new(|| [euler_zxy(0.0, 0.0, 180.0), euler_zxy(0.0, 180.0, 180.0)]);

/// Perspective camera the stable output is projected through. Looks down
/// its local +Z axis; `fov_degrees` is vertical.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewCamera {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub fov_degrees: f32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl ViewCamera {
    pub fn new(screen_width: u32, screen_height: u32, fov_degrees: f32) -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            fov_degrees,
            screen_width,
            screen_height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.screen_height == 0 {
            return 1.0;
        }
        self.screen_width as f32 / self.screen_height as f32
    }

    /// `viewport.z` is the distance in front of the camera.
    pub fn viewport_to_world(&self, viewport: Vector3<f32>) -> Point3<f32> {
        let depth = viewport.z;
        let half_h = (self.fov_degrees.to_radians() * 0.5).tan() * depth;
        let half_w = half_h * self.aspect();
        let local = Vector3::new(
            (2.0 * viewport.x - 1.0) * half_w,
            (2.0 * viewport.y - 1.0) * half_h,
            depth,
        );
        Point3::from(self.position + self.rotation * local)
    }

    pub fn viewport_to_screen(&self, viewport: Vector3<f32>) -> Vector3<f32> {
        Vector3::new(
            viewport.x * self.screen_width as f32,
            viewport.y * self.screen_height as f32,
            viewport.z,
        )
    }
}

/// Corrects normalized engine coordinates for the mismatch between the
/// processed frame and the display, then projects them.
#[derive(Debug, Clone)]
pub struct OrientationCompensator {
    camera: ViewCamera,
    correction_ratio: Vector3<f32>,
    zoom_value: f32,
    cover_screen: bool,
}

impl OrientationCompensator {
    pub fn new(camera: ViewCamera, cover_screen: bool) -> Self {
        Self {
            camera,
            correction_ratio: Vector3::new(1.0, 1.0, 1.0),
            zoom_value: 1.0,
            cover_screen,
        }
    }

    pub fn camera(&self) -> &ViewCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut ViewCamera {
        &mut self.camera
    }

    pub fn correction_ratio(&self) -> Vector3<f32> {
        self.correction_ratio
    }

    pub fn zoom(&self) -> f32 {
        if self.cover_screen {
            1.0
        } else {
            self.zoom_value
        }
    }

    pub fn covers_screen(&self) -> bool {
        self.cover_screen
    }

    pub fn set_cover_screen(&mut self, cover_screen: bool) {
        self.cover_screen = cover_screen;
    }

    /// Recomputes the correction ratio for the frame the engine is processing
    /// and the current screen. Must be called after every resize or
    /// orientation change.
    pub fn update_borders(&mut self, orientation: Orientation, frame_width: u32, frame_height: u32) {
        if frame_width == 0 || frame_height == 0 {
            return;
        }
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        let (sw, sh) = (
            self.camera.screen_width.max(1) as f32,
            self.camera.screen_height.max(1) as f32,
        );

        if orientation.is_landscape() {
            let ratio = fw / fh;
            self.correction_ratio = Vector3::new(1.0, sw / sh * (1.0 / ratio), 1.0);
            self.zoom_value = 1.0 / self.correction_ratio.y;
        } else {
            let ratio = fh / fw;
            self.correction_ratio = Vector3::new(sh / sw * ratio, 1.0, 1.0);
            self.zoom_value = 1.0 / self.correction_ratio.x;
        }
        debug!(
            ?orientation,
            frame_width,
            frame_height,
            ratio_x = self.correction_ratio.x,
            ratio_y = self.correction_ratio.y,
            zoom = self.zoom_value,
            "Updated display borders"
        );
    }

    fn correct(&self, point: Vector3<f32>) -> Vector3<f32> {
        let zoom = self.zoom();
        let centered = (point - Vector3::repeat(0.5)).component_mul(&self.correction_ratio);
        let scaled = Vector3::new(centered.x * zoom, centered.y * zoom, centered.z);
        let p = scaled + Vector3::repeat(0.5);
        Vector3::new(p.x.clamp(0.0, 1.0), p.y.clamp(0.0, 1.0), p.z.clamp(-1.0, 1.0))
    }

    pub fn position_with_depth(&self, point: Vector3<f32>, depth: f32) -> Point3<f32> {
        let mut viewport = self.correct(point);
        viewport.z += depth;
        self.camera.viewport_to_world(viewport)
    }

    pub fn screen_position(&self, point: Vector3<f32>) -> Vector3<f32> {
        self.camera.viewport_to_screen(self.correct(point))
    }

    /// World rotation of the whole hand, taken from the wrist joint.
    pub fn hand_rotation(&self, hand: &HandInfo) -> UnitQuaternion<f32> {
        hand_rotation(self.camera.rotation, hand)
    }
}

pub fn hand_rotation(camera_rotation: UnitQuaternion<f32>, hand: &HandInfo) -> UnitQuaternion<f32> {
    let Some(slot) = hand.gesture_info.left_right_hand().slot() else {
        return UnitQuaternion::identity();
    };
    let wrist = hand.tracking_info.world_skeleton.joint_rotations[WRIST];
    if wrist.is_nan() {
        return UnitQuaternion::identity();
    }
    // Mirrored capture flips handedness around the Y axis.
    let corrected = Quaternion::new(wrist.w, -wrist.x, wrist.y, -wrist.z);
    let Some(corrected) = UnitQuaternion::try_new(corrected, f32::EPSILON) else {
        return UnitQuaternion::identity();
    };
    camera_rotation * corrected * HAND_ROTATION_OFFSETS[slot]
}

/// Device-space rotation of a single joint with chirality correction.
pub fn finger_joint_rotation(hand: &HandInfo, joint: usize) -> UnitQuaternion<f32> {
    let Some(q) = hand.tracking_info.world_skeleton.joint_rotations.get(joint) else {
        return UnitQuaternion::identity();
    };
    if q.is_nan() {
        return UnitQuaternion::identity();
    }
    let corrected = match hand.gesture_info.left_right_hand() {
        LeftOrRightHand::Left => Quaternion::new(q.w, q.x, q.y, -q.z),
        LeftOrRightHand::Right => Quaternion::new(-q.w, q.x, q.y, -q.z),
        LeftOrRightHand::NoHand => return UnitQuaternion::identity(),
    };
    UnitQuaternion::try_new(corrected, f32::EPSILON).unwrap_or_else(UnitQuaternion::identity)
}

/// Follows device orientation readings, ignoring the ones that carry no
/// portrait/landscape information.
#[derive(Debug, Clone)]
pub struct OrientationTracker {
    current: Orientation,
    follow_device: bool,
}

impl OrientationTracker {
    pub fn new(initial: Orientation, follow_device: bool) -> Self {
        Self {
            current: initial,
            follow_device,
        }
    }

    pub fn current(&self) -> Orientation {
        self.current
    }

    pub fn follows_device(&self) -> bool {
        self.follow_device
    }

    pub fn set_follow_device(&mut self, follow: bool) {
        self.follow_device = follow;
    }

    /// Returns true when the reading changed the tracked orientation.
    pub fn observe(&mut self, reading: Orientation) -> bool {
        if !self.follow_device || reading.is_indeterminate() || reading == self.current {
            return false;
        }
        debug!(from = ?self.current, to = ?reading, "Device orientation changed");
        self.current = reading;
        true
    }

    /// Forces an orientation regardless of `follow_device`.
    pub fn set(&mut self, orientation: Orientation) {
        self.current = orientation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Quat;

    fn compensator(orientation: Orientation) -> OrientationCompensator {
        let (w, h) = if orientation.is_landscape() { (1920, 1080) } else { (1080, 1920) };
        let mut c = OrientationCompensator::new(ViewCamera::new(w, h, 60.0), true);
        let (fw, fh) = if orientation.is_landscape() { (853, 480) } else { (480, 853) };
        c.update_borders(orientation, fw, fh);
        c
    }

    #[test]
    fn center_maps_to_screen_center_at_unit_zoom() {
        for orientation in [
            Orientation::Portrait,
            Orientation::LandscapeLeft,
            Orientation::LandscapeRightFrontFacing,
            Orientation::FaceUp,
        ] {
            let c = compensator(orientation);
            assert_eq!(c.zoom(), 1.0);
            let screen = c.screen_position(Vector3::new(0.5, 0.5, 0.0));
            let cam = c.camera();
            assert!((screen.x - cam.screen_width as f32 / 2.0).abs() < 1e-3);
            assert!((screen.y - cam.screen_height as f32 / 2.0).abs() < 1e-3);

            let world = c.position_with_depth(Vector3::new(0.5, 0.5, 0.0), 0.5);
            assert!((world - Point3::new(0.0, 0.0, 0.5)).norm() < 1e-5);
        }
    }

    #[test]
    fn output_is_clamped() {
        let mut c = compensator(Orientation::Portrait);
        c.set_cover_screen(false);
        let screen = c.screen_position(Vector3::new(2.0, -5.0, 5.0));
        assert_eq!(screen.x, c.camera().screen_width as f32);
        assert_eq!(screen.y, 0.0);
        assert_eq!(screen.z, 1.0);
    }

    #[test]
    fn portrait_correction_uses_height_over_width() {
        let mut c = OrientationCompensator::new(ViewCamera::new(1000, 2000, 60.0), false);
        c.update_borders(Orientation::Portrait, 480, 640);
        let ratio = c.correction_ratio();
        assert!((ratio.x - 2.0 * (640.0 / 480.0)).abs() < 1e-5);
        assert_eq!(ratio.y, 1.0);
        assert!((c.zoom() - 1.0 / ratio.x).abs() < 1e-6);
    }

    #[test]
    fn nan_and_missing_hand_rotations_are_identity() {
        let mut hand = HandInfo::default();
        assert_eq!(hand_rotation(UnitQuaternion::identity(), &hand), UnitQuaternion::identity());

        hand.gesture_info.left_right_hand = LeftOrRightHand::Right.raw();
        hand.tracking_info.world_skeleton.joint_rotations[WRIST] = Quat::new(f32::NAN, 0.0, 0.0, 1.0);
        assert_eq!(hand_rotation(UnitQuaternion::identity(), &hand), UnitQuaternion::identity());

        hand.tracking_info.world_skeleton.joint_rotations[3] = Quat::new(0.0, f32::NAN, 0.0, 1.0);
        assert_eq!(finger_joint_rotation(&hand, 3), UnitQuaternion::identity());
        assert_eq!(finger_joint_rotation(&hand, 99), UnitQuaternion::identity());
    }

    #[test]
    fn left_and_right_offsets_differ() {
        let mut left = HandInfo::default();
        left.gesture_info.left_right_hand = LeftOrRightHand::Left.raw();
        let mut right = left;
        right.gesture_info.left_right_hand = LeftOrRightHand::Right.raw();

        let l = hand_rotation(UnitQuaternion::identity(), &left);
        let r = hand_rotation(UnitQuaternion::identity(), &right);
        assert!(l.angle_to(&r) > 1.0);
        // Identity wrist with the left offset is a half turn about Z.
        let expected = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::PI);
        assert!(l.angle_to(&expected) < 1e-4);
    }

    #[test]
    fn tracker_ignores_flat_readings() {
        let mut tracker = OrientationTracker::new(Orientation::Portrait, true);
        assert!(!tracker.observe(Orientation::FaceUp));
        assert!(!tracker.observe(Orientation::Unknown));
        assert!(!tracker.observe(Orientation::Portrait));
        assert!(tracker.observe(Orientation::LandscapeLeft));
        assert_eq!(tracker.current(), Orientation::LandscapeLeft);

        tracker.set_follow_device(false);
        assert!(!tracker.observe(Orientation::Portrait));
    }
}
