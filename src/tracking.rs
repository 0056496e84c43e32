// src/tracking.rs - Turns raw engine output into smoothed, world-stable hands
use crate::filter::{OneEuroFilter, OneEuroFilterVec3, OneEuroSettings};
use crate::hand::{GestureInfo, HandInfo, LeftOrRightHand, HAND_COUNT, JOINT_COUNT};
use crate::orientation::{finger_joint_rotation, OrientationCompensator};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::debug;

const MIN_DEPTH: f32 = 0.1;
const MAX_DEPTH: f32 = 1.0;
/// Scale applied to the metric world z before it is used as a viewport offset.
const WORLD_Z_SCALE: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub filter: OneEuroSettings,
    pub smoothing_enabled: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: OneEuroSettings::default(),
            smoothing_enabled: true,
        }
    }
}

/// Stable state of one hand slot, ready for rendering or export.
#[derive(Debug, Clone, PartialEq)]
pub struct StableHand {
    pub side: LeftOrRightHand,
    pub is_tracked: bool,
    pub depth: f32,
    pub joints: [Point3<f32>; JOINT_COUNT],
    pub rotations: [UnitQuaternion<f32>; JOINT_COUNT],
    pub gesture: GestureInfo,
}

impl StableHand {
    fn empty(slot: usize) -> Self {
        let side = if slot == 0 {
            LeftOrRightHand::Left
        } else {
            LeftOrRightHand::Right
        };
        Self {
            side,
            is_tracked: false,
            depth: MIN_DEPTH,
            joints: [Point3::origin(); JOINT_COUNT],
            rotations: [UnitQuaternion::identity(); JOINT_COUNT],
            gesture: GestureInfo::default(),
        }
    }

    pub fn palm_center(&self) -> Point3<f32> {
        center_of(&self.joints)
    }
}

pub fn center_of(points: &[Point3<f32>]) -> Point3<f32> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f32)
}

struct SlotFilters {
    joints: Vec<OneEuroFilterVec3>,
    depth: OneEuroFilter,
}

impl SlotFilters {
    fn new(settings: OneEuroSettings) -> Self {
        Self {
            joints: (0..JOINT_COUNT).map(|_| OneEuroFilterVec3::new(settings)).collect(),
            depth: OneEuroFilter::new(settings),
        }
    }

    fn reset(&mut self) {
        self.joints.iter_mut().for_each(OneEuroFilterVec3::reset);
        self.depth.reset();
    }

    fn update_settings(&mut self, settings: OneEuroSettings) {
        for filter in &mut self.joints {
            filter.update_settings(settings);
        }
        self.depth.update_settings(settings);
    }
}

/// Hand Tracking Result consumer: one set of filters per hand slot.
pub struct HandTracker {
    config: TrackerConfig,
    filters: Vec<SlotFilters>,
    hands: [StableHand; HAND_COUNT],
}

impl HandTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let filters = (0..HAND_COUNT).map(|_| SlotFilters::new(config.filter)).collect();
        Self {
            config,
            filters,
            hands: [StableHand::empty(0), StableHand::empty(1)],
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn hands(&self) -> &[StableHand; HAND_COUNT] {
        &self.hands
    }

    pub fn hand(&self, side: LeftOrRightHand) -> Option<&StableHand> {
        side.slot().map(|slot| &self.hands[slot])
    }

    pub fn smoothing_enabled(&self) -> bool {
        self.config.smoothing_enabled
    }

    pub fn set_smoothing_enabled(&mut self, enabled: bool) {
        self.config.smoothing_enabled = enabled;
        if !enabled {
            self.filters.iter_mut().for_each(SlotFilters::reset);
        }
    }

    pub fn update_settings(&mut self, settings: OneEuroSettings) {
        self.config.filter = settings;
        for slot in &mut self.filters {
            slot.update_settings(settings);
        }
    }

    /// Remaps the user-facing 0-1 smoothing value onto the filter beta.
    pub fn set_smoothing(&mut self, smoothing: f32) {
        let settings = self.config.filter.with_smoothing(smoothing);
        self.update_settings(settings);
    }

    /// Folds one engine result into the stable state. `timestamp` is in
    /// seconds on any monotonic clock.
    pub fn update(
        &mut self,
        raw: &[HandInfo; HAND_COUNT],
        compensator: &OrientationCompensator,
        timestamp: f64,
    ) -> &[StableHand; HAND_COUNT] {
        for (slot, hand) in raw.iter().enumerate() {
            self.update_slot(slot, hand, compensator, timestamp);
        }
        &self.hands
    }

    fn update_slot(
        &mut self,
        slot: usize,
        hand: &HandInfo,
        compensator: &OrientationCompensator,
        timestamp: f64,
    ) {
        let smoothing = self.config.smoothing_enabled;
        let filters = &mut self.filters[slot];
        let stable = &mut self.hands[slot];
        stable.gesture = hand.gesture_info;

        if !hand.is_valid() {
            if stable.is_tracked {
                debug!(slot, "Hand lost");
            }
            stable.is_tracked = false;
            return;
        }
        if !stable.is_tracked {
            debug!(slot, "Hand acquired");
            filters.reset();
        }
        stable.is_tracked = true;

        let info = &hand.tracking_info;
        let depth = info.depth_estimation.clamp(MIN_DEPTH, MAX_DEPTH);
        stable.depth = if smoothing {
            filters.depth.filter(f64::from(depth), Some(timestamp)) as f32
        } else {
            depth
        };

        for joint in 0..JOINT_COUNT {
            let image = info.skeleton.joint_positions[joint];
            let world_z = info.world_skeleton.joint_positions[joint].z * WORLD_Z_SCALE;
            let point = Vector3::new(image.x, image.y, world_z);
            let world = compensator.position_with_depth(point, stable.depth);
            stable.joints[joint] = if smoothing {
                Point3::from(filters.joints[joint].filter(world.coords, Some(timestamp)))
            } else {
                world
            };
        }

        if info.skeleton.confidence != 0.0 {
            let hand_rotation = compensator.hand_rotation(hand);
            stable.rotations[0] = hand_rotation;
            for joint in 1..JOINT_COUNT {
                stable.rotations[joint] = hand_rotation * finger_joint_rotation(hand, joint);
            }
        }
    }

    /// Marks both slots untracked, e.g. after a pause.
    pub fn clear(&mut self) {
        for hand in &mut self.hands {
            hand.is_tracked = false;
        }
        self.filters.iter_mut().for_each(SlotFilters::reset);
    }
}

impl Default for HandTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Quat, Vec3};
    use crate::orientation::ViewCamera;
    use crate::session::Orientation;

    fn compensator() -> OrientationCompensator {
        let mut c = OrientationCompensator::new(ViewCamera::new(480, 640, 60.0), true);
        c.update_borders(Orientation::Portrait, 480, 640);
        c
    }

    fn hand_at(x: f32, y: f32, depth: f32) -> HandInfo {
        let mut hand = HandInfo::default();
        hand.gesture_info.left_right_hand = 0;
        let info = &mut hand.tracking_info;
        info.skeleton.confidence = 1.0;
        info.depth_estimation = depth;
        for joint in 0..JOINT_COUNT {
            info.skeleton.joint_positions[joint] = Vec3::new(x, y, 0.0);
        }
        hand
    }

    #[test]
    fn invalid_hands_are_untracked() {
        let mut tracker = HandTracker::default();
        let raw = [HandInfo::default(); HAND_COUNT];
        let hands = tracker.update(&raw, &compensator(), 0.0);
        assert!(hands.iter().all(|h| !h.is_tracked));
    }

    #[test]
    fn depth_is_clamped() {
        let mut tracker = HandTracker::new(TrackerConfig {
            smoothing_enabled: false,
            ..TrackerConfig::default()
        });
        let raw = [hand_at(0.5, 0.5, 0.0), HandInfo::default()];
        let hands = tracker.update(&raw, &compensator(), 0.0);
        assert!(hands[0].is_tracked);
        assert_eq!(hands[0].depth, MIN_DEPTH);

        let raw = [hand_at(0.5, 0.5, 3.0), HandInfo::default()];
        assert_eq!(tracker.update(&raw, &compensator(), 0.1)[0].depth, MAX_DEPTH);
    }

    #[test]
    fn center_joint_projects_onto_view_axis() {
        let mut tracker = HandTracker::default();
        let raw = [hand_at(0.5, 0.5, 0.5), HandInfo::default()];
        let hands = tracker.update(&raw, &compensator(), 0.0);
        let wrist = hands[0].joints[0];
        assert!(wrist.x.abs() < 1e-5);
        assert!(wrist.y.abs() < 1e-5);
        assert!((wrist.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn smoothing_damps_a_jump() {
        let mut tracker = HandTracker::default();
        let c = compensator();
        tracker.update(&[hand_at(0.5, 0.5, 0.5), HandInfo::default()], &c, 0.0);
        let before = tracker.hands()[0].joints[0];
        let hands = tracker.update(&[hand_at(0.9, 0.5, 0.5), HandInfo::default()], &c, 1.0 / 30.0);
        let raw_target = c.position_with_depth(Vector3::new(0.9, 0.5, 0.0), 0.5);
        let moved = hands[0].joints[0].x - before.x;
        assert!(moved > 0.0);
        assert!(moved < raw_target.x - before.x);
    }

    #[test]
    fn reacquired_hand_is_not_smoothed_across_the_gap() {
        let mut tracker = HandTracker::default();
        let c = compensator();
        tracker.update(&[hand_at(0.2, 0.5, 0.5), HandInfo::default()], &c, 0.0);
        tracker.update(&[HandInfo::default(), HandInfo::default()], &c, 0.1);
        let hands = tracker.update(&[hand_at(0.8, 0.5, 0.5), HandInfo::default()], &c, 0.2);
        let expected = c.position_with_depth(Vector3::new(0.8, 0.5, 0.0), 0.5);
        assert!((hands[0].joints[0] - expected).norm() < 1e-4);
    }

    #[test]
    fn rotations_need_confidence_and_default_to_identity_on_nan() {
        let mut tracker = HandTracker::default();
        let mut hand = hand_at(0.5, 0.5, 0.5);
        hand.tracking_info.world_skeleton.joint_rotations = [Quat::new(f32::NAN, 0.0, 0.0, 1.0); JOINT_COUNT];
        let hands = tracker.update(&[hand, HandInfo::default()], &compensator(), 0.0);
        for rotation in &hands[0].rotations {
            assert!(rotation.angle().is_finite());
        }
    }

    #[test]
    fn center_of_points() {
        let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 4.0, 6.0)];
        assert_eq!(center_of(&points), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(center_of(&[]), Point3::origin());
    }
}
