// src/hand.rs - Raw per-hand output of the tracking engine
//
// Every struct here is handed to the engine by pointer, so field order and
// types follow the native layout exactly. Enum-like values stay as raw ints in
// the structs and are decoded through the typed accessors.
use nalgebra::{Quaternion, UnitQuaternion, Vector3};

pub const JOINT_COUNT: usize = 21;
pub const CONTOUR_POINTS: usize = 200;
pub const HAND_COUNT: usize = 2;

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const POSITIVE_INFINITY: Vec3 = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    pub const NEGATIVE_INFINITY: Vec3 =
        Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Values the engine writes into joint slots it did not compute.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::ZERO || *self == Self::POSITIVE_INFINITY || *self == Self::NEGATIVE_INFINITY
    }

    pub fn to_vector(self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl From<Vector3<f32>> for Vec3 {
    fn from(v: Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn is_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan() || self.w.is_nan()
    }

    /// `None` when the engine had no rotation for this joint.
    pub fn to_unit(self) -> Option<UnitQuaternion<f32>> {
        if self.is_nan() {
            return None;
        }
        UnitQuaternion::try_new(Quaternion::new(self.w, self.x, self.y, self.z), f32::EPSILON)
    }
}

/// Normalized box around the hand.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct BoundingBox {
    pub top_left: Vec3,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn center(&self) -> Vector3<f32> {
        Vector3::new(
            self.top_left.x + self.width * 0.5,
            self.top_left.y - self.height * 0.5,
            self.top_left.z,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct WristInfo {
    pub left_point: Vec3,
    pub right_point: Vec3,
    pub wrist_warning: i32,
}

impl WristInfo {
    pub fn is_valid(&self) -> bool {
        self.wrist_warning == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct FingerInfo {
    pub left_point: Vec3,
    pub right_point: Vec3,
    pub finger_warning: i32,
}

/// 2D skeleton in normalized image coordinates. `confidence` is binary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct SkeletonInfo {
    pub confidence: f32,
    pub joint_positions: [Vec3; JOINT_COUNT],
}

impl Default for SkeletonInfo {
    fn default() -> Self {
        Self {
            confidence: 0.0,
            joint_positions: [Vec3::ZERO; JOINT_COUNT],
        }
    }
}

impl SkeletonInfo {
    /// False when every joint holds one of the engine's "not computed" values.
    pub fn has_valid_positions(&self) -> bool {
        self.joint_positions.iter().any(|p| !p.is_sentinel())
    }
}

/// Metric skeleton with device-space joint rotations.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct WorldSkeletonInfo {
    pub joint_positions: [Vec3; JOINT_COUNT],
    pub joint_rotations: [Quat; JOINT_COUNT],
}

impl Default for WorldSkeletonInfo {
    fn default() -> Self {
        Self {
            joint_positions: [Vec3::ZERO; JOINT_COUNT],
            joint_rotations: [Quat::IDENTITY; JOINT_COUNT],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct TrackingInfo {
    pub bounding_box: BoundingBox,
    pub wrist_info: WristInfo,
    /// 0-1 estimate of the distance between hand and camera.
    pub depth_estimation: f32,
    pub contour_point_count: i32,
    pub contour_points: [Vec3; CONTOUR_POINTS],
    pub skeleton: SkeletonInfo,
    pub world_skeleton: WorldSkeletonInfo,
    pub finger_info: FingerInfo,
}

impl Default for TrackingInfo {
    fn default() -> Self {
        Self {
            bounding_box: BoundingBox::default(),
            wrist_info: WristInfo::default(),
            depth_estimation: 0.0,
            contour_point_count: 0,
            contour_points: [Vec3::ZERO; CONTOUR_POINTS],
            skeleton: SkeletonInfo::default(),
            world_skeleton: WorldSkeletonInfo::default(),
            finger_info: FingerInfo::default(),
        }
    }
}

impl TrackingInfo {
    /// The populated prefix of the contour buffer.
    pub fn contour(&self) -> &[Vec3] {
        let count = self.contour_point_count.clamp(0, CONTOUR_POINTS as i32) as usize;
        &self.contour_points[..count]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManoClass {
    NoHand,
    Grab,
    Pinch,
    Pointer,
}

impl ManoClass {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Grab,
            1 => Self::Pinch,
            2 => Self::Pointer,
            _ => Self::NoHand,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::NoHand => -1,
            Self::Grab => 0,
            Self::Pinch => 1,
            Self::Pointer => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContinuousGesture {
    None,
    Hold,
    OpenHand,
    OpenPinch,
    ClosedHand,
    Pointer,
}

impl ContinuousGesture {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Hold,
            1 => Self::OpenHand,
            2 => Self::OpenPinch,
            3 => Self::ClosedHand,
            4 => Self::Pointer,
            _ => Self::None,
        }
    }
}

/// One-shot gestures. The engine reports each for exactly one processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerGesture {
    None,
    Click,
    Grab,
    Drop,
    Pick,
    Release,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
}

impl TriggerGesture {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Click,
            1 => Self::Grab,
            2 => Self::Drop,
            3 => Self::Pick,
            4 => Self::Release,
            1000 => Self::SwipeLeft,
            1001 => Self::SwipeRight,
            1002 => Self::SwipeUp,
            1003 => Self::SwipeDown,
            _ => Self::None,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::None => -1,
            Self::Click => 0,
            Self::Grab => 1,
            Self::Drop => 2,
            Self::Pick => 3,
            Self::Release => 4,
            Self::SwipeLeft => 1000,
            Self::SwipeRight => 1001,
            Self::SwipeUp => 1002,
            Self::SwipeDown => 1003,
        }
    }
}

/// Which side of the hand faces the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandSide {
    None,
    Backside,
    Palmside,
}

impl HandSide {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Backside,
            1 => Self::Palmside,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeftOrRightHand {
    NoHand,
    Left,
    Right,
}

impl LeftOrRightHand {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Left,
            1 => Self::Right,
            _ => Self::NoHand,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::NoHand => -1,
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// Slot in the two-hand result array.
    pub fn slot(self) -> Option<usize> {
        match self {
            Self::Left => Some(0),
            Self::Right => Some(1),
            Self::NoHand => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Warning {
    None,
    HandNotFound,
    ApproachingLowerEdge,
    ApproachingUpperEdge,
    ApproachingLeftEdge,
    ApproachingRightEdge,
}

impl Warning {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::HandNotFound,
            3 => Self::ApproachingLowerEdge,
            4 => Self::ApproachingUpperEdge,
            5 => Self::ApproachingLeftEdge,
            6 => Self::ApproachingRightEdge,
            _ => Self::None,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::None => 0,
            Self::HandNotFound => 1,
            Self::ApproachingLowerEdge => 3,
            Self::ApproachingUpperEdge => 4,
            Self::ApproachingLeftEdge => 5,
            Self::ApproachingRightEdge => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct GestureInfo {
    pub mano_class: i32,
    pub continuous: i32,
    pub trigger: i32,
    pub state: i32,
    pub hand_side: i32,
    pub left_right_hand: i32,
}

impl Default for GestureInfo {
    fn default() -> Self {
        Self {
            mano_class: ManoClass::NoHand.raw(),
            continuous: -1,
            trigger: TriggerGesture::None.raw(),
            state: 0,
            hand_side: -1,
            left_right_hand: LeftOrRightHand::NoHand.raw(),
        }
    }
}

impl GestureInfo {
    pub fn mano_class(&self) -> ManoClass {
        ManoClass::from_raw(self.mano_class)
    }

    pub fn continuous(&self) -> ContinuousGesture {
        ContinuousGesture::from_raw(self.continuous)
    }

    pub fn trigger(&self) -> TriggerGesture {
        TriggerGesture::from_raw(self.trigger)
    }

    pub fn hand_side(&self) -> HandSide {
        HandSide::from_raw(self.hand_side)
    }

    pub fn left_right_hand(&self) -> LeftOrRightHand {
        LeftOrRightHand::from_raw(self.left_right_hand)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct HandInfo {
    pub tracking_info: TrackingInfo,
    pub gesture_info: GestureInfo,
    pub warning: i32,
}

impl HandInfo {
    pub fn warning(&self) -> Warning {
        Warning::from_raw(self.warning)
    }

    /// The single validity predicate used by everything downstream: the
    /// skeleton is confident and at least one joint holds a real position.
    pub fn is_valid(&self) -> bool {
        let skeleton = &self.tracking_info.skeleton;
        skeleton.confidence == 1.0 && skeleton.has_valid_positions()
    }
}
