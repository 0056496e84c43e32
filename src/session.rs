// src/session.rs - Per-frame configuration pushed to the tracking engine
use serde::{Deserialize, Serialize};

/// Device orientation as understood by the engine. The last four values are
/// the front-facing variants of the portrait/landscape states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Orientation {
    #[default]
    Unknown = 0,
    Portrait = 1,
    PortraitUpsideDown = 2,
    LandscapeLeft = 3,
    LandscapeRight = 4,
    FaceUp = 5,
    FaceDown = 6,
    PortraitFrontFacing = 7,
    PortraitUpsideDownFrontFacing = 8,
    LandscapeLeftFrontFacing = 9,
    LandscapeRightFrontFacing = 10,
}

impl Orientation {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Portrait,
            2 => Self::PortraitUpsideDown,
            3 => Self::LandscapeLeft,
            4 => Self::LandscapeRight,
            5 => Self::FaceUp,
            6 => Self::FaceDown,
            7 => Self::PortraitFrontFacing,
            8 => Self::PortraitUpsideDownFrontFacing,
            9 => Self::LandscapeLeftFrontFacing,
            10 => Self::LandscapeRightFrontFacing,
            _ => Self::Unknown,
        }
    }

    pub fn raw(self) -> i32 {
        self as i32
    }

    /// The value sent to the engine for this device orientation given the
    /// active camera facing. Only the four portrait/landscape states have
    /// front-facing variants; everything else collapses to `Unknown`.
    pub fn for_facing(self, front_facing: bool) -> Self {
        if !front_facing {
            return self;
        }
        match self {
            Self::Portrait => Self::PortraitFrontFacing,
            Self::PortraitUpsideDown => Self::PortraitUpsideDownFrontFacing,
            Self::LandscapeLeft => Self::LandscapeLeftFrontFacing,
            Self::LandscapeRight => Self::LandscapeRightFrontFacing,
            _ => Self::Unknown,
        }
    }

    pub fn is_landscape(self) -> bool {
        matches!(
            self,
            Self::LandscapeLeft
                | Self::LandscapeRight
                | Self::LandscapeLeftFrontFacing
                | Self::LandscapeRightFrontFacing
        )
    }

    /// Portrait group includes the flat and unknown states, matching how the
    /// display is laid out when no landscape reading is available.
    pub fn is_portrait_group(self) -> bool {
        !self.is_landscape()
    }

    /// Readings that never change the tracked orientation.
    pub fn is_indeterminate(self) -> bool {
        matches!(self, Self::Unknown | Self::FaceUp | Self::FaceDown)
    }
}

/// Tells the engine which passthrough/add-on mode is feeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum AddOn {
    #[default]
    Default = 0,
    ArFoundation = 4,
    FrontFacing = 5,
}

impl AddOn {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            4 => Self::ArFoundation,
            5 => Self::FrontFacing,
            _ => Self::Default,
        }
    }
}

/// Status written back into the session by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlag {
    None,
    ImageSizeIsZero,
    ImageIsTooSmall,
    BatterySaverOn,
    Other(i32),
}

impl SessionFlag {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::None,
            1000 => Self::ImageSizeIsZero,
            1001 => Self::ImageIsTooSmall,
            2000 => Self::BatterySaverOn,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::None => 0,
            Self::ImageSizeIsZero => 1000,
            Self::ImageIsTooSmall => 1001,
            Self::BatterySaverOn => 2000,
            Self::Other(raw) => raw,
        }
    }
}

/// Feature mask. Every field is an int on the native side: 1 = on, 0 = off,
/// except `finger_info` which selects a finger (0 = off, 1 = thumb .. 5 = pinky).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Features {
    pub skeleton_3d: i32,
    pub gestures: i32,
    pub fast_mode: i32,
    pub wrist_info: i32,
    pub finger_info: i32,
    pub contour: i32,
    pub two_hands: i32,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            skeleton_3d: 1,
            gestures: 1,
            fast_mode: 0,
            wrist_info: 0,
            finger_info: 0,
            contour: 0,
            two_hands: 1,
        }
    }
}

pub const MAX_FINGER_INFO: i32 = 5;
/// Finger selected by the boolean finger-info toggle (ring finger).
pub const DEFAULT_FINGER_INFO: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Session {
    flag: i32,
    orientation: i32,
    add_on: i32,
    pub smoothing: f32,
    pub gesture_smoothing: f32,
    pub features: Features,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            flag: 0,
            orientation: Orientation::Unknown.raw(),
            add_on: AddOn::Default as i32,
            smoothing: 0.5,
            gesture_smoothing: 0.5,
            features: Features::default(),
        }
    }
}

impl Session {
    pub fn orientation(&self) -> Orientation {
        Orientation::from_raw(self.orientation)
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation.raw();
    }

    pub fn add_on(&self) -> AddOn {
        AddOn::from_raw(self.add_on)
    }

    pub fn set_add_on(&mut self, add_on: AddOn) {
        self.add_on = add_on as i32;
    }

    pub fn flag(&self) -> SessionFlag {
        SessionFlag::from_raw(self.flag)
    }

    /// Written by engines; callers only read the flag.
    pub fn set_flag(&mut self, flag: SessionFlag) {
        self.flag = flag.raw();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseAnswer {
    Ok,
    KeyNotFound,
    Expired,
    InvalidPlan,
    KeyBlocked,
    InvalidAccessToken,
    AccessDenied,
    MaxNumDevices,
    UnknownServerReply,
    ProductNotFound,
    IncorrectInputParameter,
    InternetRequired,
    IncorrectBundleId,
}

impl LicenseAnswer {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            30 => Self::Ok,
            31 => Self::KeyNotFound,
            32 => Self::Expired,
            33 => Self::InvalidPlan,
            34 => Self::KeyBlocked,
            35 => Self::InvalidAccessToken,
            36 => Self::AccessDenied,
            37 => Self::MaxNumDevices,
            39 => Self::ProductNotFound,
            40 => Self::IncorrectInputParameter,
            41 => Self::InternetRequired,
            42 => Self::IncorrectBundleId,
            _ => Self::UnknownServerReply,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::Ok => 30,
            Self::KeyNotFound => 31,
            Self::Expired => 32,
            Self::InvalidPlan => 33,
            Self::KeyBlocked => 34,
            Self::InvalidAccessToken => 35,
            Self::AccessDenied => 36,
            Self::MaxNumDevices => 37,
            Self::UnknownServerReply => 38,
            Self::ProductNotFound => 39,
            Self::IncorrectInputParameter => 40,
            Self::InternetRequired => 41,
            Self::IncorrectBundleId => 42,
        }
    }

    /// Short text for a status banner.
    pub fn user_message(self) -> Option<&'static str> {
        match self {
            Self::Ok => None,
            Self::InternetRequired => Some("Internet Required"),
            _ => Some("Contact Support"),
        }
    }
}

/// Status record returned by engine initialization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct AssetStatus {
    license_answer: i32,
    pub version: f32,
}

impl Default for AssetStatus {
    fn default() -> Self {
        Self::new(LicenseAnswer::UnknownServerReply, 0.0)
    }
}

impl AssetStatus {
    pub fn new(answer: LicenseAnswer, version: f32) -> Self {
        Self {
            license_answer: answer.raw(),
            version,
        }
    }

    pub fn license_answer(&self) -> LicenseAnswer {
        LicenseAnswer::from_raw(self.license_answer)
    }

    pub fn is_licensed(&self) -> bool {
        self.license_answer() == LicenseAnswer::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_facing_remap() {
        assert_eq!(
            Orientation::Portrait.for_facing(true),
            Orientation::PortraitFrontFacing
        );
        assert_eq!(
            Orientation::LandscapeRight.for_facing(true),
            Orientation::LandscapeRightFrontFacing
        );
        assert_eq!(
            Orientation::PortraitUpsideDown.for_facing(true),
            Orientation::PortraitUpsideDownFrontFacing
        );
        for o in [Orientation::FaceUp, Orientation::FaceDown, Orientation::Unknown] {
            assert_eq!(o.for_facing(true), Orientation::Unknown);
        }
        assert_eq!(Orientation::FaceUp.for_facing(false), Orientation::FaceUp);
    }

    #[test]
    fn raw_orientation_roundtrips_through_session() {
        let mut session = Session::default();
        session.set_orientation(Orientation::LandscapeLeftFrontFacing);
        assert_eq!(session.orientation(), Orientation::LandscapeLeftFrontFacing);
        assert_eq!(Orientation::from_raw(42), Orientation::Unknown);
    }

    #[test]
    fn grouping() {
        assert!(Orientation::LandscapeLeftFrontFacing.is_landscape());
        assert!(Orientation::FaceUp.is_portrait_group());
        assert!(Orientation::FaceDown.is_indeterminate());
        assert!(!Orientation::PortraitUpsideDown.is_indeterminate());
    }

    #[test]
    fn license_messages() {
        let status = AssetStatus::new(LicenseAnswer::InternetRequired, 2.0);
        assert!(!status.is_licensed());
        assert_eq!(status.license_answer().user_message(), Some("Internet Required"));
        assert_eq!(LicenseAnswer::from_raw(99), LicenseAnswer::UnknownServerReply);
        assert_eq!(LicenseAnswer::Expired.user_message(), Some("Contact Support"));
    }
}
