// src/config.rs - Pipeline configuration loaded from JSON
use crate::bridge::ProcessingMode;
use crate::error::ConfigError;
use crate::filter::OneEuroSettings;
use crate::session::{Features, Orientation, DEFAULT_FINGER_INFO, MAX_FINGER_INFO};
use crate::source::{MirrorAxis, ResolutionPolicy};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub skeleton_3d: bool,
    pub gestures: bool,
    pub fast_mode: bool,
    pub wrist_info: bool,
    /// 0 = off, 1 = thumb .. 5 = pinky.
    pub finger_info: i32,
    pub contour: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            skeleton_3d: true,
            gestures: true,
            fast_mode: false,
            wrist_info: false,
            finger_info: 0,
            contour: false,
        }
    }
}

impl FeatureConfig {
    pub fn to_features(&self) -> Features {
        let finger_info = if (0..=MAX_FINGER_INFO).contains(&self.finger_info) {
            self.finger_info
        } else {
            warn!(
                finger_info = self.finger_info,
                fallback = DEFAULT_FINGER_INFO,
                "Configured finger info out of range"
            );
            DEFAULT_FINGER_INFO
        };
        Features {
            skeleton_3d: i32::from(self.skeleton_3d),
            gestures: i32::from(self.gestures),
            fast_mode: i32::from(self.fast_mode),
            wrist_info: i32::from(self.wrist_info),
            finger_info,
            contour: i32::from(self.contour),
            two_hands: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Crop the frame to fill the display instead of letterboxing it.
    pub cover_screen: bool,
    pub fov_degrees: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            cover_screen: true,
            fov_degrees: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Camera {
        #[serde(default)]
        index: Option<u32>,
    },
    Video {
        path: PathBuf,
        #[serde(default = "default_video_orientation")]
        orientation: Orientation,
        #[serde(default = "default_true")]
        looping: bool,
    },
    ArPassthrough,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Camera { index: None }
    }
}

fn default_video_orientation() -> Orientation {
    Orientation::Portrait
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: ProcessingMode,
    pub front_facing: bool,
    pub features: FeatureConfig,
    pub smoothing: f32,
    pub gesture_smoothing: f32,
    pub smoothing_enabled: bool,
    pub resolution: ResolutionPolicy,
    /// Engine-side downscale ("splitting") factor, 1-10.
    pub downscale: u32,
    pub display: DisplayConfig,
    pub source: SourceConfig,
    pub mirror_axis: MirrorAxis,
    pub filter: OneEuroSettings,
    pub target_fps: u32,
    pub license_key: String,
    pub export_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Async,
            front_facing: false,
            features: FeatureConfig::default(),
            smoothing: 0.5,
            gesture_smoothing: 0.5,
            smoothing_enabled: true,
            resolution: ResolutionPolicy::default(),
            downscale: 1,
            display: DisplayConfig::default(),
            source: SourceConfig::default(),
            mirror_axis: MirrorAxis::Horizontal,
            filter: OneEuroSettings::default(),
            target_fps: 30,
            license_key: String::new(),
            export_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Loads the file at `path` if given, else the platform default file if
    /// it exists, else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "handpipeline", "HandPipeline")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Default recording directory when none is configured.
    pub fn default_export_dir() -> PathBuf {
        ProjectDirs::from("com", "handpipeline", "HandPipeline")
            .map(|dirs| dirs.data_dir().join("recordings"))
            .unwrap_or_else(|| PathBuf::from("recordings"))
    }

    pub fn filter_settings(&self) -> OneEuroSettings {
        self.filter.with_smoothing(self.smoothing)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mode": "sync", "features": {{"contour": true}}, "resolution": {{"short_edge": 360, "long_edge_cap": 640}}}}"#
        )
        .unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.mode, ProcessingMode::Sync);
        assert!(config.features.contour);
        assert!(config.features.skeleton_3d);
        assert_eq!(config.resolution.short_edge, 360);
        assert_eq!(config.resolution.long_edge_cap, Some(640));
        assert_eq!(config.target_fps, 30);
        assert_eq!(config.filter.beta, 500.0);
    }

    #[test]
    fn video_source_parses() {
        let json = r#"{"source": {"kind": "video", "path": "clip.mp4", "orientation": "landscape_left"}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Video {
                path: PathBuf::from("clip.mp4"),
                orientation: Orientation::LandscapeLeft,
                looping: true,
            }
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn out_of_range_finger_info_falls_back() {
        let features = FeatureConfig {
            finger_info: 9,
            ..FeatureConfig::default()
        };
        assert_eq!(features.to_features().finger_info, DEFAULT_FINGER_INFO);
        assert_eq!(features.to_features().two_hands, 1);
    }

    #[test]
    fn smoothing_maps_into_beta_range() {
        let config = PipelineConfig {
            smoothing: 1.0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.filter_settings().beta, 25.0);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = PipelineConfig::default();
        let text = config.to_json().unwrap();
        let back: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
