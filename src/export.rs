// src/export.rs - CSV recording of stable hand output
use crate::hand::{LeftOrRightHand, INDEX_MCP, INDEX_TIP, JOINT_COUNT, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP, PINKY_TIP, WRIST};
use crate::tracking::StableHand;
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use nalgebra::{Point3, Vector3};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// One joint of one hand in one frame.
#[derive(Debug, Serialize)]
struct JointRecord {
    frame: u64,
    timestamp: f64,
    hand: &'static str,
    joint: usize,
    x: f32,
    y: f32,
    z: f32,
    qx: f32,
    qy: f32,
    qz: f32,
    qw: f32,
}

/// Per-hand summary for one frame.
#[derive(Debug, Serialize)]
struct HandRecord {
    frame: u64,
    timestamp: f64,
    hand: &'static str,
    tracked: bool,
    depth: f32,
    mano_class: i32,
    continuous_gesture: i32,
    trigger_gesture: i32,
    index_curl: Option<f32>,
    middle_curl: Option<f32>,
    pinky_curl: Option<f32>,
    wrist_flexion: Option<f32>,
}

fn side_label(side: LeftOrRightHand) -> &'static str {
    match side {
        LeftOrRightHand::Left => "left",
        LeftOrRightHand::Right => "right",
        LeftOrRightHand::NoHand => "none",
    }
}

pub struct HandRecorder {
    output_dir: PathBuf,
    session_name: String,
    joints: Vec<JointRecord>,
    hands: Vec<HandRecord>,
    frames: u64,
}

impl HandRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            joints: Vec::new(),
            hands: Vec::new(),
            frames: 0,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn add_frame(&mut self, hands: &[StableHand], timestamp: f64) {
        let frame = self.frames;
        self.frames += 1;
        for hand in hands {
            let label = side_label(hand.side);
            self.hands.push(Self::hand_record(frame, timestamp, label, hand));
            if !hand.is_tracked {
                continue;
            }
            for joint in 0..JOINT_COUNT {
                let p = hand.joints[joint];
                let q = hand.rotations[joint].quaternion();
                self.joints.push(JointRecord {
                    frame,
                    timestamp,
                    hand: label,
                    joint,
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    qx: q.i,
                    qy: q.j,
                    qz: q.k,
                    qw: q.w,
                });
            }
        }
    }

    fn hand_record(frame: u64, timestamp: f64, hand_label: &'static str, hand: &StableHand) -> HandRecord {
        let tracked = hand.is_tracked;
        let angle = |f: fn(&[Point3<f32>; JOINT_COUNT]) -> f32| tracked.then(|| f(&hand.joints));
        HandRecord {
            frame,
            timestamp,
            hand: hand_label,
            tracked,
            depth: hand.depth,
            mano_class: hand.gesture.mano_class,
            continuous_gesture: hand.gesture.continuous,
            trigger_gesture: hand.gesture.trigger,
            index_curl: angle(|j| finger_curl(j, INDEX_MCP, INDEX_TIP)),
            middle_curl: angle(|j| finger_curl(j, MIDDLE_MCP, MIDDLE_TIP)),
            pinky_curl: angle(|j| finger_curl(j, PINKY_MCP, PINKY_TIP)),
            wrist_flexion: angle(wrist_flexion),
        }
    }

    /// Writes `joints.csv` and `hands.csv` into the session directory.
    pub fn export_csv(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create recording directory {}", dir.display()))?;

        write_records(&dir.join("joints.csv"), &self.joints)?;
        write_records(&dir.join("hands.csv"), &self.hands)?;
        info!(
            dir = %dir.display(),
            frames = self.frames,
            joint_rows = self.joints.len(),
            "Exported hand recording"
        );
        Ok(dir)
    }
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Mean bend in degrees between consecutive segments of the finger whose
/// joints run `mcp..=tip`.
fn finger_curl(joints: &[Point3<f32>; JOINT_COUNT], mcp: usize, tip: usize) -> f32 {
    let segments: Vec<Vector3<f32>> = (mcp..tip).map(|i| joints[i + 1] - joints[i]).collect();
    if segments.len() < 2 {
        return 0.0;
    }
    let total: f32 = segments
        .windows(2)
        .map(|pair| angle_between(&pair[0], &pair[1]))
        .sum();
    (total / (segments.len() - 1) as f32).to_degrees()
}

fn wrist_flexion(joints: &[Point3<f32>; JOINT_COUNT]) -> f32 {
    let palm = joints[MIDDLE_MCP] - joints[WRIST];
    let finger = joints[MIDDLE_TIP] - joints[MIDDLE_MCP];
    angle_between(&palm, &finger).to_degrees()
}

fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let (na, nb) = (a.norm(), b.norm());
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::GestureInfo;
    use nalgebra::UnitQuaternion;
    use tempfile::tempdir;

    fn straight_hand(side: LeftOrRightHand, tracked: bool) -> StableHand {
        let mut joints = [Point3::origin(); JOINT_COUNT];
        for (i, joint) in joints.iter_mut().enumerate() {
            *joint = Point3::new(0.0, i as f32 * 0.01, 0.5);
        }
        StableHand {
            side,
            is_tracked: tracked,
            depth: 0.5,
            joints,
            rotations: [UnitQuaternion::identity(); JOINT_COUNT],
            gesture: GestureInfo::default(),
        }
    }

    #[test]
    fn straight_finger_has_no_curl() {
        let hand = straight_hand(LeftOrRightHand::Left, true);
        assert!(finger_curl(&hand.joints, INDEX_MCP, INDEX_TIP).abs() < 0.1);
        assert!(wrist_flexion(&hand.joints).abs() < 0.1);
    }

    #[test]
    fn right_angle_bend() {
        let mut joints = [Point3::origin(); JOINT_COUNT];
        joints[INDEX_MCP] = Point3::new(0.0, 0.0, 0.0);
        joints[INDEX_MCP + 1] = Point3::new(0.0, 1.0, 0.0);
        joints[INDEX_MCP + 2] = Point3::new(1.0, 1.0, 0.0);
        joints[INDEX_TIP] = Point3::new(1.0, 0.0, 0.0);
        assert!((finger_curl(&joints, INDEX_MCP, INDEX_TIP) - 90.0).abs() < 0.1);
    }

    #[test]
    fn export_writes_long_format() {
        let dir = tempdir().unwrap();
        let mut recorder = HandRecorder::new(dir.path(), Some("test_session".into()));
        let hands = [
            straight_hand(LeftOrRightHand::Left, true),
            straight_hand(LeftOrRightHand::Right, false),
        ];
        recorder.add_frame(&hands, 0.0);
        recorder.add_frame(&hands, 0.033);
        let out = recorder.export_csv().unwrap();
        assert_eq!(out, dir.path().join("test_session"));

        let mut joints = csv::Reader::from_path(out.join("joints.csv")).unwrap();
        let headers = joints.headers().unwrap().clone();
        assert_eq!(&headers[0], "frame");
        assert_eq!(&headers[10], "qw");
        // Untracked right hand contributes no joint rows.
        assert_eq!(joints.records().count(), 2 * JOINT_COUNT);

        let mut summary = csv::Reader::from_path(out.join("hands.csv")).unwrap();
        let rows: Vec<_> = summary.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[1][2], "right");
        assert_eq!(&rows[1][3], "false");
        assert_eq!(&rows[1][8], "");
    }
}
