// src/source/video.rs - Video file playback via ffmpeg frame extraction
use crate::error::CaptureError;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

pub struct VideoFileReader {
    path: Option<PathBuf>,
    width: u32,
    height: u32,
    fps: f32,
    total_frames: usize,
    frames_cache: Vec<RgbaImage>,
    is_loaded: bool,
}

fn parse_frame_rate(raw: &str) -> f32 {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().unwrap_or(30.0);
            let den = den.parse::<f32>().unwrap_or(1.0);
            if den > 0.0 {
                num / den
            } else {
                30.0
            }
        }
        None => raw.parse().unwrap_or(30.0),
    }
}

impl VideoFileReader {
    /// Probes the file with ffprobe. Frames are extracted on first use.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            anyhow::bail!("Video file does not exist: {}", path.display());
        }
        fs::File::open(&path)
            .with_context(|| format!("Cannot read video file {}", path.display()))?;

        if Command::new("ffprobe").arg("-version").output().is_err() {
            anyhow::bail!("FFmpeg is not installed or not in PATH");
        }

        let output = Command::new("ffprobe")
            .args(["-v", "error", "-select_streams", "v:0", "-count_frames"])
            .args(["-show_entries", "stream=width,height,r_frame_rate,nb_read_frames"])
            .args(["-of", "csv=p=0"])
            .arg(&path)
            .output()
            .context("Failed to run ffprobe")?;

        let info = String::from_utf8_lossy(&output.stdout);
        let parts: Vec<&str> = info.trim().split(',').collect();
        if parts.len() < 4 {
            anyhow::bail!("Invalid video format or corrupted file");
        }

        let width = parts[0].parse().context("Invalid video width")?;
        let height = parts[1].parse().context("Invalid video height")?;
        let fps = parse_frame_rate(parts[2]);
        let total_frames: usize = parts[3].parse().context("Invalid frame count")?;
        if total_frames == 0 {
            anyhow::bail!("Video has no frames");
        }

        info!(path = %path.display(), width, height, fps, total_frames, "Probed video");
        Ok(Self {
            path: Some(path),
            width,
            height,
            fps,
            total_frames,
            frames_cache: Vec::new(),
            is_loaded: false,
        })
    }

    /// A reader over frames already in memory.
    pub fn from_frames(frames: Vec<RgbaImage>, fps: f32) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            path: None,
            width,
            height,
            fps,
            total_frames: frames.len(),
            frames_cache: frames,
            is_loaded: true,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn load_all_frames(&mut self) -> Result<()> {
        if self.is_loaded {
            return Ok(());
        }
        let Some(path) = self.path.clone() else {
            anyhow::bail!("Video reader has no file to load");
        };

        let temp_dir = std::env::temp_dir().join(format!("hand_pipeline_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&temp_dir).context("Cannot create temporary directory")?;
        debug!(dir = %temp_dir.display(), frames = self.total_frames, "Extracting video frames");

        let pattern = temp_dir.join("frame_%05d.png");
        let status = Command::new("ffmpeg")
            .arg("-i")
            .arg(&path)
            .args(["-loglevel", "error"])
            .arg(&pattern)
            .status()
            .context("Failed to extract frames with ffmpeg")?;

        if !status.success() {
            let _ = fs::remove_dir_all(&temp_dir);
            anyhow::bail!("FFmpeg frame extraction failed for {}", path.display());
        }

        self.frames_cache.clear();
        for i in 1..=self.total_frames {
            let frame_path = temp_dir.join(format!("frame_{:05}.png", i));
            if !frame_path.exists() {
                continue;
            }
            match image::open(&frame_path) {
                Ok(img) => self.frames_cache.push(img.to_rgba8()),
                Err(e) => warn!(frame = i, error = %e, "Failed to load extracted frame"),
            }
        }
        let _ = fs::remove_dir_all(&temp_dir);

        if self.frames_cache.is_empty() {
            anyhow::bail!("No frames could be loaded from the video");
        }
        self.total_frames = self.frames_cache.len();
        self.is_loaded = true;
        info!(frames = self.total_frames, "Loaded video frames");
        Ok(())
    }

    pub fn frame(&mut self, index: usize) -> Option<&RgbaImage> {
        if !self.is_loaded {
            if let Err(e) = self.load_all_frames() {
                warn!(error = %e, "Video load failed");
                return None;
            }
        }
        self.frames_cache.get(index)
    }
}

/// Playback state over a [`VideoFileReader`]. Paused playback keeps
/// serving the current frame so it can be processed repeatedly.
pub struct VideoCapture {
    reader: VideoFileReader,
    current: usize,
    playing: bool,
    looping: bool,
    finished: bool,
}

impl VideoCapture {
    pub fn new(reader: VideoFileReader, looping: bool) -> Self {
        Self {
            reader,
            current: 0,
            playing: true,
            looping,
            finished: false,
        }
    }

    pub fn reader(&self) -> &VideoFileReader {
        &self.reader
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing && self.finished {
            self.current = 0;
            self.finished = false;
        }
        self.playing = playing;
    }

    pub fn toggle_playing(&mut self) {
        self.set_playing(!self.playing);
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Seeking pauses playback.
    pub fn seek(&mut self, frame: usize) {
        let last = self.reader.total_frames().saturating_sub(1);
        self.current = frame.min(last);
        self.finished = false;
        self.playing = false;
    }

    pub fn step_forward(&mut self) {
        self.seek(self.current + 1);
    }

    pub fn step_back(&mut self) {
        self.seek(self.current.saturating_sub(1));
    }

    pub fn progress(&self) -> f32 {
        match self.reader.total_frames() {
            0 => 0.0,
            total => self.current as f32 / total as f32,
        }
    }

    pub fn capture(&mut self) -> Result<RgbaImage, CaptureError> {
        if self.finished {
            return Err(CaptureError::EndOfVideo);
        }
        let total = self.reader.total_frames();
        let index = self.current;
        let frame = self
            .reader
            .frame(index)
            .cloned()
            .ok_or_else(|| CaptureError::Video(format!("frame {index} unavailable")))?;

        if self.playing {
            if index + 1 < total {
                self.current = index + 1;
            } else if self.looping {
                self.current = 0;
            } else {
                debug!("Reached end of video");
                self.finished = true;
                self.playing = false;
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn reader(count: u8) -> VideoFileReader {
        let frames = (0..count)
            .map(|i| RgbaImage::from_pixel(2, 2, Rgba([i, 0, 0, 255])))
            .collect();
        VideoFileReader::from_frames(frames, 30.0)
    }

    fn red(img: &RgbaImage) -> u8 {
        img.get_pixel(0, 0)[0]
    }

    #[test]
    fn plays_through_and_stops_without_loop() {
        let mut video = VideoCapture::new(reader(2), false);
        assert_eq!(red(&video.capture().unwrap()), 0);
        assert_eq!(red(&video.capture().unwrap()), 1);
        assert!(matches!(video.capture(), Err(CaptureError::EndOfVideo)));
        assert!(!video.is_playing());

        video.set_playing(true);
        assert_eq!(red(&video.capture().unwrap()), 0);
    }

    #[test]
    fn loops_back_to_start() {
        let mut video = VideoCapture::new(reader(2), true);
        for expected in [0, 1, 0, 1] {
            assert_eq!(red(&video.capture().unwrap()), expected);
        }
    }

    #[test]
    fn paused_serves_same_frame_and_steps() {
        let mut video = VideoCapture::new(reader(3), false);
        video.seek(1);
        assert!(!video.is_playing());
        assert_eq!(red(&video.capture().unwrap()), 1);
        assert_eq!(red(&video.capture().unwrap()), 1);
        video.step_forward();
        assert_eq!(red(&video.capture().unwrap()), 2);
        video.step_forward();
        assert_eq!(video.current_frame(), 2);
        video.step_back();
        video.step_back();
        video.step_back();
        assert_eq!(video.current_frame(), 0);
    }

    #[test]
    fn frame_rate_parsing() {
        assert_eq!(parse_frame_rate("30000/1001").round(), 30.0);
        assert_eq!(parse_frame_rate("25"), 25.0);
        assert_eq!(parse_frame_rate("bogus"), 30.0);
        assert_eq!(parse_frame_rate("1/0"), 30.0);
    }
}
