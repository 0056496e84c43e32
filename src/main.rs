// src/main.rs - Host loop driving the hand tracking pipeline
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use hand_pipeline::config::SourceConfig;
use hand_pipeline::engine::{EngineSettings, TrackingEngine};
use hand_pipeline::error::{CaptureError, PipelineError};
use hand_pipeline::export::HandRecorder;
use hand_pipeline::pipeline::{HandPipeline, PipelineEvent};
use hand_pipeline::source::{CameraCapture, FrameSource, SourceBackend, VideoCapture, VideoFileReader};
use hand_pipeline::{Orientation, PipelineConfig, ProcessingMode};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Sync,
    Async,
}

impl From<ModeArg> for ProcessingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sync => ProcessingMode::Sync,
            ModeArg::Async => ProcessingMode::Async,
        }
    }
}

#[derive(Parser)]
#[command(name = "hand_pipeline")]
#[command(about = "Runs camera or video frames through the hand tracking engine")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Processing mode override
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Read frames from a video file instead of a camera
    #[arg(long)]
    video: Option<PathBuf>,

    /// Camera index
    #[arg(long)]
    camera: Option<u32>,

    /// Use the front-facing camera
    #[arg(long)]
    front: bool,

    /// Short edge of the processing resolution
    #[arg(long)]
    short_edge: Option<u32>,

    /// Record stable hand output to CSV
    #[arg(long)]
    record: bool,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if let Some(path) = &self.video {
            config.source = SourceConfig::Video {
                path: path.clone(),
                orientation: Orientation::Portrait,
                looping: false,
            };
        } else if let Some(index) = self.camera {
            config.source = SourceConfig::Camera { index: Some(index) };
        }
        if self.front {
            config.front_facing = true;
        }
        if let Some(short_edge) = self.short_edge {
            config.resolution.short_edge = short_edge;
        }
    }
}

fn build_source(config: &PipelineConfig) -> Result<FrameSource> {
    let (backend, orientation) = match &config.source {
        SourceConfig::Camera { index } => {
            let camera = CameraCapture::new(*index, config.front_facing, None);
            (SourceBackend::DeviceCamera(camera), Orientation::Portrait)
        }
        SourceConfig::Video {
            path,
            orientation,
            looping,
        } => {
            let mut reader = VideoFileReader::open(path)?;
            reader.load_all_frames()?;
            (SourceBackend::VideoFile(VideoCapture::new(reader, *looping)), *orientation)
        }
        SourceConfig::ArPassthrough => {
            bail!("AR passthrough needs a compositor supplied by the host runtime")
        }
    };
    Ok(FrameSource::new(backend, orientation, config.mirror_axis))
}

#[cfg(feature = "native-engine")]
fn build_engine() -> Box<dyn TrackingEngine> {
    Box::new(hand_pipeline::engine::NativeEngine::new())
}

#[cfg(not(feature = "native-engine"))]
fn build_engine() -> Box<dyn TrackingEngine> {
    Box::new(hand_pipeline::SimulatedEngine::new())
}

fn log_events(events: Vec<PipelineEvent>) {
    for event in events {
        match event {
            PipelineEvent::LicenseInitialized(status) if !status.is_licensed() => {
                warn!(answer = ?status.license_answer(), "Engine running unlicensed");
            }
            PipelineEvent::CaptureUnavailable(reason) => debug!(%reason, "No frame"),
            PipelineEvent::FrameProcessed { .. } => {}
            other => debug!(event = ?other, "Pipeline event"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hand_pipeline={}", args.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = PipelineConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    info!(mode = ?config.mode, source = ?config.source, "Starting hand pipeline");

    let source = build_source(&config)?;
    let mut pipeline = HandPipeline::new(source, build_engine(), &config);
    let settings = EngineSettings {
        license_key: config.license_key.clone(),
        ..EngineSettings::default()
    };
    pipeline.initialize(&settings)?;

    let mut recorder = args.record.then(|| {
        let dir = config
            .export_dir
            .clone()
            .unwrap_or_else(PipelineConfig::default_export_dir);
        HandRecorder::new(dir, None)
    });

    let period = Duration::from_secs_f64(1.0 / f64::from(config.target_fps.max(1)));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let started = Instant::now();
    let mut ticks = 0u64;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {}
        }

        match pipeline.tick() {
            Ok(_) => {}
            Err(PipelineError::Capture(CaptureError::EndOfVideo)) => {
                info!("Video finished");
                break;
            }
            Err(PipelineError::Capture(e)) => debug!(error = %e, "Retrying capture next tick"),
            Err(e) => return Err(e.into()),
        }

        let events = pipeline.drain_events();
        let processed = events
            .iter()
            .any(|e| matches!(e, PipelineEvent::FrameProcessed { .. }));
        if processed {
            if let Some(recorder) = recorder.as_mut() {
                recorder.add_frame(pipeline.stable_hands(), started.elapsed().as_secs_f64());
            }
        }
        log_events(events);

        ticks += 1;
        if args.max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
    }

    pipeline.shutdown();
    if let Some(recorder) = recorder {
        let dir = recorder.export_csv()?;
        info!(dir = %dir.display(), frames = recorder.frame_count(), "Recording saved");
    }
    Ok(())
}
