// src/bin/camera_probe.rs - Lists cameras and grabs one normalized frame
use anyhow::{Context, Result};
use clap::Parser;
use hand_pipeline::normalizer::FrameNormalizer;
use hand_pipeline::source::{list_devices, select_device, CameraCapture, FrameSource, MirrorAxis, ResolutionPolicy, SourceBackend};
use hand_pipeline::Orientation;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "camera_probe")]
#[command(about = "Checks camera access and the processing resolution")]
struct Args {
    /// Camera index to open
    #[arg(long)]
    camera: Option<u32>,

    /// Prefer a front-facing camera
    #[arg(long)]
    front: bool,

    /// Save the normalized frame as PNG
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let devices = list_devices().context("Failed to query cameras")?;
    info!(count = devices.len(), "Camera detection");
    for device in &devices {
        info!(index = device.index, name = %device.name, front_facing = device.front_facing, "Found camera");
    }
    match select_device(&devices, args.camera, args.front) {
        Some(device) => info!(index = device.index, name = %device.name, "Selected camera"),
        None => {
            warn!("No camera connected, or camera permissions not granted");
            return Ok(());
        }
    }

    let camera = CameraCapture::new(args.camera, args.front, None);
    let mut source = FrameSource::new(
        SourceBackend::DeviceCamera(camera),
        Orientation::Portrait,
        MirrorAxis::Horizontal,
    );
    let raw = match source.read() {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "Failed to capture frame");
            return Err(e.into());
        }
    };
    let (width, height) = raw.dimensions();
    info!(width, height, "Frame captured");

    let mut normalizer = FrameNormalizer::new(ResolutionPolicy::default());
    let frame = normalizer.normalize(&raw)?;
    let (nw, nh) = frame.dimensions();
    info!(width = nw, height = nh, "Normalized processing frame");

    if let Some(path) = &args.save {
        frame
            .texture
            .read()
            .save(path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        info!(path = %path.display(), "Saved frame");
    }
    Ok(())
}
