// src/lib.rs
//! Feeds camera frames to an external hand tracking engine and turns its
//! per-frame skeletons into smoothed, orientation-correct hand state.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod hand;
pub mod normalizer;
pub mod orientation;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod tracking;

pub use bridge::{PerformanceReport, ProcessingMode, TickOutcome, TrackingBridge};
pub use config::PipelineConfig;
pub use engine::{EngineSettings, SimulatedEngine, TrackingEngine};
pub use error::{CaptureError, ConfigError, EngineError, PipelineError};
pub use hand::{HandInfo, LeftOrRightHand};
pub use pipeline::{HandPipeline, PipelineEvent, PipelineState};
pub use session::{Orientation, Session};
pub use tracking::{HandTracker, StableHand};
