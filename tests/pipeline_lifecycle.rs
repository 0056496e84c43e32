mod common;

use common::{hand_at, Call, Script, ScriptedEngine};
use hand_pipeline::bridge::{SkipReason, TickOutcome};
use hand_pipeline::config::{DisplayConfig, PipelineConfig};
use hand_pipeline::hand::LeftOrRightHand;
use hand_pipeline::pipeline::{HandPipeline, PipelineEvent, PipelineState};
use hand_pipeline::session::{AddOn, Orientation};
use hand_pipeline::source::{FrameSource, MirrorAxis, PassthroughCapture, PassthroughCompositor, ResolutionPolicy, SourceBackend};
use hand_pipeline::{EngineSettings, PipelineError, ProcessingMode};
use image::{Rgba, RgbaImage};

struct GreyCompositor;

impl PassthroughCompositor for GreyCompositor {
    fn composite(&mut self, width: u32, height: u32) -> Option<RgbaImage> {
        Some(RgbaImage::from_pixel(width, height, Rgba([100, 100, 100, 255])))
    }
}

fn config(mode: ProcessingMode) -> PipelineConfig {
    PipelineConfig {
        mode,
        resolution: ResolutionPolicy {
            short_edge: 270,
            long_edge_cap: None,
        },
        display: DisplayConfig {
            width: 540,
            height: 960,
            ..DisplayConfig::default()
        },
        ..PipelineConfig::default()
    }
}

fn ar_pipeline(mode: ProcessingMode) -> (HandPipeline<ScriptedEngine>, Script) {
    let cfg = config(mode);
    let capture = PassthroughCapture::new(
        Box::new(GreyCompositor),
        (cfg.display.width, cfg.display.height),
        cfg.resolution,
    );
    let source = FrameSource::new(
        SourceBackend::ArPassthrough(capture),
        Orientation::Portrait,
        MirrorAxis::Horizontal,
    );
    let (engine, script) = ScriptedEngine::new();
    let mut pipeline = HandPipeline::new(source, engine, &cfg);
    pipeline.initialize(&EngineSettings::default()).unwrap();
    (pipeline, script)
}

#[test]
fn device_rotation_reregisters_on_following_tick() {
    let (mut pipeline, script) = ar_pipeline(ProcessingMode::Async);
    assert_eq!(pipeline.session().add_on(), AddOn::ArFoundation);

    script.publish(1, [hand_at(0, 0.5), hand_at(1, 0.5)]);
    assert_eq!(pipeline.tick().unwrap(), Some(TickOutcome::Processed { frame_number: 1 }));
    assert!(script.calls().contains(&Call::SetResolution(270, 480)));
    assert_eq!(pipeline.state(), PipelineState::Capturing);

    // Face-up readings carry no layout information.
    assert!(!pipeline.observe_device_orientation(Orientation::FaceUp));
    assert!(pipeline.observe_device_orientation(Orientation::LandscapeLeft));

    script.publish(2, [hand_at(0, 0.2), hand_at(1, 0.8)]);
    assert_eq!(
        pipeline.tick().unwrap(),
        Some(TickOutcome::Skipped(SkipReason::RegistrationPending))
    );
    assert_eq!(pipeline.session().orientation(), Orientation::LandscapeLeft);
    assert_eq!(pipeline.current_frame().unwrap().dimensions(), (480, 270));
    assert_eq!(pipeline.compensator().camera().screen_width, 960);
    assert!(!script.calls().contains(&Call::SetResolution(480, 270)));

    let mark = script.call_count();
    assert_eq!(pipeline.tick().unwrap(), Some(TickOutcome::Stale { frame_number: 2 }));
    assert_eq!(script.calls_since(mark)[0], Call::SetResolution(480, 270));

    script.publish(3, [hand_at(0, 0.2), hand_at(1, 0.8)]);
    assert_eq!(pipeline.tick().unwrap(), Some(TickOutcome::Stale { frame_number: 3 }));
    assert!(pipeline.try_hand_info(LeftOrRightHand::Left).is_some());

    script.publish(4, [hand_at(0, 0.2), hand_at(1, 0.8)]);
    assert_eq!(pipeline.tick().unwrap(), Some(TickOutcome::Processed { frame_number: 4 }));
    assert!(pipeline.try_hand_info(LeftOrRightHand::Left).is_some());

    let events = pipeline.drain_events();
    assert!(events.contains(&PipelineEvent::OrientationChanged(Orientation::LandscapeLeft)));
}

#[test]
fn front_facing_switch_updates_session() {
    let (mut pipeline, _script) = ar_pipeline(ProcessingMode::Sync);
    pipeline.tick().unwrap();
    pipeline.set_front_facing(true);
    let outcome = pipeline.tick().unwrap();
    assert_eq!(pipeline.session().orientation(), Orientation::PortraitFrontFacing);
    assert!(matches!(outcome, Some(TickOutcome::Processed { .. })));
    assert!(pipeline
        .drain_events()
        .contains(&PipelineEvent::CameraChanged { front_facing: true }));
}

#[test]
fn pause_halts_engine_and_resume_reregisters_immediately() {
    let (mut pipeline, script) = ar_pipeline(ProcessingMode::Async);
    pipeline.tick().unwrap();

    pipeline.focus_changed(false);
    assert_eq!(pipeline.state(), PipelineState::Paused);
    let mark = script.call_count();
    assert_eq!(pipeline.tick().unwrap(), None);
    assert_eq!(pipeline.tick().unwrap(), None);
    assert_eq!(script.call_count(), mark);

    pipeline.focus_changed(true);
    assert_eq!(pipeline.state(), PipelineState::Capturing);
    assert_eq!(
        script.calls_since(mark),
        vec![
            Call::SetResolution(270, 480),
            Call::SetMaskBuffers(270, 480),
            Call::SetTexture(270, 480),
        ]
    );

    let events = pipeline.drain_events();
    assert!(events.contains(&PipelineEvent::StateChanged {
        from: PipelineState::Capturing,
        to: PipelineState::Paused,
    }));
    assert!(events.contains(&PipelineEvent::StateChanged {
        from: PipelineState::Paused,
        to: PipelineState::Capturing,
    }));
}

#[test]
fn shutdown_releases_everything() {
    let (mut pipeline, script) = ar_pipeline(ProcessingMode::Sync);
    pipeline.tick().unwrap();
    let frame = pipeline.current_frame().unwrap().clone();

    pipeline.shutdown();
    assert_eq!(pipeline.state(), PipelineState::Disposed);
    assert_eq!(script.calls().last(), Some(&Call::Stop));
    assert!(pipeline.current_frame().is_none());
    assert!(matches!(pipeline.tick(), Err(PipelineError::Disposed)));
    // Handles held outside the pipeline stay valid.
    assert_eq!(frame.texture.read().dimensions(), (270, 480));

    pipeline.shutdown();
    assert_eq!(
        script.calls().iter().filter(|c| **c == Call::Stop).count(),
        1
    );
}

#[test]
fn stable_hands_follow_processed_results() {
    let (mut pipeline, script) = ar_pipeline(ProcessingMode::Async);
    script.publish(1, [hand_at(0, 0.5), hand_at(1, 0.5)]);
    pipeline.tick().unwrap();
    let hands = pipeline.stable_hands();
    assert!(hands.iter().all(|h| h.is_tracked));
    assert!(pipeline.any_hand_visible());

    script.publish(2, common::no_hands());
    pipeline.tick().unwrap();
    assert!(pipeline.stable_hands().iter().all(|h| !h.is_tracked));
    assert!(!pipeline.any_hand_visible());
}
