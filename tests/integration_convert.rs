//! End-to-end conversions against the in-memory transcoder.

mod common;

use assert_matches::assert_matches;
use std::sync::Arc;

use bytes::Bytes;
use common::{animated_gif, noisy_png, Harness, ProgressLog};
use image::DynamicImage;
use mm_av::{Frame, MemoryEngineFactory, StillImageEngine};
use mm_core::config::Config;
use mm_core::{Error, Scenario};
use mm_pipeline::{Converter, EngineRoute, LogSender, ProgressSender, SignalState, SourceFile, SlotState};

#[tokio::test]
async fn png_to_jpg_stays_off_the_transcoder() {
    let h = Harness::new();
    let png = noisy_png(1024 * 1024);
    let progress = ProgressLog::default();

    let out = h
        .converter
        .convert(
            SourceFile::new("photo.png", "image/png", png),
            "jpg",
            progress.sender(),
            Harness::log(),
        )
        .await
        .unwrap();

    assert_eq!(out.route, EngineRoute::StillImage);
    assert_eq!(out.scenario, Scenario::ImageToImage);
    assert_eq!(out.mime, "image/jpg");
    assert_eq!(&out.data[..2], &[0xFF, 0xD8]);
    assert_eq!(h.factory.created_count(), 0);
    assert_eq!(progress.values().last().copied(), Some(100.0));
}

#[tokio::test]
async fn animated_gif_to_mp4_goes_through_frames() {
    let h = Harness::new();
    let progress = ProgressLog::default();

    let out = h
        .converter
        .convert(
            SourceFile::new("loop.gif", "image/gif", animated_gif(10)),
            "mp4",
            progress.sender(),
            Harness::log(),
        )
        .await
        .unwrap();

    assert_eq!(out.scenario, Scenario::AnimatedImageToVideo);
    assert_eq!(out.route, EngineRoute::Transcoder);
    assert_eq!(out.mime, "video/mp4");

    let engine = h.factory.latest().unwrap();
    let written = engine.written();
    let frames: Vec<_> = written.iter().filter(|n| n.starts_with("frame-")).collect();
    assert_eq!(frames.len(), 10);
    assert_eq!(frames[0], "frame-0000.png");
    assert_eq!(frames[9], "frame-0009.png");

    let invocations = engine.invocations();
    assert_eq!(invocations.len(), 1);
    let args = &invocations[0];
    let rate = args.iter().position(|a| a == "-framerate").unwrap();
    assert_eq!(args[rate + 1], "25");
    assert!(args.iter().any(|a| a == "frame-%04d.png"));
    assert_eq!(args.last().unwrap(), "output.mp4");

    // Extraction reports stay inside its share of the range.
    let steps = progress.steps();
    let extract: Vec<f32> = steps
        .iter()
        .filter(|(_, s)| s == "extract")
        .map(|(p, _)| *p)
        .collect();
    assert!(!extract.is_empty());
    assert!(extract.iter().all(|p| *p <= 40.0));
    assert!(progress.is_monotonic());
    assert_eq!(progress.values().last().copied(), Some(100.0));

    // Every working file is gone afterwards.
    assert!(engine.file_names().is_empty());
    let deleted = engine.deleted();
    assert!(deleted.iter().any(|n| n == "frame-0005.png"));
    assert!(deleted.iter().any(|n| n == "output.mp4"));
}

#[tokio::test]
async fn video_to_gif_runs_two_passes() {
    let h = Harness::new();
    let out = h
        .converter
        .convert(
            SourceFile::new("clip.mp4", "video/mp4", vec![7u8; 64]),
            "gif",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap();

    assert_eq!(out.scenario, Scenario::VideoToGif);
    assert_eq!(out.mime, "image/gif");

    let engine = h.factory.latest().unwrap();
    let invocations = engine.invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0].last().unwrap(), "palette.png");
    assert!(invocations[0].iter().any(|a| a.contains("palettegen")));
    assert!(invocations[1].iter().any(|a| a.contains("paletteuse")));
    assert_eq!(invocations[1].last().unwrap(), "output.gif");

    assert!(engine.deleted().iter().any(|n| n == "palette.png"));
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn audio_transcode_uses_one_pass() {
    let h = Harness::new();
    let out = h
        .converter
        .convert(
            SourceFile::new("song.flac", "", vec![3u8; 32]),
            "mp3",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap();

    assert_eq!(out.scenario, Scenario::AudioToAudio);
    assert_eq!(out.mime, "audio/mp3");
    assert_eq!(h.factory.latest().unwrap().invocations().len(), 1);
}

#[tokio::test]
async fn cancelling_mid_run_terminates_the_engine() {
    let h = Harness::cancelling_when(MemoryEngineFactory::new(), |_| true);

    let err = h
        .converter
        .convert(
            SourceFile::new("clip.mov", "video/quicktime", vec![1u8; 16]),
            "mp4",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::Cancelled);
    let first = h.factory.latest().unwrap();
    assert!(mm_av::TranscodeEngine::is_terminated(first.as_ref()));
    assert_eq!(h.converter.engine_slot().state(), SlotState::TornDown);
    assert_eq!(h.converter.canceller().state(), SignalState::Idle);
}

#[tokio::test]
async fn next_job_after_cancel_gets_a_fresh_engine() {
    let h = Harness::cancelling_when(MemoryEngineFactory::new(), |args| {
        args.last().map(String::as_str) == Some("output.mp4")
    });

    let err = h
        .converter
        .convert(
            SourceFile::new("clip.mov", "video/quicktime", vec![1u8; 16]),
            "mp4",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, Error::Cancelled);
    assert_eq!(h.factory.created_count(), 1);

    let out = h
        .converter
        .convert(
            SourceFile::new("clip.mov", "video/quicktime", vec![1u8; 16]),
            "webm",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap();

    assert_eq!(out.mime, "video/webm");
    assert_eq!(h.factory.created_count(), 2);
    let fresh = h.factory.latest().unwrap();
    assert!(!mm_av::TranscodeEngine::is_terminated(fresh.as_ref()));
}

#[tokio::test]
async fn cancel_supersedes_an_engine_failure() {
    let h = Harness::cancelling_when(MemoryEngineFactory::new().failing("boom"), |_| true);

    let err = h
        .converter
        .convert(
            SourceFile::new("clip.mp4", "video/mp4", vec![1u8; 16]),
            "gif",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::Cancelled);
}

#[tokio::test]
async fn cancel_during_frame_extraction_stops_the_job() {
    let mut config = Config::default();
    config.conversion.frame_batch_size = 2;
    let h = Harness::with_factory(config, MemoryEngineFactory::new());
    let canceller = h.converter.canceller();
    let progress = ProgressSender::new(move |_, step| {
        if step == "extract" {
            canceller.cancel();
        }
    });

    let err = h
        .converter
        .convert(
            SourceFile::new("loop.gif", "image/gif", animated_gif(10)),
            "mp4",
            progress,
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::Cancelled);
    let engine = h.factory.latest().unwrap();
    let frames = engine
        .written()
        .iter()
        .filter(|n| n.starts_with("frame-"))
        .count();
    assert!(frames < 10, "extraction kept going after cancel: {frames}");
    assert!(engine.invocations().is_empty());

    // The torn-down engine still releases every frame the job wrote.
    assert!(engine.file_names().is_empty());
    assert_eq!(engine.deleted().len(), frames);
}

#[tokio::test]
async fn cancel_on_first_batch_releases_its_frames() {
    let h = Harness::new();
    let canceller = h.converter.canceller();
    let progress = ProgressSender::new(move |_, step| {
        if step == "extract" {
            canceller.cancel();
        }
    });

    let err = h
        .converter
        .convert(
            SourceFile::new("loop.gif", "image/gif", animated_gif(25)),
            "mp4",
            progress,
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::Cancelled);
    let engine = h.factory.latest().unwrap();
    let mut written = engine.written();
    let mut deleted = engine.deleted();
    written.sort();
    deleted.sort();
    assert_eq!(written.len(), 10);
    assert_eq!(deleted, written);
    assert!(engine.file_names().is_empty());
}

#[tokio::test]
async fn size_limit_is_inclusive() {
    let limit = 100 * 1024 * 1024;
    let h = Harness::new();
    assert_eq!(h.converter.config().limits.max_input_bytes, limit as u64);

    let err = h
        .converter
        .convert(
            SourceFile::new("big.mp4", "video/mp4", Bytes::from(vec![0u8; limit + 1])),
            "webm",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, Error::FileTooLarge { .. });
    assert_eq!(err.exit_code(), Error::FileTooLarge { size: 0, limit: 0 }.exit_code());
    assert_eq!(h.factory.created_count(), 0);

    h.converter
        .convert(
            SourceFile::new("big.mp4", "video/mp4", Bytes::from(vec![0u8; limit])),
            "webm",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn audio_to_image_is_unsupported() {
    let h = Harness::new();
    let err = h
        .converter
        .convert(
            SourceFile::new("song.mp3", "audio/mpeg", vec![1u8; 8]),
            "png",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::UnsupportedScenario { .. });
    assert_eq!(h.factory.created_count(), 0);
}

#[tokio::test]
async fn unknown_target_fails_classification() {
    let h = Harness::new();
    let err = h
        .converter
        .convert(
            SourceFile::new("photo.png", "image/png", noisy_png(4096)),
            "xyz",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::UnsupportedScenario { ref target, .. } if target == "xyz");
    assert_eq!(h.factory.created_count(), 0);
}

/// Decodes anything into a single pixel and refuses every encode.
struct WriteOnlyPng;

impl StillImageEngine for WriteOnlyPng {
    fn decode(&self, _data: &[u8]) -> mm_core::Result<Frame> {
        Ok(Frame::new(DynamicImage::new_rgba8(1, 1)))
    }

    fn decode_frames(&self, data: &[u8]) -> mm_core::Result<Vec<Frame>> {
        Ok(vec![self.decode(data)?])
    }

    fn encode(&self, _frame: &Frame, format: &str) -> mm_core::Result<Vec<u8>> {
        Err(Error::UnsupportedTargetFormat(format.to_string()))
    }
}

#[tokio::test]
async fn still_engine_refusal_surfaces_as_unsupported_target() {
    let factory = Arc::new(MemoryEngineFactory::new());
    let converter = Converter::new(Config::default(), factory.clone(), Arc::new(WriteOnlyPng));

    let err = converter
        .convert(
            SourceFile::new("photo.png", "image/png", noisy_png(4096)),
            "bmp",
            ProgressSender::noop(),
            LogSender::noop(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, Error::UnsupportedTargetFormat(ref f) if f == "bmp");
    assert_eq!(err.exit_code(), 4);
    assert_eq!(factory.created_count(), 0);
}
