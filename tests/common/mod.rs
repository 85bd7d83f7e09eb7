//! Shared fixtures for integration tests.
//!
//! Provides in-memory media builders and a [`Harness`] wiring a
//! [`Converter`] to a recording [`MemoryEngineFactory`].

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use image::codecs::gif::GifEncoder;
use image::{Delay, DynamicImage, ImageFormat, Rgba, RgbaImage};
use mm_av::{ImageEngine, MemoryEngineFactory, RunHook};
use mm_core::config::Config;
use mm_pipeline::{CancellationSignal, Converter, LogSender, ProgressSender};
use parking_lot::Mutex;

/// Animated GIF with `frames` distinct 8x6 frames.
pub fn animated_gif(frames: usize) -> Bytes {
    let mut buf = Vec::new();
    {
        let mut enc = GifEncoder::new(&mut buf);
        for i in 0..frames {
            let px = Rgba([(i * 25 % 256) as u8, 40, 200, 255]);
            enc.encode_frame(image::Frame::from_parts(
                RgbaImage::from_pixel(8, 6, px),
                0,
                0,
                Delay::from_numer_denom_ms(70, 1),
            ))
            .unwrap();
        }
    }
    Bytes::from(buf)
}

/// A noisy RGBA PNG of roughly `target_bytes`.
pub fn noisy_png(target_bytes: usize) -> Bytes {
    // Noise barely compresses, so side * side * 4 tracks the encoded size.
    let side = ((target_bytes / 4) as f64).sqrt() as u32;
    let mut state: u32 = 0x1234_5678;
    let img = RgbaImage::from_fn(side, side, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgba([r, g, b, 255])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    Bytes::from(out.into_inner())
}

/// Progress values seen by a [`ProgressSender`].
#[derive(Clone, Default)]
pub struct ProgressLog(Arc<Mutex<Vec<(f32, String)>>>);

impl ProgressLog {
    pub fn sender(&self) -> ProgressSender {
        let sink = self.0.clone();
        ProgressSender::new(move |pct, step| sink.lock().push((pct, step.to_string())))
    }

    pub fn values(&self) -> Vec<f32> {
        self.0.lock().iter().map(|(p, _)| *p).collect()
    }

    pub fn steps(&self) -> Vec<(f32, String)> {
        self.0.lock().clone()
    }

    pub fn is_monotonic(&self) -> bool {
        self.values().windows(2).all(|w| w[0] <= w[1])
    }
}

/// A converter over recording in-memory engines.
pub struct Harness {
    pub factory: Arc<MemoryEngineFactory>,
    pub converter: Converter,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_factory(Config::default(), MemoryEngineFactory::new())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_factory(config, MemoryEngineFactory::new())
    }

    pub fn with_factory(config: Config, factory: MemoryEngineFactory) -> Self {
        let factory = Arc::new(factory);
        let converter = Converter::new(config, factory.clone(), Arc::new(ImageEngine::new()));
        Self { factory, converter }
    }

    /// A harness whose engines call `cancel()` from inside their run when
    /// `should_cancel` returns true for the argument vector.
    pub fn cancelling_when(
        factory: MemoryEngineFactory,
        should_cancel: impl Fn(&[String]) -> bool + Send + Sync + 'static,
    ) -> Self {
        let signal: Arc<OnceLock<CancellationSignal>> = Arc::new(OnceLock::new());
        let hook_signal = signal.clone();
        let hook: RunHook = Arc::new(move |args| {
            if should_cancel(args) {
                if let Some(s) = hook_signal.get() {
                    s.cancel();
                }
            }
        });

        let harness = Self::with_factory(Config::default(), factory.with_run_hook(hook));
        let _ = signal.set(harness.converter.canceller());
        harness
    }

    pub fn log() -> LogSender {
        LogSender::noop()
    }
}
