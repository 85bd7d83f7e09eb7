//! Codec engine capability traits.
//!
//! The orchestrator never encodes anything itself. It drives two
//! collaborators:
//!
//! - a [`TranscodeEngine`] that runs argument vectors against its own
//!   name-addressed working filesystem (video, audio, complex pipelines);
//! - a [`StillImageEngine`] that decodes and encodes single images and
//!   coalesces animated images into self-contained frames.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::DynamicImage;

pub mod ffmpeg;
pub mod image_engine;
pub mod memory;

pub use ffmpeg::{FfmpegEngine, FfmpegEngineFactory};
pub use image_engine::ImageEngine;
pub use memory::{MemoryEngine, MemoryEngineFactory, RunHook};

/// Receives engine diagnostics while an invocation runs.
pub trait EngineObserver: Send + Sync {
    /// A human-readable log line from the engine.
    fn on_log(&self, line: &str);

    /// Completion ratio of the current invocation, `0.0..=1.0`.
    fn on_progress(&self, ratio: f64);
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EngineObserver for NoopObserver {
    fn on_log(&self, _line: &str) {}
    fn on_progress(&self, _ratio: f64) {}
}

/// A general-purpose transcoder with a shared working filesystem.
///
/// The working filesystem is a single namespace; callers must not run two
/// invocations concurrently against the same engine.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Short engine name used in error reports.
    fn name(&self) -> &'static str;

    /// Store `data` under `name` in the working filesystem.
    async fn write_file(&self, name: &str, data: Bytes) -> mm_core::Result<()>;

    /// Run one invocation.
    async fn run(&self, args: &[String], observer: &dyn EngineObserver) -> mm_core::Result<()>;

    /// Read back a file from the working filesystem.
    async fn read_file(&self, name: &str) -> mm_core::Result<Bytes>;

    /// Delete a file. Missing files are an error; callers decide whether that
    /// matters. Still works after [`terminate`](Self::terminate), so a
    /// cancelled job can release what it registered.
    async fn delete_file(&self, name: &str) -> mm_core::Result<()>;

    /// Abandon any in-flight invocation. Every later call except
    /// [`delete_file`](Self::delete_file) fails with
    /// [`mm_core::Error::EngineUnavailable`].
    fn terminate(&self);

    /// Whether [`terminate`](Self::terminate) has been called.
    fn is_terminated(&self) -> bool;
}

/// Creates transcoding engines on demand.
pub trait EngineFactory: Send + Sync {
    /// Build a fresh, ready engine.
    fn create(&self) -> mm_core::Result<Arc<dyn TranscodeEngine>>;
}

/// A single decoded, self-contained image.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
}

impl Frame {
    /// Wrap a decoded image.
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl From<DynamicImage> for Frame {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Still-image decode/encode capability.
pub trait StillImageEngine: Send + Sync {
    /// Decode the first (or only) frame.
    fn decode(&self, data: &[u8]) -> mm_core::Result<Frame>;

    /// Decode every frame, each fully composited over its predecessors.
    /// Single-frame inputs yield one frame.
    fn decode_frames(&self, data: &[u8]) -> mm_core::Result<Vec<Frame>>;

    /// Encode a frame into the given format token.
    ///
    /// Returns [`mm_core::Error::UnsupportedTargetFormat`] when the format
    /// cannot be written.
    fn encode(&self, frame: &Frame, format: &str) -> mm_core::Result<Vec<u8>>;
}
