//! # mm-av
//!
//! External tool management and the two codec engines the orchestrator
//! drives.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg path.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   working directory, stderr streaming and cancellation.
//! - **Working directory** ([`WorkingDir`]) -- the flat, name-addressed
//!   scratch namespace a transcoding engine reads and writes.
//! - **Engines** ([`engine`]) -- the [`TranscodeEngine`] and
//!   [`StillImageEngine`] capability traits, an ffmpeg-backed transcoder, an
//!   `image`-crate still engine, and an in-memory transcoder for dry runs.

pub mod command;
pub mod engine;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{
    EngineFactory, EngineObserver, FfmpegEngine, FfmpegEngineFactory, Frame, ImageEngine,
    MemoryEngine, MemoryEngineFactory, NoopObserver, RunHook, StillImageEngine, TranscodeEngine,
};
pub use tools::{ToolInfo, ToolRegistry};
pub use workspace::WorkingDir;
