//! # mm-pipeline
//!
//! The conversion orchestrator.
//!
//! This crate provides:
//!
//! - **[`classify`]** -- maps an input MIME type and a target format onto a
//!   [`Scenario`](mm_core::Scenario) and picks the engine route.
//! - **[`invocation`]** -- transcoder argument vectors and working-file
//!   names per scenario.
//! - **[`FrameExtractor`]** -- batched frame registration for
//!   animated-image-to-video jobs.
//! - **[`ResourceTracker`] / [`cleanup`]** -- intermediate file bookkeeping
//!   and best-effort deletion.
//! - **[`CancellationSignal`] / [`EngineSlot`]** -- per-job cancellation and
//!   ownership of the shared transcoder.
//! - **[`Converter`]** -- the job driver tying it all together.

pub mod cancel;
pub mod classifier;
pub mod converter;
pub mod frames;
pub mod invocation;
pub mod progress;
pub mod resources;

// Re-export key types at the crate root.
pub use cancel::{CancellationSignal, EngineSlot, RunningJob, SignalState, SlotState};
pub use classifier::{classify, Classification, EngineRoute};
pub use converter::{ConvertedFile, Converter, SourceFile};
pub use frames::FrameExtractor;
pub use invocation::EnginePass;
pub use progress::{LogSender, ProgressReporter, ProgressSender};
pub use resources::{cleanup, CleanupReport, ResourceTracker};
