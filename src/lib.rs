//! mediamorph: convert images, video and audio between formats.
//!
//! The heavy lifting lives in the workspace crates:
//!
//! - [`mm_core`] -- errors, media tables, configuration types.
//! - [`mm_av`] -- ffmpeg discovery and the codec engines.
//! - [`mm_pipeline`] -- the conversion orchestrator.
//!
//! This crate adds config file discovery and the CLI binary.

pub mod config;

pub use mm_av;
pub use mm_core;
pub use mm_pipeline;
