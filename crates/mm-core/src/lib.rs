//! mm-core: shared types, errors, configuration, and media-domain tables.
//!
//! This crate is the foundational dependency for the other mm-* crates. It
//! knows nothing about processes or engines; it answers questions such as
//! "what kind of media is `webm`?" and "which audio encoder does `ogg` use?".

pub mod config;
pub mod error;
pub mod ids;
pub mod media;

pub use error::{Error, Result};
pub use ids::JobId;
pub use media::*;
