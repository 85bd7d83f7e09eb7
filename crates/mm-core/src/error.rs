//! Unified error type for mediamorph.
//!
//! Every crate funnels its failures into [`Error`]. The conversion outcome
//! taxonomy (`FileTooLarge` through `Cancelled`) is part of the public
//! contract; the remaining variants cover ambient failures (I/O, external
//! tools, configuration).

use crate::media::Scenario;

/// Unified error type covering all failure modes in mediamorph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input exceeds the configured size limit. Raised before any engine
    /// interaction.
    #[error("file too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge {
        /// Size of the rejected input in bytes.
        size: u64,
        /// The configured limit in bytes.
        limit: u64,
    },

    /// No scenario exists for the input/output kind pairing.
    #[error("unsupported conversion: {input} -> {target}")]
    UnsupportedScenario {
        /// Declared input MIME type (or file name when the MIME was unusable).
        input: String,
        /// Requested target format token.
        target: String,
    },

    /// The still-image engine cannot write the requested format.
    #[error("unsupported target format: {0}")]
    UnsupportedTargetFormat(String),

    /// The transcoding engine handle is absent or has been torn down.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// An engine ran but reported a failure.
    #[error("{engine} failed during {scenario}: {message}")]
    EngineExecutionFailed {
        /// Which engine failed ("ffmpeg", "still-image", ...).
        engine: String,
        /// The scenario being executed.
        scenario: Scenario,
        /// The argument vector handed to the engine (empty for the still-image engine).
        args: Vec<String>,
        /// The engine's own failure description.
        message: String,
    },

    /// The job observed the cancellation flag.
    #[error("conversion cancelled")]
    Cancelled,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg) could not be spawned or exited abnormally.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Configuration or request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::FileTooLarge { .. } => 3,
            Error::UnsupportedScenario { .. } | Error::UnsupportedTargetFormat(_) => 4,
            Error::EngineUnavailable(_) => 5,
            Error::EngineExecutionFailed { .. } | Error::Tool { .. } => 6,
            Error::Cancelled => 130,
            Error::Validation(_) => 2,
            Error::Io { .. } | Error::Internal(_) => 1,
        }
    }

    /// Whether this error is the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Convenience constructor for [`Error::UnsupportedScenario`].
    pub fn unsupported(input: impl Into<String>, target: impl Into<String>) -> Self {
        Error::UnsupportedScenario {
            input: input.into(),
            target: target.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EngineUnavailable`].
    pub fn engine_unavailable(reason: impl Into<String>) -> Self {
        Error::EngineUnavailable(reason.into())
    }

    /// Convenience constructor for [`Error::EngineExecutionFailed`].
    pub fn engine_failed(
        engine: impl Into<String>,
        scenario: Scenario,
        args: &[String],
        message: impl Into<String>,
    ) -> Self {
        Error::EngineExecutionFailed {
            engine: engine.into(),
            scenario,
            args: args.to_vec(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
