use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediamorph")]
#[command(author, version, about = "Convert images, video and audio between formats")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a file to another format
    Convert {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Target format token (mp4, webm, gif, png, mp3, ...)
        #[arg(short, long = "to")]
        target: String,

        /// Output path (defaults to the input stem with the target extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Declared MIME type (inferred from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,

        /// Run against the in-memory engine and print the invocations
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a file would be converted without running ffmpeg
    Plan {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Target format token
        #[arg(short, long = "to")]
        target: String,

        /// Declared MIME type (inferred from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported target formats and their encoders
    Formats,

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
