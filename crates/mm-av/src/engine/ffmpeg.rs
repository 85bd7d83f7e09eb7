//! Transcoding engine backed by the ffmpeg CLI.
//!
//! Each engine owns one [`WorkingDir`]; ffmpeg runs with that directory as
//! its cwd so argument vectors refer to working files by bare name.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::{EngineFactory, EngineObserver, TranscodeEngine};
use crate::command::ToolCommand;
use crate::tools::ToolRegistry;
use crate::workspace::WorkingDir;

/// Global options placed ahead of every argument vector.
const GLOBAL_ARGS: &[&str] = &["-hide_banner", "-nostdin", "-y", "-progress", "pipe:2", "-nostats"];

static REGEX_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid duration regex")
});

static REGEX_PROGRESS_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+=\S*$").expect("valid progress regex"));

/// What one stderr line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StderrLine {
    /// A completion ratio derived from `-progress` output.
    Progress(f64),
    /// Other `-progress` keys carrying nothing we report.
    ProgressKey,
    /// A diagnostic line for the log sink.
    Log,
}

/// Incremental parser for ffmpeg stderr with `-progress pipe:2`.
///
/// The total duration comes from a `-t` argument when one is present,
/// otherwise from the first `Duration:` banner line.
#[derive(Debug, Default)]
pub(crate) struct ProgressParser {
    duration_us: Option<f64>,
    pinned: bool,
}

impl ProgressParser {
    pub(crate) fn for_args(args: &[String]) -> Self {
        let explicit = args
            .windows(2)
            .find(|w| w[0] == "-t")
            .and_then(|w| w[1].parse::<f64>().ok())
            .filter(|secs| *secs > 0.0);

        match explicit {
            Some(secs) => Self {
                duration_us: Some(secs * 1_000_000.0),
                pinned: true,
            },
            None => Self::default(),
        }
    }

    pub(crate) fn feed(&mut self, line: &str) -> StderrLine {
        let line = line.trim();

        if REGEX_PROGRESS_KEY.is_match(line) {
            if line == "progress=end" {
                return StderrLine::Progress(1.0);
            }
            if let Some(val) = line.strip_prefix("out_time_us=") {
                if let (Ok(us), Some(total)) = (val.parse::<f64>(), self.duration_us) {
                    if total > 0.0 {
                        return StderrLine::Progress((us / total).clamp(0.0, 1.0));
                    }
                }
            }
            return StderrLine::ProgressKey;
        }

        if !self.pinned && self.duration_us.is_none() {
            if let Some(caps) = REGEX_DURATION.captures(line) {
                let h: f64 = caps[1].parse().unwrap_or(0.0);
                let m: f64 = caps[2].parse().unwrap_or(0.0);
                let s: f64 = caps[3].parse().unwrap_or(0.0);
                let total = (h * 3600.0 + m * 60.0 + s) * 1_000_000.0;
                if total > 0.0 {
                    self.duration_us = Some(total);
                }
            }
        }

        StderrLine::Log
    }
}

/// ffmpeg-backed [`TranscodeEngine`].
#[derive(Debug)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    workdir: WorkingDir,
    timeout: Duration,
    terminated: CancellationToken,
}

impl FfmpegEngine {
    /// Create an engine with a fresh working directory.
    pub fn new(ffmpeg: PathBuf, timeout: Duration) -> mm_core::Result<Self> {
        let workdir = WorkingDir::new()?;
        tracing::debug!("ffmpeg engine working dir {}", workdir.root().display());
        Ok(Self {
            ffmpeg,
            workdir,
            timeout,
            terminated: CancellationToken::new(),
        })
    }

    /// The engine's working directory.
    pub fn workdir(&self) -> &WorkingDir {
        &self.workdir
    }

    fn ensure_live(&self) -> mm_core::Result<()> {
        if self.terminated.is_cancelled() {
            return Err(mm_core::Error::engine_unavailable("ffmpeg engine was terminated"));
        }
        Ok(())
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn write_file(&self, name: &str, data: Bytes) -> mm_core::Result<()> {
        self.ensure_live()?;
        let path = self.workdir.path_for(name)?;
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn run(&self, args: &[String], observer: &dyn EngineObserver) -> mm_core::Result<()> {
        self.ensure_live()?;

        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.current_dir(self.workdir.root());
        cmd.timeout(self.timeout);
        cmd.args(GLOBAL_ARGS.iter().copied());
        cmd.args(args.iter().cloned());

        tracing::debug!("ffmpeg {}", args.join(" "));

        let mut parser = ProgressParser::for_args(args);
        let result = cmd
            .execute_with_stderr_callback(
                |line| match parser.feed(line) {
                    StderrLine::Progress(ratio) => observer.on_progress(ratio),
                    StderrLine::ProgressKey => {}
                    StderrLine::Log => observer.on_log(line),
                },
                Some(self.terminated.clone()),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(mm_core::Error::Cancelled) => Err(mm_core::Error::engine_unavailable(
                "ffmpeg engine was terminated during a run",
            )),
            Err(e) => Err(e),
        }
    }

    async fn read_file(&self, name: &str) -> mm_core::Result<Bytes> {
        self.ensure_live()?;
        let path = self.workdir.path_for(name)?;
        Ok(Bytes::from(tokio::fs::read(&path).await?))
    }

    async fn delete_file(&self, name: &str) -> mm_core::Result<()> {
        let path = self.workdir.path_for(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    fn terminate(&self) {
        self.terminated.cancel();
    }

    fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }
}

/// Builds [`FfmpegEngine`]s from a discovered ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngineFactory {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl FfmpegEngineFactory {
    pub fn new(ffmpeg: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg, timeout }
    }

    /// Use the ffmpeg found by the registry.
    pub fn from_registry(tools: &ToolRegistry, timeout: Duration) -> mm_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        Ok(Self::new(ffmpeg.to_path_buf(), timeout))
    }
}

impl EngineFactory for FfmpegEngineFactory {
    fn create(&self) -> mm_core::Result<Arc<dyn TranscodeEngine>> {
        Ok(Arc::new(FfmpegEngine::new(self.ffmpeg.clone(), self.timeout)?))
    }
}
