//! The job driver: one `convert` call from input bytes to output bytes.

use std::sync::Arc;

use bytes::Bytes;
use mm_av::{EngineFactory, StillImageEngine, TranscodeEngine};
use mm_core::config::Config;
use mm_core::{JobId, Scenario};
use tracing::Instrument;

use crate::cancel::{CancellationSignal, EngineSlot, RunningJob};
use crate::classifier::{classify, Classification, EngineRoute};
use crate::frames::FrameExtractor;
use crate::invocation::{self, EnginePass};
use crate::progress::{LogSender, PassObserver, ProgressReporter, ProgressSender};
use crate::resources::{cleanup, ResourceTracker};

/// A user-supplied input file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Declared file name; only its extension is used.
    pub name: String,
    /// Declared MIME type. May be empty.
    pub mime: String,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }
}

/// The result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub data: Bytes,
    /// `<kind>/<format>`, e.g. `video/mp4`.
    pub mime: String,
    pub scenario: Scenario,
    pub route: EngineRoute,
}

/// Conversion orchestrator.
///
/// Jobs against one `Converter` must be serialized by the caller: the
/// transcoder's working filesystem is a single namespace.
pub struct Converter {
    config: Arc<Config>,
    slot: Arc<EngineSlot>,
    still: Arc<dyn StillImageEngine>,
    signal: CancellationSignal,
}

impl Converter {
    pub fn new(
        config: Config,
        factory: Arc<dyn EngineFactory>,
        still: Arc<dyn StillImageEngine>,
    ) -> Self {
        let slot = Arc::new(EngineSlot::new(factory));
        let signal = CancellationSignal::new(slot.clone());
        Self {
            config: Arc::new(config),
            slot,
            still,
            signal,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine_slot(&self) -> &Arc<EngineSlot> {
        &self.slot
    }

    /// A handle that can cancel jobs from another task.
    pub fn canceller(&self) -> CancellationSignal {
        self.signal.clone()
    }

    /// Cancel the running job, if any, and tear down the transcoder.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    /// Convert `file` to `target`.
    ///
    /// # Errors
    ///
    /// - [`mm_core::Error::FileTooLarge`] before anything else happens.
    /// - [`mm_core::Error::UnsupportedScenario`] from classification.
    /// - [`mm_core::Error::UnsupportedTargetFormat`] from the still-image path.
    /// - [`mm_core::Error::EngineUnavailable`] /
    ///   [`mm_core::Error::EngineExecutionFailed`] from the engines.
    /// - [`mm_core::Error::Cancelled`] whenever the flag is set on exit,
    ///   superseding any engine error.
    pub async fn convert(
        &self,
        file: SourceFile,
        target: &str,
        progress: ProgressSender,
        log: LogSender,
    ) -> mm_core::Result<ConvertedFile> {
        let size = file.data.len() as u64;
        let limit = self.config.limits.max_input_bytes;
        if size > limit {
            tracing::warn!(size, limit, "Rejecting oversized input {}", file.name);
            return Err(mm_core::Error::FileTooLarge { size, limit });
        }

        let job = self.signal.begin();
        let id = JobId::new();
        let classification = classify(&file.mime, &file.name, target, &self.config.routing)?;

        let span = tracing::info_span!(
            "job",
            job_id = %id,
            scenario = %classification.scenario,
            target = %classification.target,
        );

        async move {
            tracing::info!(
                route = %classification.route,
                input = %classification.input_mime,
                bytes = size,
                "Starting conversion"
            );
            log.send(&format!(
                "{} -> {} ({} via {})",
                classification.input_mime,
                classification.target,
                classification.scenario,
                classification.route
            ));

            let reporter = ProgressReporter::new(Arc::new(progress));
            let result = match classification.route {
                EngineRoute::StillImage => self.run_still(&job, &classification, file.data).await,
                EngineRoute::Transcoder => {
                    self.run_transcoder(&job, &classification, &file, &reporter, &log)
                        .await
                }
            };

            // Cancellation supersedes whatever the engines reported.
            let result = match result {
                _ if job.is_cancelled() => Err(mm_core::Error::Cancelled),
                other => other,
            };

            match result {
                Ok(data) => {
                    reporter.finish();
                    let mime = mm_core::output_mime(&classification.target).unwrap_or_else(|| {
                        format!(
                            "{}/{}",
                            classification.target_kind.mime_prefix(),
                            classification.target
                        )
                    });
                    tracing::info!(bytes = data.len(), %mime, "Conversion finished");
                    Ok(ConvertedFile {
                        data,
                        mime,
                        scenario: classification.scenario,
                        route: classification.route,
                    })
                }
                Err(e) => {
                    if e.is_cancelled() {
                        tracing::info!("Conversion cancelled");
                    } else {
                        tracing::error!("Conversion failed: {e}");
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Still-image fast path. Never touches the transcoder.
    async fn run_still(
        &self,
        job: &RunningJob,
        classification: &Classification,
        data: Bytes,
    ) -> mm_core::Result<Bytes> {
        job.checkpoint()?;

        let still = self.still.clone();
        let target = classification.target.clone();
        let scenario = classification.scenario;
        let encoded = tokio::task::spawn_blocking(move || {
            let frame = still.decode(&data)?;
            still.encode(&frame, &target)
        })
        .await
        .map_err(|e| mm_core::Error::Internal(format!("still-image task failed: {e}")))?
        .map_err(|e| match e {
            mm_core::Error::Tool { tool, message } => {
                mm_core::Error::engine_failed(tool, scenario, &[], message)
            }
            other => other,
        })?;

        job.checkpoint()?;
        Ok(Bytes::from(encoded))
    }

    /// General path: acquire the transcoder, run every pass, then clean up.
    async fn run_transcoder(
        &self,
        job: &RunningJob,
        classification: &Classification,
        file: &SourceFile,
        reporter: &ProgressReporter,
        log: &LogSender,
    ) -> mm_core::Result<Bytes> {
        job.checkpoint()?;
        let engine = self.slot.acquire().map_err(|e| match e {
            mm_core::Error::EngineUnavailable(_) => e,
            other => mm_core::Error::engine_unavailable(other.to_string()),
        })?;
        let resources = ResourceTracker::new();

        let result = self
            .drive_engine(job, engine.as_ref(), &resources, classification, file, reporter, log)
            .await;

        cleanup(Some(engine.as_ref()), &resources.names()).await;
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_engine(
        &self,
        job: &RunningJob,
        engine: &dyn TranscodeEngine,
        resources: &ResourceTracker,
        classification: &Classification,
        file: &SourceFile,
        reporter: &ProgressReporter,
        log: &LogSender,
    ) -> mm_core::Result<Bytes> {
        let conversion = &self.config.conversion;
        let scenario = classification.scenario;
        let input = invocation::input_name(&file.name, &classification.input_mime);
        let output = invocation::output_name(&classification.target);

        if scenario == Scenario::AnimatedImageToVideo {
            let share = invocation::extraction_share(conversion);
            let extractor = FrameExtractor {
                still: self.still.clone(),
                engine,
                resources,
                job,
                batch_size: conversion.batch_size(),
            };
            let frames = extractor
                .run(file.data.clone(), reporter, 0.0, share)
                .await
                .map_err(|e| engine_error(engine.name(), scenario, &[], e))?;
            log.send(&format!("extracted {frames} frames"));
        } else {
            resources.register(input.clone());
            engine
                .write_file(&input, file.data.clone())
                .await
                .map_err(|e| engine_error(engine.name(), scenario, &[], e))?;
        }

        let passes = invocation::passes(scenario, &input, &output, &classification.target, conversion);
        for pass in &passes {
            self.run_pass(job, engine, resources, scenario, pass, reporter, log)
                .await?;
        }

        job.checkpoint()?;
        let last_args = passes.last().map(|p| p.args.as_slice()).unwrap_or_default();
        engine
            .read_file(&output)
            .await
            .map_err(|e| engine_error(engine.name(), scenario, last_args, e))
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pass(
        &self,
        job: &RunningJob,
        engine: &dyn TranscodeEngine,
        resources: &ResourceTracker,
        scenario: Scenario,
        pass: &EnginePass,
        reporter: &ProgressReporter,
        log: &LogSender,
    ) -> mm_core::Result<()> {
        job.checkpoint()?;
        resources.register(pass.produces.clone());
        tracing::info!(pass = pass.label, "Running {}", engine.name());

        let observer = PassObserver {
            progress: reporter,
            log,
            step: pass.label,
            start: pass.start,
            end: pass.end,
        };
        engine
            .run(&pass.args, &observer)
            .await
            .map_err(|e| match e {
                mm_core::Error::Tool { message, .. } => {
                    mm_core::Error::engine_failed(engine.name(), scenario, &pass.args, message)
                }
                other => other,
            })?;

        job.checkpoint()?;
        reporter.report(pass.end, pass.label);
        Ok(())
    }
}

/// Lift working-filesystem failures into [`mm_core::Error::EngineExecutionFailed`].
///
/// Cancellation and an unavailable engine pass through unchanged.
fn engine_error(
    engine: &str,
    scenario: Scenario,
    args: &[String],
    err: mm_core::Error,
) -> mm_core::Error {
    match err {
        mm_core::Error::Io { source } => {
            mm_core::Error::engine_failed(engine, scenario, args, source.to_string())
        }
        mm_core::Error::Tool { tool, message } => {
            mm_core::Error::engine_failed(tool, scenario, args, message)
        }
        other => other,
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("slot", &self.slot)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}
