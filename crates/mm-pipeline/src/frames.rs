//! Frame extraction for animated-image inputs.
//!
//! The animated image is decoded into coalesced frames, which are encoded
//! to PNG and written into the transcoder's working filesystem in fixed-size
//! batches. Frames within a batch run concurrently and batches run one after
//! another. Each batch ends with a cancellation checkpoint; its progress is
//! reported only once that checkpoint passes, so a batch cut short by a
//! cancel reports nothing.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use mm_av::{Frame, StillImageEngine, TranscodeEngine};

use crate::cancel::RunningJob;
use crate::invocation::frame_name;
use crate::progress::ProgressReporter;
use crate::resources::ResourceTracker;

const FRAME_FORMAT: &str = "png";

/// Drives one extraction. Borrowed state belongs to the calling job.
pub struct FrameExtractor<'a> {
    pub still: Arc<dyn StillImageEngine>,
    pub engine: &'a dyn TranscodeEngine,
    pub resources: &'a ResourceTracker,
    pub job: &'a RunningJob,
    pub batch_size: usize,
}

impl FrameExtractor<'_> {
    /// Decode `data`, register every frame, and report progress from
    /// `start` up to `end` percent.
    ///
    /// Returns the number of registered frames.
    ///
    /// # Errors
    ///
    /// [`mm_core::Error::Cancelled`] if the flag is observed at a batch
    /// boundary; otherwise the first decode, encode or write failure.
    pub async fn run(
        &self,
        data: Bytes,
        progress: &ProgressReporter,
        start: f64,
        end: f64,
    ) -> mm_core::Result<usize> {
        let frames = decode_frames(self.still.clone(), data).await?;
        let total = frames.len();
        let batch_size = self.batch_size.max(1);
        tracing::info!(frames = total, batch_size, "Extracting frames");

        let mut pending = frames.into_iter().enumerate().peekable();
        let mut completed = 0usize;

        while pending.peek().is_some() {
            self.job.checkpoint()?;

            let batch: Vec<(usize, Frame)> = pending.by_ref().take(batch_size).collect();
            let outcomes = join_all(
                batch
                    .into_iter()
                    .map(|(index, frame)| self.register_frame(index, frame)),
            )
            .await;

            let mut first_error = None;
            for outcome in outcomes {
                match outcome {
                    Ok(Some(_)) => completed += 1,
                    Ok(None) => {}
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
            self.job.checkpoint()?;

            let pct = start + (end - start) * completed as f64 / total as f64;
            progress.report(pct, "extract");
            tracing::debug!("Registered {completed}/{total} frames");
        }

        Ok(completed)
    }

    /// Encode one frame and write it under its sequential name.
    ///
    /// Resolves to `None` without registering anything once the job is
    /// cancelled, so the batch barrier still completes.
    async fn register_frame(&self, index: usize, frame: Frame) -> mm_core::Result<Option<String>> {
        if self.job.is_cancelled() {
            return Ok(None);
        }

        let still = self.still.clone();
        let encoded = tokio::task::spawn_blocking(move || still.encode(&frame, FRAME_FORMAT))
            .await
            .map_err(|e| mm_core::Error::Internal(format!("frame encode task failed: {e}")))??;

        if self.job.is_cancelled() {
            return Ok(None);
        }

        let name = frame_name(index);
        self.resources.register(name.clone());
        self.engine.write_file(&name, Bytes::from(encoded)).await?;
        Ok(Some(name))
    }
}

async fn decode_frames(still: Arc<dyn StillImageEngine>, data: Bytes) -> mm_core::Result<Vec<Frame>> {
    tokio::task::spawn_blocking(move || still.decode_frames(&data))
        .await
        .map_err(|e| mm_core::Error::Internal(format!("frame decode task failed: {e}")))?
}
