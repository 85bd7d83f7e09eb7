//! Progress and log sinks for a conversion job.

use std::sync::Arc;

use mm_av::EngineObserver;
use parking_lot::Mutex;

/// Sender for reporting job progress.
///
/// Wraps a callback that receives a progress percentage (0.0 -- 100.0) and a
/// short step description.
pub struct ProgressSender {
    callback: Box<dyn Fn(f32, &str) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(f32, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_, _| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, progress: f32, step: &str) {
        (self.callback)(progress, step);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Sender for human-readable diagnostic lines. Never used for control flow.
pub struct LogSender {
    callback: Box<dyn Fn(&str) + Send + Sync>,
}

impl LogSender {
    pub fn new(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    pub fn send(&self, line: &str) {
        (self.callback)(line);
    }
}

impl std::fmt::Debug for LogSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSender").finish_non_exhaustive()
    }
}

/// Forwards progress to a [`ProgressSender`], never letting it go backwards.
///
/// Values are clamped to `0..=100`; anything not above the last forwarded
/// value is dropped.
#[derive(Debug)]
pub struct ProgressReporter {
    sender: Arc<ProgressSender>,
    last: Mutex<Option<f32>>,
}

impl ProgressReporter {
    pub fn new(sender: Arc<ProgressSender>) -> Self {
        Self {
            sender,
            last: Mutex::new(None),
        }
    }

    /// Report `percent`, if it moves progress forward.
    pub fn report(&self, percent: f64, step: &str) {
        let percent = percent.clamp(0.0, 100.0) as f32;
        {
            let mut last = self.last.lock();
            if matches!(*last, Some(prev) if percent <= prev) {
                return;
            }
            *last = Some(percent);
        }
        self.sender.send(percent, step);
    }

    /// Report completion.
    pub fn finish(&self) {
        self.report(100.0, "done");
    }

    /// The highest value forwarded so far.
    pub fn last(&self) -> Option<f32> {
        *self.last.lock()
    }
}

/// Engine observer mapping one pass's `0.0..=1.0` ratio onto a slice of the
/// job's progress range and forwarding engine log lines.
pub(crate) struct PassObserver<'a> {
    pub(crate) progress: &'a ProgressReporter,
    pub(crate) log: &'a LogSender,
    pub(crate) step: &'a str,
    pub(crate) start: f64,
    pub(crate) end: f64,
}

impl EngineObserver for PassObserver<'_> {
    fn on_log(&self, line: &str) {
        tracing::debug!(target: "mediamorph::engine", "{line}");
        self.log.send(line);
    }

    fn on_progress(&self, ratio: f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        self.progress
            .report(self.start + ratio * (self.end - self.start), self.step);
    }
}
