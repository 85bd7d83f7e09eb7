//! Intermediate resource tracking and best-effort cleanup.

use mm_av::TranscodeEngine;
use parking_lot::Mutex;

/// Names a job has placed in the transcoder's working filesystem.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    names: Mutex<Vec<String>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name`. Registering the same name twice keeps one entry.
    pub fn register(&self, name: impl Into<String>) {
        let name = name.into();
        let mut names = self.names.lock();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}

/// What a [`cleanup`] call managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Names that were deleted.
    pub deleted: Vec<String>,
    /// Names whose deletion failed (missing, engine gone, ...).
    pub skipped: Vec<String>,
}

/// Delete every name from the engine's working filesystem.
///
/// Never fails: a missing file, a torn-down engine or an absent engine is
/// logged as a warning and the remaining names are still attempted.
pub async fn cleanup(engine: Option<&dyn TranscodeEngine>, names: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();

    let Some(engine) = engine else {
        if !names.is_empty() {
            tracing::warn!("No engine to clean up {} intermediate file(s)", names.len());
        }
        report.skipped = names.to_vec();
        return report;
    };

    for name in names {
        match engine.delete_file(name).await {
            Ok(()) => report.deleted.push(name.clone()),
            Err(e) => {
                tracing::warn!("Failed to remove intermediate {name}: {e}");
                report.skipped.push(name.clone());
            }
        }
    }

    tracing::debug!(
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        "cleanup finished"
    );
    report
}
