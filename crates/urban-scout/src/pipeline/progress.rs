use tracing::{info, warn};

use super::state::ScanState;

/// Events emitted by the orchestrator while a scan runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        state: ScanState,
        message: String,
    },
    Completed {
        scan_id: i64,
        detections: usize,
        issues: usize,
    },
    Failed {
        state: ScanState,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes progress as log events with a completion percentage.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { state, message } => {
                info!(percent = state.percent(), state = %state, "{}", message);
            }
            ProgressEvent::Completed {
                scan_id,
                detections,
                issues,
            } => {
                info!(percent = 100, scan_id, detections, issues, "Scan complete");
            }
            ProgressEvent::Failed { state, error } => {
                warn!(state = %state, "Scan failed: {}", error);
            }
        }
    }
}
