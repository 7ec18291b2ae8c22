use std::path::PathBuf;

use tracing::debug;

use crate::models::{Detection, Report, Scan};

use super::error::{ScanError, ScanWarning};
use super::state::ScanState;

pub struct ScanContext {
    // Input
    pub latitude: f64,
    pub longitude: f64,
    pub attempt: u32,

    pub state: ScanState,
    pub history: Vec<ScanState>,

    // FetchingImage / Annotating outputs (scratch files)
    pub image_path: Option<PathBuf>,
    pub annotated_path: Option<PathBuf>,

    // Upload results. annotated_image_url falls back to image_url.
    pub image_url: Option<String>,
    pub annotated_image_url: Option<String>,

    pub detections: Vec<Detection>,
    pub report: Option<Report>,

    // Persisting result
    pub scan: Option<Scan>,

    pub error: Option<ScanError>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanContext {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            attempt: 1,
            state: ScanState::Validating,
            history: vec![ScanState::Validating],
            image_path: None,
            annotated_path: None,
            image_url: None,
            annotated_image_url: None,
            detections: Vec::new(),
            report: None,
            scan: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn transition(&mut self, next: ScanState) {
        debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
        self.history.push(next);
    }

    pub fn visited(&self, state: ScanState) -> bool {
        self.history.contains(&state)
    }

    pub fn succeeded(&self) -> bool {
        self.state == ScanState::Done
    }
}
