use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{Detection, Report};

use super::extract::extract_report;
use super::llm::LanguageModel;
use super::prompt::build_prompt;

pub const NO_DETECTIONS_SUMMARY: &str =
    "No objects detected in the image. Unable to assess infrastructure condition.";

pub const MODEL_UNAVAILABLE_SUMMARY: &str =
    "AI analysis is unavailable for this scan. Please review the detection data manually.";

/// Turns detections into a structured report. Never fails: every error path
/// yields a valid, possibly degraded, report.
pub struct ReportGenerator {
    model: Arc<dyn LanguageModel>,
}

impl ReportGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub fn generate(&self, detections: &[Detection]) -> Report {
        if detections.is_empty() {
            debug!("No detections, skipping model call");
            return Report::new(NO_DETECTIONS_SUMMARY, Vec::new());
        }

        let prompt = build_prompt(detections);
        let text = match self.model.complete(&prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Report generation failed");
                return Report::new(MODEL_UNAVAILABLE_SUMMARY, Vec::new());
            }
        };

        let (report, stage) = extract_report(&text);
        info!(stage, issues = report.issues.len(), "Report extracted");
        reconcile_summary(report)
    }
}

/// A report with issues must not claim there are none. Any summary containing
/// "no" (case-insensitive, anywhere: "No", "none", "nothing") is replaced by
/// one stating the issue count.
pub fn reconcile_summary(mut report: Report) -> Report {
    if !report.issues.is_empty() && contains_no(&report.summary) {
        debug!(original = %report.summary, "Summary contradicts issues, replacing");
        report.summary = format!(
            "Identified {} potential infrastructure issue(s) requiring attention.",
            report.issues.len()
        );
    }
    report
}

fn contains_no(summary: &str) -> bool {
    summary.to_lowercase().contains("no")
}
