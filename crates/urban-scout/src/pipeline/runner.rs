use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::annotate::Annotator;
use crate::config::ScoutConfig;
use crate::detection::{DetectorFusion, GroundingClient, GroundingParams, HuggingFaceDetector};
use crate::error::Result;
use crate::imagery::{ImageSource, StreetViewFetcher};
use crate::models::{validate_coordinates, NewScan};
use crate::persistence::Persistence;
use crate::report::{ChatCompletionClient, ReportGenerator};
use crate::sanitize;

use super::context::ScanContext;
use super::error::{ScanError, ScanWarning};
use super::progress::{LogProgress, ProgressEvent, ProgressReporter};
use super::state::ScanState;

pub const SCRATCH_IMAGE: &str = "latest_scan.jpg";
pub const SCRATCH_ANNOTATED: &str = "latest_scan_annotated.jpg";

/// Orchestration knobs taken from [`crate::config::ScanConfig`] and the
/// detection section.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub scratch_dir: PathBuf,
    pub confidence_threshold: f32,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ScanSettings {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            scratch_dir: config.scan.scratch_dir.clone(),
            confidence_threshold: config.detection.confidence_threshold,
            max_retries: config.scan.max_retries,
            retry_delay: Duration::from_secs(config.scan.retry_delay_secs),
        }
    }

    pub fn image_path(&self) -> PathBuf {
        self.scratch_dir.join(SCRATCH_IMAGE)
    }

    pub fn annotated_path(&self) -> PathBuf {
        self.scratch_dir.join(SCRATCH_ANNOTATED)
    }
}

/// Outcome counts of [`ScanOrchestrator::scan_multiple`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

pub struct ScanOrchestrator {
    imagery: Arc<dyn ImageSource>,
    detector: DetectorFusion,
    reports: ReportGenerator,
    annotator: Annotator,
    persistence: Persistence,
    settings: ScanSettings,
}

impl ScanOrchestrator {
    /// Production constructor: builds every collaborator from config and
    /// resolves the API secrets.
    pub fn from_config(config: &ScoutConfig) -> Result<Self> {
        let imagery_key = config.imagery.api_key.resolve()?;
        let imagery = StreetViewFetcher::from_config(&config.imagery, imagery_key)?;

        let detector_config = &config.detection.object_detector;
        let primary = HuggingFaceDetector::new(
            detector_config.endpoint.clone(),
            detector_config.token.resolve_optional()?,
            Duration::from_secs(detector_config.timeout_secs),
        )?;
        let mut detector = DetectorFusion::new(Box::new(primary));
        if let Some(grounding) = &config.detection.grounding {
            let client = GroundingClient::new(
                grounding.endpoint.clone(),
                grounding.token.resolve_optional()?,
                Duration::from_secs(grounding.timeout_secs),
            )?;
            detector = detector.with_grounding(Box::new(client), GroundingParams::from(grounding));
        }

        let llm = ChatCompletionClient::new(&config.llm, config.llm.api_key.resolve()?)?;
        info!(
            model = llm.model(),
            grounding = detector.has_grounding(),
            "Scan orchestrator configured"
        );

        Ok(Self::new(
            Arc::new(imagery),
            detector,
            ReportGenerator::new(Arc::new(llm)),
            Annotator::new(&config.annotation),
            Persistence::open(&config.storage)?,
            ScanSettings::from_config(config),
        ))
    }

    /// Injection constructor.
    pub fn new(
        imagery: Arc<dyn ImageSource>,
        detector: DetectorFusion,
        reports: ReportGenerator,
        annotator: Annotator,
        persistence: Persistence,
        settings: ScanSettings,
    ) -> Self {
        Self {
            imagery,
            detector,
            reports,
            annotator,
            persistence,
            settings,
        }
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// One attempt at `(latitude, longitude)`.
    pub fn scan(&self, latitude: f64, longitude: f64) -> bool {
        let (ok, _ctx) = self.run(ScanContext::new(latitude, longitude), &LogProgress);
        ok
    }

    /// Up to `1 + max_retries` independent attempts with a fixed pause in
    /// between. Invalid coordinates stop immediately.
    pub fn scan_with_retry(&self, latitude: f64, longitude: f64, max_retries: u32) -> bool {
        let attempts = max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let ctx = ScanContext::new(latitude, longitude).with_attempt(attempt);
            let (ok, ctx) = self.run(ctx, &LogProgress);
            if ok {
                return true;
            }

            if let Some(e) = &ctx.error {
                if !e.is_retryable() {
                    warn!(latitude, longitude, "Not retrying: {}", e);
                    return false;
                }
            }
            if attempt < attempts {
                info!(
                    attempt,
                    attempts,
                    delay_secs = self.settings.retry_delay.as_secs_f64(),
                    "Retrying scan"
                );
                std::thread::sleep(self.settings.retry_delay);
            }
        }
        warn!(latitude, longitude, attempts, "All scan attempts failed");
        false
    }

    /// Scans each location in order, retrying per the configured limit.
    pub fn scan_multiple(&self, locations: &[(f64, f64)]) -> BatchSummary {
        let mut summary = BatchSummary {
            total: locations.len(),
            ..BatchSummary::default()
        };
        for (index, &(latitude, longitude)) in locations.iter().enumerate() {
            info!(index = index + 1, total = summary.total, latitude, longitude, "Batch scan");
            if self.scan_with_retry(latitude, longitude, self.settings.max_retries) {
                summary.successful += 1;
            } else {
                summary.failed += 1;
            }
        }
        info!(
            successful = summary.successful,
            failed = summary.failed,
            total = summary.total,
            "Batch complete"
        );
        summary
    }

    /// Re-runs report generation on a stored scan's detections and saves it.
    pub fn regenerate_report(&self, id: i64) -> bool {
        let _span = info_span!("regenerate_report", id).entered();
        let Some(scan) = self.persistence.get_by_id(id) else {
            warn!(id, "Scan not found");
            return false;
        };
        let report = self.reports.generate(&scan.detection_results);
        self.persistence.update(id, &report)
    }

    /// Runs the state machine for one attempt. Cleanup always runs before the
    /// terminal state is entered.
    pub fn run(
        &self,
        mut ctx: ScanContext,
        progress: &dyn ProgressReporter,
    ) -> (bool, ScanContext) {
        let _scan_span = info_span!("scan",
            latitude = ctx.latitude,
            longitude = ctx.longitude,
            attempt = ctx.attempt,
        )
        .entered();

        let outcome = self.execute(&mut ctx, progress);
        let failed_at = ctx.state;

        {
            let _step = info_span!("cleaning_up").entered();
            enter(&mut ctx, progress, ScanState::CleaningUp);
            self.step_cleanup(&mut ctx);
        }

        match outcome {
            Ok(()) => {
                ctx.transition(ScanState::Done);
                if let Some(scan) = &ctx.scan {
                    progress.report(ProgressEvent::Completed {
                        scan_id: scan.id,
                        detections: ctx.detections.len(),
                        issues: scan.llm_report_structured.issues.len(),
                    });
                }
                (true, ctx)
            }
            Err(e) => {
                ctx.transition(ScanState::Failed);
                progress.report(ProgressEvent::Failed {
                    state: failed_at,
                    error: e.to_string(),
                });
                ctx.error = Some(e);
                (false, ctx)
            }
        }
    }

    fn execute(
        &self,
        ctx: &mut ScanContext,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<(), ScanError> {
        {
            let _step = info_span!("validating").entered();
            progress.report(ProgressEvent::Phase {
                state: ScanState::Validating,
                message: ScanState::Validating.message().to_string(),
            });
            validate_coordinates(ctx.latitude, ctx.longitude)?;
        }

        let image_path = {
            let _step = info_span!("fetching_image").entered();
            enter(ctx, progress, ScanState::FetchingImage);
            let dest = self.settings.image_path();
            // Registered before the fetch so a partial file is cleaned up.
            ctx.image_path = Some(dest.clone());
            let path = self.imagery.fetch(ctx.latitude, ctx.longitude, &dest)?;
            ctx.image_path = Some(path.clone());
            path
        };

        let image_url = {
            let _step = info_span!("uploading_original").entered();
            enter(ctx, progress, ScanState::UploadingOriginal);
            let url = self
                .persistence
                .upload(&image_path)
                .ok_or(ScanError::OriginalUpload)?;
            ctx.image_url = Some(url.clone());
            url
        };

        {
            let _step = info_span!("detecting").entered();
            enter(ctx, progress, ScanState::Detecting);
            ctx.detections = self
                .detector
                .detect(&image_path, self.settings.confidence_threshold);
        }

        let annotated = {
            let _step = info_span!("annotating").entered();
            enter(ctx, progress, ScanState::Annotating);
            let output = self.settings.annotated_path();
            ctx.annotated_path = Some(output.clone());
            if self.annotator.annotate(&image_path, &ctx.detections, &output) {
                Some(output)
            } else {
                ctx.warnings.push(ScanWarning::AnnotationFailed);
                None
            }
        };

        let annotated_url = match annotated {
            Some(path) => {
                let _step = info_span!("uploading_annotated").entered();
                enter(ctx, progress, ScanState::UploadingAnnotated);
                self.persistence.upload(&path).unwrap_or_else(|| {
                    warn!("Annotated upload failed, using original image URL");
                    ctx.warnings.push(ScanWarning::AnnotatedUploadFailed);
                    image_url.clone()
                })
            }
            None => {
                debug!("Annotation skipped, using original image URL");
                image_url.clone()
            }
        };
        ctx.annotated_image_url = Some(annotated_url.clone());

        let report = {
            let _step = info_span!("generating_report").entered();
            enter(ctx, progress, ScanState::GeneratingReport);
            let report = self.reports.generate(&ctx.detections);
            ctx.report = Some(report.clone());
            report
        };

        {
            let _step = info_span!("persisting").entered();
            enter(ctx, progress, ScanState::Persisting);
            let scan = self
                .persistence
                .insert(NewScan {
                    latitude: ctx.latitude,
                    longitude: ctx.longitude,
                    image_url: Some(image_url),
                    annotated_image_url: Some(annotated_url),
                    detection_results: ctx.detections.clone(),
                    llm_report: report.to_json(),
                    llm_report_structured: report,
                })
                .ok_or(ScanError::Persist)?;
            info!(id = scan.id, "Scan persisted");
            ctx.scan = Some(scan);
        }

        Ok(())
    }

    fn step_cleanup(&self, ctx: &mut ScanContext) {
        let files: Vec<PathBuf> = [ctx.image_path.take(), ctx.annotated_path.take()]
            .into_iter()
            .flatten()
            .collect();
        for file in files {
            if let Err(e) = remove_scratch(&file) {
                warn!(file = %sanitize::redact_path(&file), "Cleanup failed: {}", e);
                ctx.warnings.push(ScanWarning::CleanupFailed {
                    file,
                    error: e.to_string(),
                });
            }
        }
    }
}

fn enter(ctx: &mut ScanContext, progress: &dyn ProgressReporter, state: ScanState) {
    ctx.transition(state);
    progress.report(ProgressEvent::Phase {
        state,
        message: state.message().to_string(),
    });
}

fn remove_scratch(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
