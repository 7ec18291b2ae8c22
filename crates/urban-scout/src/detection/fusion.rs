use std::path::Path;

use tracing::{debug, info, info_span, warn};

use crate::models::{BoundingBox, Detection};
use crate::sanitize;

use super::{GroundingParams, ObjectDetector, PhraseGroundingDetector};

/// Two detections above this IoU with matching labels are the same object.
pub const DUPLICATE_IOU_THRESHOLD: f64 = 0.5;

/// Runs both detectors over one image and merges the results.
pub struct DetectorFusion {
    primary: Box<dyn ObjectDetector>,
    grounding: Option<(Box<dyn PhraseGroundingDetector>, GroundingParams)>,
}

impl DetectorFusion {
    pub fn new(primary: Box<dyn ObjectDetector>) -> Self {
        Self {
            primary,
            grounding: None,
        }
    }

    pub fn with_grounding(
        mut self,
        detector: Box<dyn PhraseGroundingDetector>,
        params: GroundingParams,
    ) -> Self {
        self.grounding = Some((detector, params));
        self
    }

    pub fn has_grounding(&self) -> bool {
        self.grounding.is_some()
    }

    /// Detects objects in `image`. Never fails: a detector error is logged and
    /// that detector contributes nothing.
    pub fn detect(&self, image: &Path, confidence_threshold: f32) -> Vec<Detection> {
        let _span = info_span!("detection.fuse", file = %sanitize::redact_path(image)).entered();

        let mut candidates: Vec<Detection> = match self.primary.detect(image) {
            Ok(detections) => {
                let total = detections.len();
                let kept: Vec<Detection> = detections
                    .into_iter()
                    .filter(|d| d.score >= confidence_threshold)
                    .collect();
                debug!(
                    detector = self.primary.name(),
                    total,
                    kept = kept.len(),
                    "Primary detector finished"
                );
                kept
            }
            Err(e) => {
                warn!(detector = self.primary.name(), "Detector failed: {}", e);
                Vec::new()
            }
        };

        if let Some((detector, params)) = &self.grounding {
            candidates.extend(run_grounding(detector.as_ref(), params, image));
        }

        let candidate_count = candidates.len();
        let merged = deduplicate(candidates);
        info!(
            candidates = candidate_count,
            detections = merged.len(),
            "Detection fusion complete"
        );
        merged
    }
}

fn run_grounding(
    detector: &dyn PhraseGroundingDetector,
    params: &GroundingParams,
    image: &Path,
) -> Vec<Detection> {
    let boxes = match detector.ground(image, params) {
        Ok(boxes) => boxes,
        Err(e) => {
            warn!(detector = detector.name(), "Detector failed: {}", e);
            return Vec::new();
        }
    };

    let (width, height) = match image::image_dimensions(image) {
        Ok(dims) => dims,
        Err(e) => {
            warn!(
                detector = detector.name(),
                "Cannot read image size, dropping grounded boxes: {}", e
            );
            return Vec::new();
        }
    };

    let detections: Vec<Detection> = boxes
        .into_iter()
        .filter(|b| b.score >= params.box_threshold)
        .map(|b| {
            Detection::new(
                b.phrase,
                b.score,
                BoundingBox::from_normalized_center(b.cx, b.cy, b.w, b.h, width, height),
            )
        })
        .collect();

    debug!(
        detector = detector.name(),
        kept = detections.len(),
        "Grounding detector finished"
    );
    detections
}

/// True when labels are equal ignoring case, or share a whitespace token.
pub fn labels_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return true;
    }
    let b_tokens: Vec<&str> = b.split_whitespace().collect();
    a.split_whitespace().any(|token| b_tokens.contains(&token))
}

/// Order-sensitive duplicate suppression. Each candidate is compared to the
/// accepted detections; on the first match the higher-scoring of the two
/// takes that slot, otherwise the candidate is appended.
pub fn deduplicate(candidates: Vec<Detection>) -> Vec<Detection> {
    let mut accepted: Vec<Detection> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let duplicate = accepted.iter().position(|existing| {
            labels_match(&existing.label, &candidate.label)
                && existing.bbox.iou(&candidate.bbox) > DUPLICATE_IOU_THRESHOLD
        });

        match duplicate {
            Some(index) => {
                if candidate.score > accepted[index].score {
                    accepted[index] = candidate;
                }
            }
            None => accepted.push(candidate),
        }
    }

    accepted
}
