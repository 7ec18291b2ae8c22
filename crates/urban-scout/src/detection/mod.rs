//! Object detection: the detector seams and the fusion engine that merges them.

pub mod fusion;
pub mod http;
pub mod prompts;

use std::path::Path;

use crate::error::DetectError;
use crate::models::Detection;

pub use fusion::{deduplicate, labels_match, DetectorFusion};
pub use http::{GroundingClient, HuggingFaceDetector};

/// A closed-vocabulary detector returning pixel-space boxes.
pub trait ObjectDetector: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectError>;
}

/// One phrase match from an open-vocabulary detector. Box coordinates are
/// normalized to `[0, 1]` and centre-based.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundedBox {
    pub phrase: String,
    pub score: f32,
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Prompting parameters for the open-vocabulary detector.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundingParams {
    pub prompts: Vec<String>,
    pub box_threshold: f32,
    pub text_threshold: f32,
}

impl From<&crate::config::GroundingConfig> for GroundingParams {
    fn from(config: &crate::config::GroundingConfig) -> Self {
        Self {
            prompts: config.prompts.clone(),
            box_threshold: config.box_threshold,
            text_threshold: config.text_threshold,
        }
    }
}

/// A text-prompted detector.
pub trait PhraseGroundingDetector: Send + Sync {
    fn name(&self) -> &str;

    fn ground(&self, image: &Path, params: &GroundingParams)
        -> Result<Vec<GroundedBox>, DetectError>;
}
