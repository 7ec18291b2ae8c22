use std::path::PathBuf;

use thiserror::Error;

use crate::error::FetchError;
use crate::models::CoordinateError;

/// Reasons a scan attempt ends in `Failed`.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] CoordinateError),

    #[error("Image fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to upload the original image")]
    OriginalUpload,

    #[error("Failed to store the scan record")]
    Persist,
}

impl ScanError {
    /// Invalid coordinates fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ScanError::InvalidInput(_) | ScanError::Fetch(FetchError::InvalidCoordinates(_))
        )
    }
}

/// Degradations that do not fail the scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanWarning {
    AnnotationFailed,
    AnnotatedUploadFailed,
    CleanupFailed { file: PathBuf, error: String },
}
