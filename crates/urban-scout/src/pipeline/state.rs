use std::fmt;

use serde::Serialize;

/// Steps of one scan attempt, in execution order, plus the terminal `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Validating,
    FetchingImage,
    UploadingOriginal,
    Detecting,
    Annotating,
    UploadingAnnotated,
    GeneratingReport,
    Persisting,
    CleaningUp,
    Done,
    Failed,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Validating => "validating",
            ScanState::FetchingImage => "fetching_image",
            ScanState::UploadingOriginal => "uploading_original",
            ScanState::Detecting => "detecting",
            ScanState::Annotating => "annotating",
            ScanState::UploadingAnnotated => "uploading_annotated",
            ScanState::GeneratingReport => "generating_report",
            ScanState::Persisting => "persisting",
            ScanState::CleaningUp => "cleaning_up",
            ScanState::Done => "done",
            ScanState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Done | ScanState::Failed)
    }

    /// Rough completion percentage shown to users.
    pub fn percent(&self) -> u8 {
        match self {
            ScanState::Validating => 0,
            ScanState::FetchingImage => 10,
            ScanState::UploadingOriginal => 25,
            ScanState::Detecting => 35,
            ScanState::Annotating => 55,
            ScanState::UploadingAnnotated => 65,
            ScanState::GeneratingReport => 75,
            ScanState::Persisting => 90,
            ScanState::CleaningUp => 95,
            ScanState::Done | ScanState::Failed => 100,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScanState::Validating => "Validating coordinates...",
            ScanState::FetchingImage => "Fetching street view image...",
            ScanState::UploadingOriginal => "Uploading original image...",
            ScanState::Detecting => "Running object detection...",
            ScanState::Annotating => "Drawing detections...",
            ScanState::UploadingAnnotated => "Uploading annotated image...",
            ScanState::GeneratingReport => "Generating AI report...",
            ScanState::Persisting => "Saving scan...",
            ScanState::CleaningUp => "Cleaning up temporary files...",
            ScanState::Done => "Scan complete",
            ScanState::Failed => "Scan failed",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
