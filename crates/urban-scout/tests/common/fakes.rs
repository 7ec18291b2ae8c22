//! In-process stand-ins for the network-backed collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use urban_scout::detection::{GroundedBox, GroundingParams};
use urban_scout::error::{DetectError, FetchError, LlmError, StorageError};
use urban_scout::models::validate_coordinates;
use urban_scout::pipeline::{ProgressEvent, ProgressReporter};
use urban_scout::{
    BoundingBox, DatabaseError, Detection, ImageSource, LanguageModel, NewScan, ObjectDetector,
    ObjectStore, PhraseGroundingDetector, Report, Scan, ScanStore,
};

pub const IMAGE_WIDTH: u32 = 64;
pub const IMAGE_HEIGHT: u32 = 48;

/// Writes a solid grey image, failing the first `failures` calls with a
/// transport error.
pub struct FakeImagery {
    failures: usize,
    pub calls: AtomicUsize,
}

impl FakeImagery {
    pub fn new() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageSource for FakeImagery {
    fn fetch(&self, latitude: f64, longitude: f64, dest: &Path) -> Result<PathBuf, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        validate_coordinates(latitude, longitude)?;
        if call < self.failures {
            return Err(FetchError::Transport("connection reset".to_string()));
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FetchError::WriteFile {
                path: dest.to_path_buf(),
                source: e,
            })?;
        }
        RgbImage::from_pixel(IMAGE_WIDTH, IMAGE_HEIGHT, Rgb([128, 128, 128]))
            .save(dest)
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(dest.to_path_buf())
    }
}

pub struct FixedDetector(pub Vec<Detection>);

impl ObjectDetector for FixedDetector {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _image: &Path) -> Result<Vec<Detection>, DetectError> {
        Ok(self.0.clone())
    }
}

pub struct FixedGrounding(pub Vec<GroundedBox>);

impl PhraseGroundingDetector for FixedGrounding {
    fn name(&self) -> &str {
        "fixed-grounding"
    }

    fn ground(
        &self,
        _image: &Path,
        _params: &GroundingParams,
    ) -> Result<Vec<GroundedBox>, DetectError> {
        Ok(self.0.clone())
    }
}

/// Replays canned responses in order; once exhausted, repeats the last one.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, String>>>,
    last: Mutex<Option<Result<String, String>>>,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<&str, &str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        let response = match next {
            Some(r) => {
                *self.last.lock().unwrap() = Some(r.clone());
                r
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err("no scripted response".to_string())),
        };
        response.map_err(LlmError::Request)
    }
}

/// Delegates to `inner` but rejects the uploads whose 1-based ordinal is
/// listed in `fail_on`.
pub struct FlakyStore {
    inner: Arc<dyn ObjectStore>,
    fail_on: Vec<usize>,
    uploads: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn ObjectStore>, fail_on: Vec<usize>) -> Self {
        Self {
            inner,
            fail_on,
            uploads: AtomicUsize::new(0),
        }
    }
}

impl ObjectStore for FlakyStore {
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let ordinal = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on.contains(&ordinal) {
            return Err(StorageError::PermissionDenied {
                bucket: "scan-images".to_string(),
            });
        }
        self.inner.upload(name, bytes, content_type)
    }

    fn public_url(&self, name: &str) -> String {
        self.inner.public_url(name)
    }

    fn remove(&self, names: &[String]) -> Result<(), StorageError> {
        self.inner.remove(names)
    }

    fn list(&self, limit: usize) -> Result<Vec<String>, StorageError> {
        self.inner.list(limit)
    }

    fn name_from_url(&self, url: &str) -> Option<String> {
        self.inner.name_from_url(url)
    }
}

/// A scan table whose writes always fail; reads see nothing.
pub struct FailingScanStore;

impl ScanStore for FailingScanStore {
    fn insert(&self, _scan: &NewScan) -> Result<Scan, DatabaseError> {
        Err(DatabaseError::LockPoisoned)
    }

    fn list(&self) -> Result<Vec<Scan>, DatabaseError> {
        Ok(Vec::new())
    }

    fn find_by_id(&self, _id: i64) -> Result<Option<Scan>, DatabaseError> {
        Ok(None)
    }

    fn update_report(&self, _id: i64, _report: &Report) -> Result<bool, DatabaseError> {
        Err(DatabaseError::LockPoisoned)
    }

    fn delete(&self, _id: i64) -> Result<bool, DatabaseError> {
        Err(DatabaseError::LockPoisoned)
    }
}

/// Collects every progress event.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn detection(label: &str, score: f32, b: (i32, i32, i32, i32)) -> Detection {
    Detection::new(label, score, BoundingBox::new(b.0, b.1, b.2, b.3))
}

pub const TWO_ISSUE_REPORT: &str = r#"Here is my assessment:
```json
{"summary": "Two issues need attention.", "issues": [
  {"type": "road_damage", "severity": "High", "description": "Pothole near the curb"},
  {"type": "signage", "severity": "Low", "description": "Faded stop sign"}
]}
```"#;
