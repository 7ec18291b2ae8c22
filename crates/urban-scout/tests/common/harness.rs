//! Test harness for isolated orchestrator runs.
//!
//! The `TestHarness` owns a temp directory holding the object bucket, the
//! scratch directory and any fixture files, plus an in-memory database that
//! outlives each orchestrator so tests can inspect what was stored.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use urban_scout::config::AnnotationConfig;
use urban_scout::detection::{GroundedBox, GroundingParams};
use urban_scout::{
    Annotator, Database, DetectorFusion, FileObjectStore, ImageSource, LanguageModel,
    ObjectStore, Persistence, ReportGenerator, ScanOrchestrator, ScanSettings, ScanStore,
};

use super::fakes::{FixedDetector, FixedGrounding};

pub struct TestHarness {
    temp_dir: TempDir,
    pub scratch_dir: PathBuf,
    pub store: Arc<FileObjectStore>,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let scratch_dir = temp_dir.path().join("scratch");
        let store = FileObjectStore::new(temp_dir.path().join("objects"), "scan-images", None);
        store.ensure_bucket().expect("Failed to create bucket");
        let db = Database::open_in_memory().expect("Failed to open database");

        Self {
            temp_dir,
            scratch_dir,
            store: Arc::new(store),
            db,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn settings(&self) -> ScanSettings {
        ScanSettings {
            scratch_dir: self.scratch_dir.clone(),
            confidence_threshold: 0.5,
            max_retries: 2,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence_with(self.store.clone())
    }

    pub fn persistence_with(&self, objects: Arc<dyn ObjectStore>) -> Persistence {
        Persistence::new(objects, Arc::new(self.db.clone()))
    }

    /// Objects currently in the bucket.
    pub fn stored_objects(&self) -> Vec<String> {
        self.store.list(100).expect("Failed to list bucket")
    }

    pub fn scratch_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn write_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    pub fn builder(&self) -> OrchestratorBuilder<'_> {
        OrchestratorBuilder {
            harness: self,
            imagery: None,
            detections: Vec::new(),
            grounded: None,
            model: None,
            annotation: AnnotationConfig::default(),
            objects: None,
            scans: None,
        }
    }
}

pub struct OrchestratorBuilder<'a> {
    harness: &'a TestHarness,
    imagery: Option<Arc<dyn ImageSource>>,
    detections: Vec<urban_scout::Detection>,
    grounded: Option<Vec<GroundedBox>>,
    model: Option<Arc<dyn LanguageModel>>,
    annotation: AnnotationConfig,
    objects: Option<Arc<dyn ObjectStore>>,
    scans: Option<Arc<dyn ScanStore>>,
}

impl OrchestratorBuilder<'_> {
    pub fn imagery(mut self, imagery: Arc<dyn ImageSource>) -> Self {
        self.imagery = Some(imagery);
        self
    }

    pub fn detections(mut self, detections: Vec<urban_scout::Detection>) -> Self {
        self.detections = detections;
        self
    }

    pub fn grounded(mut self, boxes: Vec<GroundedBox>) -> Self {
        self.grounded = Some(boxes);
        self
    }

    pub fn model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn font(mut self, path: PathBuf) -> Self {
        self.annotation.font_path = Some(path);
        self
    }

    pub fn objects(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    /// Replaces the harness database for this orchestrator only.
    pub fn scans(mut self, scans: Arc<dyn ScanStore>) -> Self {
        self.scans = Some(scans);
        self
    }

    pub fn build(self) -> ScanOrchestrator {
        let imagery = self
            .imagery
            .unwrap_or_else(|| Arc::new(super::fakes::FakeImagery::new()));
        let model = self
            .model
            .unwrap_or_else(|| Arc::new(super::fakes::ScriptedModel::replying("{}")));

        let mut detector = DetectorFusion::new(Box::new(FixedDetector(self.detections)));
        if let Some(boxes) = self.grounded {
            detector = detector.with_grounding(
                Box::new(FixedGrounding(boxes)),
                GroundingParams {
                    prompts: vec!["pothole".to_string()],
                    box_threshold: 0.3,
                    text_threshold: 0.25,
                },
            );
        }

        let objects = self
            .objects
            .unwrap_or_else(|| self.harness.store.clone() as Arc<dyn ObjectStore>);
        let persistence = match self.scans {
            Some(scans) => Persistence::new(objects, scans),
            None => self.harness.persistence_with(objects),
        };

        ScanOrchestrator::new(
            imagery,
            detector,
            ReportGenerator::new(model),
            Annotator::new(&self.annotation),
            persistence,
            self.harness.settings(),
        )
    }
}
