//! Fail-soft facade over the object store and the scan datastore.
//!
//! Every operation logs its failure and reports it as `None`/`false`/empty;
//! only the orchestrator decides whether that is fatal.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::db::{Database, ScanStore};
use crate::error::StorageError;
use crate::models::{validate_coordinates, NewScan, Report, Scan};
use crate::sanitize::redact_path;
use crate::storage::{unique_object_name, FileObjectStore, ObjectStore};

pub struct Persistence {
    objects: Arc<dyn ObjectStore>,
    scans: Arc<dyn ScanStore>,
}

impl Persistence {
    pub fn new(objects: Arc<dyn ObjectStore>, scans: Arc<dyn ScanStore>) -> Self {
        Self { objects, scans }
    }

    /// Opens the configured bucket (creating it if needed) and database.
    pub fn open(config: &StorageConfig) -> crate::error::Result<Self> {
        let store = FileObjectStore::from_config(config);
        store.ensure_bucket()?;
        let db = Database::open(&config.database_path)?;
        Ok(Self::new(Arc::new(store), Arc::new(db)))
    }

    /// Uploads a local image under a fresh unique name.
    pub fn upload(&self, local_path: &Path) -> Option<String> {
        match self.try_upload(local_path) {
            Ok(url) => {
                info!(file = %redact_path(local_path), %url, "Image uploaded");
                Some(url)
            }
            Err(e) => {
                log_storage_error(&e);
                None
            }
        }
    }

    fn try_upload(&self, local_path: &Path) -> Result<String, StorageError> {
        let metadata = std::fs::metadata(local_path)
            .map_err(|_| StorageError::MissingFile(local_path.to_path_buf()))?;
        if metadata.len() == 0 {
            return Err(StorageError::EmptyFile(local_path.to_path_buf()));
        }
        let bytes = std::fs::read(local_path).map_err(|e| StorageError::ReadFile {
            path: local_path.to_path_buf(),
            source: e,
        })?;

        let name = unique_object_name(local_path);
        let content_type = mime_guess::from_path(local_path).first_or_octet_stream();
        self.objects.upload(&name, &bytes, content_type.essence_str())
    }

    /// Validates and stores a finished scan.
    pub fn insert(&self, scan: NewScan) -> Option<Scan> {
        let scan = match normalize(scan) {
            Ok(scan) => scan,
            Err(reason) => {
                error!(reason = %reason, "Refusing to store invalid scan");
                return None;
            }
        };

        match self.scans.insert(&scan) {
            Ok(stored) => {
                info!(id = stored.id, "Scan stored");
                Some(stored)
            }
            Err(e) => {
                error!(error = %e, "Failed to store scan");
                None
            }
        }
    }

    pub fn list(&self) -> Vec<Scan> {
        self.scans.list().unwrap_or_else(|e| {
            error!(error = %e, "Failed to list scans");
            Vec::new()
        })
    }

    pub fn get_by_id(&self, id: i64) -> Option<Scan> {
        self.scans.find_by_id(id).unwrap_or_else(|e| {
            error!(id, error = %e, "Failed to load scan");
            None
        })
    }

    pub fn update(&self, id: i64, report: &Report) -> bool {
        match self.scans.update_report(id, report) {
            Ok(true) => true,
            Ok(false) => {
                warn!(id, "No scan to update");
                false
            }
            Err(e) => {
                error!(id, error = %e, "Failed to update scan");
                false
            }
        }
    }

    /// Deletes the row, then best-effort removes its images.
    pub fn delete(&self, id: i64) -> bool {
        let existing = self.get_by_id(id);
        match self.scans.delete(id) {
            Ok(true) => {}
            Ok(false) => {
                warn!(id, "No scan to delete");
                return false;
            }
            Err(e) => {
                error!(id, error = %e, "Failed to delete scan");
                return false;
            }
        }

        if let Some(scan) = existing {
            let names = self.object_names(&scan);
            if !names.is_empty() {
                match self.objects.remove(&names) {
                    Ok(()) => debug!(id, count = names.len(), "Removed scan images"),
                    Err(e) => warn!(id, error = %e, "Failed to remove scan images"),
                }
            }
        }
        info!(id, "Scan deleted");
        true
    }

    fn object_names(&self, scan: &Scan) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for url in [&scan.image_url, &scan.annotated_image_url].into_iter().flatten() {
            match self.objects.name_from_url(url) {
                Some(name) if !names.contains(&name) => names.push(name),
                Some(_) => {}
                None => debug!("{}", StorageError::ForeignUrl(url.clone())),
            }
        }
        names
    }
}

fn normalize(mut scan: NewScan) -> Result<NewScan, String> {
    let coords =
        validate_coordinates(scan.latitude, scan.longitude).map_err(|e| e.to_string())?;
    scan.latitude = coords.latitude;
    scan.longitude = coords.longitude;
    if scan.llm_report.trim().is_empty() {
        scan.llm_report = scan.llm_report_structured.to_json();
    }
    Ok(scan)
}

fn log_storage_error(e: &StorageError) {
    match e {
        StorageError::BucketNotFound(bucket) => {
            error!(bucket = %bucket, "Upload failed: bucket does not exist")
        }
        StorageError::PermissionDenied { bucket } => {
            error!(bucket = %bucket, "Upload failed: permission denied")
        }
        StorageError::Duplicate(name) => {
            error!(name = %name, "Upload failed: object name already taken")
        }
        StorageError::MissingFile(path) | StorageError::EmptyFile(path) => {
            error!(file = %redact_path(path), error = %e, "Upload skipped")
        }
        other => error!(error = %other, "Upload failed"),
    }
}
