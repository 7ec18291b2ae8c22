use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StorageConfig;
use crate::error::StorageError;

use super::ObjectStore;

/// Directory-backed object store. Objects live in `{root}/{bucket}/{name}`
/// and are addressed as `{public_base_url}/{bucket}/{name}`.
pub struct FileObjectStore {
    root: PathBuf,
    bucket: String,
    public_base_url: String,
}

impl FileObjectStore {
    pub fn new<P: AsRef<Path>>(
        root: P,
        bucket: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        let root = root.as_ref().to_path_buf();
        let public_base_url = public_base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("file://{}", root.display()));
        Self {
            root,
            bucket: bucket.into(),
            public_base_url,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.objects_root,
            config.bucket.clone(),
            config.public_base_url.clone(),
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    /// Creates the bucket directory if it does not exist yet.
    pub fn ensure_bucket(&self) -> Result<(), StorageError> {
        let dir = self.bucket_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| self.classify(&dir, e))?;
            debug!(bucket = %self.bucket, "Created bucket");
        }
        Ok(())
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(StorageError::Io {
                path: PathBuf::from(name),
                source: std::io::Error::new(ErrorKind::InvalidInput, "invalid object name"),
            });
        }
        Ok(self.bucket_dir().join(name))
    }

    fn classify(&self, path: &Path, e: std::io::Error) -> StorageError {
        match e.kind() {
            ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                bucket: self.bucket.clone(),
            },
            ErrorKind::AlreadyExists => StorageError::Duplicate(
                path.file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string(),
            ),
            _ => StorageError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

impl ObjectStore for FileObjectStore {
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        if !self.bucket_dir().is_dir() {
            return Err(StorageError::BucketNotFound(self.bucket.clone()));
        }
        let path = self.object_path(name)?;

        // create_new fails on an existing object instead of replacing it.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| self.classify(&path, e))?;
        file.write_all(bytes).map_err(|e| self.classify(&path, e))?;

        debug!(name, content_type, bytes = bytes.len(), "Object stored");
        Ok(self.public_url(name))
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, name)
    }

    fn remove(&self, names: &[String]) -> Result<(), StorageError> {
        for name in names {
            let path = self.object_path(name)?;
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(name = %name, "Object removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(self.classify(&path, e)),
            }
        }
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<String>, StorageError> {
        let dir = self.bucket_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::BucketNotFound(self.bucket.clone()))
            }
            Err(e) => return Err(self.classify(&dir, e)),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names.truncate(limit);
        Ok(names)
    }

    fn name_from_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/{}/", self.public_base_url, self.bucket);
        let name = url.strip_prefix(&prefix)?;
        let name = name.split(['?', '#']).next().unwrap_or_default();
        if name.is_empty() || name.contains('/') {
            return None;
        }
        Some(name.to_string())
    }
}
