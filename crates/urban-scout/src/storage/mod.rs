pub mod filesystem;

use std::path::Path;

use chrono::Utc;

use crate::error::StorageError;

pub use filesystem::FileObjectStore;

/// A bucket of publicly addressable image objects.
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `name` and returns its public URL. Existing
    /// objects are never overwritten.
    fn upload(&self, name: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    fn public_url(&self, name: &str) -> String;

    /// Removes the named objects. Names that are already gone are ignored.
    fn remove(&self, names: &[String]) -> Result<(), StorageError>;

    /// Object names, sorted, at most `limit`.
    fn list(&self, limit: usize) -> Result<Vec<String>, StorageError>;

    /// Inverse of [`ObjectStore::public_url`] for URLs this store issued.
    fn name_from_url(&self, url: &str) -> Option<String>;
}

/// Collision-free object name: `scan_{YYYYmmdd_HHMMSS}_{8 hex}{.ext}`,
/// keeping the local file's extension.
pub fn unique_object_name(local_path: &Path) -> String {
    let ext = local_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "scan_{}_{}{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8],
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_name_shape() {
        let name = unique_object_name(Path::new("/tmp/latest_scan.JPG"));
        assert!(name.starts_with("scan_"));
        assert!(name.ends_with(".jpg"));
        // scan_ + 15 timestamp chars + _ + 8 suffix chars + .jpg
        assert_eq!(name.len(), 5 + 15 + 1 + 8 + 4);
    }

    #[test]
    fn test_unique_names_differ() {
        let a = unique_object_name(Path::new("a.png"));
        let b = unique_object_name(Path::new("a.png"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_extension() {
        let name = unique_object_name(Path::new("image"));
        assert!(!name.contains('.'));
    }
}
