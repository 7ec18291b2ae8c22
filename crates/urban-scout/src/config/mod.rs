pub mod loader;
pub mod schema;

use std::path::PathBuf;

pub use loader::{load_config, load_config_from_str, load_config_or_default};
pub use schema::{
    AnnotationConfig, DetectionConfig, GroundingConfig, ImageryConfig, LlmConfig,
    ObjectDetectorConfig, ScanConfig, ScoutConfig, StorageConfig,
};

/// Returns the canonical data directory: `~/.urban-scout`.
/// Falls back to a relative `.urban-scout` when no home directory is known.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".urban-scout"))
        .unwrap_or_else(|| PathBuf::from(".urban-scout"))
}
