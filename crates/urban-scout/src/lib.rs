pub mod annotate;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod detection;
pub mod error;
pub mod imagery;
pub mod logging;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use annotate::Annotator;
pub use config::{load_config, load_config_or_default, ScoutConfig};
pub use db::{Database, DatabaseError, ScanStore};
pub use detection::{DetectorFusion, ObjectDetector, PhraseGroundingDetector};
pub use error::{
    ConfigError, DetectError, FetchError, LlmError, Result, ScoutError, StorageError,
};
pub use imagery::ImageSource;
pub use models::{BoundingBox, Detection, Issue, NewScan, Report, Scan, Severity};
pub use persistence::Persistence;
pub use pipeline::{BatchSummary, ScanContext, ScanOrchestrator, ScanSettings, ScanState};
pub use report::{LanguageModel, ReportGenerator};
pub use secrets::{resolve_secret, SecretError, SecretSource};
pub use storage::{FileObjectStore, ObjectStore};
