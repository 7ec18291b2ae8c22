use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detection::prompts::INFRASTRUCTURE_PROMPTS;
use crate::secrets::SecretSource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoutConfig {
    #[serde(default)]
    pub imagery: ImageryConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Street View Static API request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageryConfig {
    #[serde(default = "default_imagery_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_fov")]
    pub fov: u32,
    #[serde(default)]
    pub heading: u32,
    #[serde(default)]
    pub pitch: i32,
    #[serde(default = "default_imagery_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_imagery_key")]
    pub api_key: SecretSource,
}

fn default_imagery_endpoint() -> String {
    "https://maps.googleapis.com/maps/api/streetview".to_string()
}

fn default_size() -> String {
    "600x400".to_string()
}

fn default_fov() -> u32 {
    90
}

fn default_imagery_timeout() -> u64 {
    30
}

fn default_imagery_key() -> SecretSource {
    SecretSource::from_env("STREET_VIEW_API_KEY")
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_imagery_endpoint(),
            size: default_size(),
            fov: default_fov(),
            heading: 0,
            pitch: 0,
            timeout_secs: default_imagery_timeout(),
            api_key: default_imagery_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    /// Minimum score kept from the general-purpose detector.
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,
    #[serde(default)]
    pub object_detector: ObjectDetectorConfig,
    /// Open-vocabulary detector; omitted means single-detector mode.
    #[serde(default)]
    pub grounding: Option<GroundingConfig>,
}

fn default_confidence() -> f32 {
    0.5
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence(),
            object_detector: ObjectDetectorConfig::default(),
            grounding: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDetectorConfig {
    #[serde(default = "default_detector_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_hf_token")]
    pub token: SecretSource,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_detector_endpoint() -> String {
    "https://api-inference.huggingface.co/models/facebook/detr-resnet-50".to_string()
}

fn default_hf_token() -> SecretSource {
    SecretSource::from_env("HF_API_TOKEN")
}

fn default_http_timeout() -> u64 {
    60
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_detector_endpoint(),
            token: default_hf_token(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingConfig {
    pub endpoint: String,
    #[serde(default = "default_hf_token")]
    pub token: SecretSource,
    #[serde(default = "default_box_threshold")]
    pub box_threshold: f32,
    #[serde(default = "default_text_threshold")]
    pub text_threshold: f32,
    #[serde(default = "default_prompts")]
    pub prompts: Vec<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_box_threshold() -> f32 {
    0.35
}

fn default_text_threshold() -> f32 {
    0.25
}

fn default_prompts() -> Vec<String> {
    INFRASTRUCTURE_PROMPTS.iter().map(|p| p.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_key")]
    pub api_key: SecretSource,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_key() -> SecretSource {
    SecretSource::from_env("GROQ_API_KEY")
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: default_llm_key(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per bucket.
    #[serde(default = "default_objects_root")]
    pub objects_root: PathBuf,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Prefix for public URLs; defaults to a `file://` URL of `objects_root`.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_objects_root() -> PathBuf {
    crate::config::default_data_dir().join("objects")
}

fn default_bucket() -> String {
    "street-view-images".to_string()
}

fn default_database_path() -> PathBuf {
    crate::db::default_database_path()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            objects_root: default_objects_root(),
            bucket: default_bucket(),
            public_base_url: None,
            database_path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationConfig {
    /// TrueType/OpenType font for box labels. Without one only boxes are drawn.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_line_width")]
    pub line_width: u32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_line_width() -> u32 {
    3
}

fn default_font_size() -> f32 {
    16.0
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            line_width: default_line_width(),
            font_size: default_font_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// Directory for the fixed-name scratch images of the in-flight scan.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("urban-scout")
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    2
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}
