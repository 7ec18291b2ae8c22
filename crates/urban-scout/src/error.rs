use std::path::PathBuf;
use thiserror::Error;

use crate::models::CoordinateError;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Imagery error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Language model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(#[from] CoordinateError),

    #[error("Imagery provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Imagery request failed: {0}")]
    Transport(String),

    #[error("Failed to write image '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloaded image '{0}' is empty")]
    EmptyImage(PathBuf),
}

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Detector request failed: {0}")]
    Request(String),

    #[error("Detector returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed detector response: {0}")]
    Response(String),
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Language model request failed: {0}")]
    Request(String),

    #[error("Language model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Language model response had no content")]
    EmptyResponse,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Local file '{0}' does not exist")]
    MissingFile(PathBuf),

    #[error("Local file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bucket '{0}' does not exist")]
    BucketNotFound(String),

    #[error("Permission denied writing to bucket '{bucket}'")]
    PermissionDenied { bucket: String },

    #[error("Object '{0}' already exists")]
    Duplicate(String),

    #[error("Object store I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("URL '{0}' does not point into this bucket")]
    ForeignUrl(String),
}

pub type Result<T> = std::result::Result<T, ScoutError>;
