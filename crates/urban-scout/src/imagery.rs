//! Street-level image acquisition.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::config::ImageryConfig;
use crate::error::{ConfigError, FetchError};
use crate::models::validate_coordinates;
use crate::sanitize;

/// Anything that can photograph a coordinate into a local file.
pub trait ImageSource: Send + Sync {
    /// Fetches an image for `(latitude, longitude)` into `dest`, returning the
    /// written path. The caller owns the file.
    fn fetch(&self, latitude: f64, longitude: f64, dest: &Path) -> Result<PathBuf, FetchError>;
}

/// Camera parameters sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetViewParams {
    pub size: String,
    pub fov: u32,
    pub heading: u32,
    pub pitch: i32,
}

impl From<&ImageryConfig> for StreetViewParams {
    fn from(config: &ImageryConfig) -> Self {
        Self {
            size: config.size.clone(),
            fov: config.fov,
            heading: config.heading,
            pitch: config.pitch,
        }
    }
}

/// Google Street View Static API client.
pub struct StreetViewFetcher {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    params: StreetViewParams,
}

impl StreetViewFetcher {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        params: StreetViewParams,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            params,
        })
    }

    pub fn from_config(config: &ImageryConfig, api_key: SecretString) -> Result<Self, ConfigError> {
        Self::new(
            config.endpoint.clone(),
            api_key,
            StreetViewParams::from(config),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn query(&self, location: &str) -> Vec<(&'static str, String)> {
        vec![
            ("size", self.params.size.clone()),
            ("location", location.to_string()),
            ("fov", self.params.fov.to_string()),
            ("heading", self.params.heading.to_string()),
            ("pitch", self.params.pitch.to_string()),
            ("key", self.api_key.expose_secret().to_string()),
        ]
    }
}

impl ImageSource for StreetViewFetcher {
    fn fetch(&self, latitude: f64, longitude: f64, dest: &Path) -> Result<PathBuf, FetchError> {
        let coords = validate_coordinates(latitude, longitude)?;
        let _span = tracing::info_span!("imagery.fetch", location = %coords).entered();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(&coords.as_location_param()))
            .send()
            .map_err(|e| FetchError::Transport(sanitize::redact_key(&e.to_string())))?;

        let status = response.status();
        debug!(url = %sanitize::redact_key(response.url().as_str()), %status, "Imagery response");

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = status.as_u16(), "Imagery provider rejected request");
            return Err(FetchError::Provider {
                status: status.as_u16(),
                message: sanitize::truncate_body(&body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(FetchError::Provider {
                status: status.as_u16(),
                message: format!("not an image (content-type '{}')", content_type),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| FetchError::Transport(sanitize::redact_key(&e.to_string())))?;

        write_image(&bytes, dest)?;
        info!(
            file = %sanitize::redact_path(dest),
            bytes = bytes.len(),
            "Street view image saved"
        );
        Ok(dest.to_path_buf())
    }
}

/// Writes image bytes and verifies the file is non-empty on disk. A zero-byte
/// result is removed and reported as a failure.
pub fn write_image(bytes: &[u8], dest: &Path) -> Result<(), FetchError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FetchError::WriteFile {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::write(dest, bytes).map_err(|e| FetchError::WriteFile {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let size = std::fs::metadata(dest)
        .map_err(|e| FetchError::WriteFile {
            path: dest.to_path_buf(),
            source: e,
        })?
        .len();
    if size == 0 {
        let _ = std::fs::remove_file(dest);
        return Err(FetchError::EmptyImage(dest.to_path_buf()));
    }
    Ok(())
}
