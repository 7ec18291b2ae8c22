use std::path::Path;

use crate::config::schema::ScoutConfig;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ScoutConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the config at `path`, or the defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<ScoutConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(path = %path.display(), "No config file found, using defaults");
        let config = ScoutConfig::default();
        validate_config(&config)?;
        return Ok(config);
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<ScoutConfig, ConfigError> {
    let config: ScoutConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &ScoutConfig) -> Result<(), ConfigError> {
    if config.imagery.endpoint.trim().is_empty() {
        return Err(validation("imagery.endpoint must not be empty"));
    }
    if !is_valid_size(&config.imagery.size) {
        return Err(validation(format!(
            "imagery.size must look like WIDTHxHEIGHT, got '{}'",
            config.imagery.size
        )));
    }
    if config.imagery.fov == 0 || config.imagery.fov > 120 {
        return Err(validation(format!(
            "imagery.fov must be in 1..=120, got {}",
            config.imagery.fov
        )));
    }
    if !(-90..=90).contains(&config.imagery.pitch) {
        return Err(validation(format!(
            "imagery.pitch must be in -90..=90, got {}",
            config.imagery.pitch
        )));
    }

    check_unit_interval(
        "detection.confidenceThreshold",
        config.detection.confidence_threshold,
    )?;
    if config.detection.object_detector.endpoint.trim().is_empty() {
        return Err(validation("detection.objectDetector.endpoint must not be empty"));
    }
    if let Some(grounding) = &config.detection.grounding {
        if grounding.endpoint.trim().is_empty() {
            return Err(validation("detection.grounding.endpoint must not be empty"));
        }
        check_unit_interval("detection.grounding.boxThreshold", grounding.box_threshold)?;
        check_unit_interval("detection.grounding.textThreshold", grounding.text_threshold)?;
        if grounding.prompts.iter().all(|p| p.trim().is_empty()) {
            return Err(validation("detection.grounding.prompts must not be empty"));
        }
    }

    if config.llm.model.trim().is_empty() {
        return Err(validation("llm.model must not be empty"));
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(validation(format!(
            "llm.temperature must be in [0, 2], got {}",
            config.llm.temperature
        )));
    }

    let bucket = &config.storage.bucket;
    if bucket.is_empty()
        || !bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(validation(format!(
            "storage.bucket must be non-empty and contain only [A-Za-z0-9_-], got '{}'",
            bucket
        )));
    }

    if config.annotation.line_width == 0 {
        return Err(validation("annotation.lineWidth must be at least 1"));
    }
    if config.annotation.font_size <= 0.0 {
        return Err(validation("annotation.fontSize must be positive"));
    }

    Ok(())
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(validation(format!("{} must be in [0, 1], got {}", name, value)))
    }
}

fn is_valid_size(size: &str) -> bool {
    match size.split_once('x') {
        Some((w, h)) => {
            matches!((w.parse::<u32>(), h.parse::<u32>()), (Ok(w), Ok(h)) if w > 0 && h > 0)
        }
        None => false,
    }
}
