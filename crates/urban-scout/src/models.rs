//! Core records shared by every stage of a scan.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Epsilon added to the union area so IoU never divides by zero.
pub const IOU_EPSILON: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("Latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("Longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        // `contains` is false for NaN, so NaN is rejected along with out-of-range values.
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::Longitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// The `lat,lon` form used by the imagery API.
    pub fn as_location_param(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Validates a raw latitude/longitude pair.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<Coordinates, CoordinateError> {
    Coordinates::new(latitude, longitude)
}

/// Axis-aligned box in integer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Converts a normalized `(cx, cy, w, h)` box into pixel corners.
    pub fn from_normalized_center(cx: f32, cy: f32, w: f32, h: f32, width: u32, height: u32) -> Self {
        let (iw, ih) = (width as f32, height as f32);
        Self {
            xmin: ((cx - w / 2.0) * iw) as i32,
            ymin: ((cy - h / 2.0) * ih) as i32,
            xmax: ((cx + w / 2.0) * iw) as i32,
            ymax: ((cy + h / 2.0) * ih) as i32,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax
    }

    /// Computed in `i64`: boxes from a detector are not bounded to the image.
    pub fn width(&self) -> i64 {
        (i64::from(self.xmax) - i64::from(self.xmin)).max(0)
    }

    pub fn height(&self) -> i64 {
        (i64::from(self.ymax) - i64::from(self.ymin)).max(0)
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    /// Clamps the box into an image of the given size. The result may be
    /// degenerate; check [`BoundingBox::is_valid`] before drawing.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        Self {
            xmin: self.xmin.clamp(0, max_x),
            ymin: self.ymin.clamp(0, max_y),
            xmax: self.xmax.clamp(0, max_x),
            ymax: self.ymax.clamp(0, max_y),
        }
    }

    /// Intersection over union. Pairs without a positive-area intersection yield 0.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix_min = self.xmin.max(other.xmin);
        let iy_min = self.ymin.max(other.ymin);
        let ix_max = self.xmax.min(other.xmax);
        let iy_max = self.ymax.min(other.ymax);

        if ix_max <= ix_min || iy_max <= iy_min {
            return 0.0;
        }

        let intersection =
            (f64::from(ix_max) - f64::from(ix_min)) * (f64::from(iy_max) - f64::from(iy_min));
        let union = self.area() + other.area() - intersection;
        intersection / (union + IOU_EPSILON)
    }
}

/// One object found in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }
}

/// Issue severity as reported by the language model.
///
/// Values outside the known scale keep the model's original text in
/// `Unknown`, so the stored audit copy still shows what was said.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
    Unknown(String),
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Unknown(String::new())
    }
}

impl Severity {
    /// Display label. Every unrecognised value reads "Unknown".
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Unknown(_) => "Unknown",
        }
    }

    /// The text as the model wrote it, or the label for known levels.
    pub fn raw(&self) -> &str {
        match self {
            Severity::Unknown(raw) if !raw.is_empty() => raw,
            other => other.as_str(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Severity::Unknown(_))
    }

    /// Lenient, case-insensitive parse.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "" | "unknown" => Severity::default(),
            _ => Severity::Unknown(trimmed.to_string()),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.raw())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Numbers and other non-strings are kept as their JSON text; null is empty.
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => Severity::parse(&s),
            serde_json::Value::Null => Severity::default(),
            other => Severity::Unknown(other.to_string()),
        })
    }
}

/// One inferred infrastructure problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type", default = "default_issue_type")]
    pub issue_type: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
}

fn default_issue_type() -> String {
    "unknown".to_string()
}

/// Structured model output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn new(summary: impl Into<String>, issues: Vec<Issue>) -> Self {
        Self {
            summary: summary.into(),
            issues,
        }
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Serialized form stored alongside the structured copy for audit.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"summary\":{:?},\"issues\":[]}}", self.summary)
        })
    }
}

/// Fields of a scan before the datastore assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScan {
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub annotated_image_url: Option<String>,
    pub detection_results: Vec<Detection>,
    pub llm_report: String,
    pub llm_report_structured: Report,
}

/// One persisted unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub annotated_image_url: Option<String>,
    pub detection_results: Vec<Detection>,
    pub llm_report: String,
    pub llm_report_structured: Report,
    pub created_at: DateTime<Utc>,
}

impl Scan {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}
