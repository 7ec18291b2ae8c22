use serde::Serialize;

use crate::models::{BoundingBox, Detection};
use crate::sanitize::sanitize_for_prompt;

/// Issue categories the model is asked to classify into.
pub const ISSUE_CATEGORIES: &[&str] = &[
    "road_damage",
    "sidewalk_damage",
    "road_markings",
    "signage",
    "traffic_signals",
    "drainage",
    "pedestrian_safety",
    "vegetation",
    "street_lighting",
    "debris",
];

#[derive(Serialize)]
struct PromptDetection<'a> {
    label: String,
    score: f64,
    #[serde(rename = "box")]
    bbox: &'a BoundingBox,
}

/// Detections as a pretty JSON array with scores rounded to three places.
pub fn detections_json(detections: &[Detection]) -> String {
    let normalized: Vec<PromptDetection<'_>> = detections
        .iter()
        .map(|d| PromptDetection {
            label: sanitize_for_prompt(&d.label),
            score: (f64::from(d.score) * 1000.0).round() / 1000.0,
            bbox: &d.bbox,
        })
        .collect();
    serde_json::to_string_pretty(&normalized).unwrap_or_else(|_| "[]".to_string())
}

pub fn build_prompt(detections: &[Detection]) -> String {
    let categories = ISSUE_CATEGORIES
        .iter()
        .map(|c| format!("- {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an urban public works analyst reviewing object detections from a street-level photograph.
Identify public infrastructure issues that the detections actually support.

RULES:
- Be conservative: report an issue only when a detection is evidence for it
- Ignore normal urban objects (cars, people, buildings, trees, traffic lights in working order)
- Use one of these issue types:
{categories}
- severity MUST be one of: High, Medium, Low
- If nothing needs attention, return an empty issues array
- Respond ONLY with valid JSON. Do not include any other text.

DETECTION DATA:
{detections}

Return JSON:
{{"summary": "one sentence overall assessment", "issues": [
  {{"type": "road_damage", "severity": "High|Medium|Low", "description": "1-2 sentences on the issue and its impact"}}
]}}"#,
        categories = categories,
        detections = detections_json(detections),
    )
}
