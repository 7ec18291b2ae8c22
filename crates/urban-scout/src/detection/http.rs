//! HTTP-backed detectors.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, DetectError};
use crate::models::Detection;
use crate::sanitize;

use super::prompts::grounding_caption;
use super::{GroundedBox, GroundingParams, ObjectDetector, PhraseGroundingDetector};

fn build_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

fn read_image(path: &Path) -> Result<Vec<u8>, DetectError> {
    std::fs::read(path).map_err(|e| DetectError::ReadImage {
        path: path.to_path_buf(),
        source: e,
    })
}

fn check_status(response: Response) -> Result<Response, DetectError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(DetectError::Status {
        status: status.as_u16(),
        body: sanitize::truncate_body(&body),
    })
}

/// Hugging Face inference-style object detection endpoint
/// (e.g. `facebook/detr-resnet-50`). The image is posted as the raw body.
pub struct HuggingFaceDetector {
    client: Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl HuggingFaceDetector {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            token,
        })
    }
}

impl ObjectDetector for HuggingFaceDetector {
    fn name(&self) -> &str {
        "object-detection"
    }

    fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectError> {
        let bytes = read_image(image)?;
        let mime = mime_guess::from_path(image).first_or_octet_stream();

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, mime.essence_str())
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| DetectError::Request(e.to_string()))?;
        let detections: Vec<Detection> = check_status(response)?
            .json()
            .map_err(|e| DetectError::Response(e.to_string()))?;

        debug!(count = detections.len(), "Object detector response parsed");
        Ok(detections)
    }
}

#[derive(Debug, Serialize)]
struct GroundingRequest<'a> {
    image: String,
    prompt: &'a str,
    box_threshold: f32,
    text_threshold: f32,
}

#[derive(Debug, Deserialize)]
struct GroundingResponse {
    #[serde(default)]
    boxes: Vec<[f32; 4]>,
    #[serde(default)]
    scores: Vec<f32>,
    #[serde(default)]
    phrases: Vec<String>,
}

impl GroundingResponse {
    fn into_boxes(self) -> Result<Vec<GroundedBox>, DetectError> {
        if self.boxes.len() != self.scores.len() || self.boxes.len() != self.phrases.len() {
            return Err(DetectError::Response(format!(
                "mismatched lengths: {} boxes, {} scores, {} phrases",
                self.boxes.len(),
                self.scores.len(),
                self.phrases.len()
            )));
        }

        Ok(self
            .boxes
            .into_iter()
            .zip(self.scores)
            .zip(self.phrases)
            .map(|(([cx, cy, w, h], score), phrase)| GroundedBox {
                phrase,
                score,
                cx,
                cy,
                w,
                h,
            })
            .collect())
    }
}

/// Open-vocabulary grounding service (Grounding DINO style). Returns
/// normalized centre boxes.
pub struct GroundingClient {
    client: Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl GroundingClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
            token,
        })
    }
}

impl PhraseGroundingDetector for GroundingClient {
    fn name(&self) -> &str {
        "grounding"
    }

    fn ground(
        &self,
        image: &Path,
        params: &GroundingParams,
    ) -> Result<Vec<GroundedBox>, DetectError> {
        let bytes = read_image(image)?;
        let caption = grounding_caption(&params.prompts);
        let body = GroundingRequest {
            image: base64::engine::general_purpose::STANDARD.encode(bytes),
            prompt: &caption,
            box_threshold: params.box_threshold,
            text_threshold: params.text_threshold,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| DetectError::Request(e.to_string()))?;
        let parsed: GroundingResponse = check_status(response)?
            .json()
            .map_err(|e| DetectError::Response(e.to_string()))?;

        let boxes = parsed.into_boxes()?;
        debug!(count = boxes.len(), "Grounding response parsed");
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_detection_payload() {
        let payload = r#"[
            {"score": 0.98, "label": "car", "box": {"xmin": 100, "ymin": 200, "xmax": 300, "ymax": 250}},
            {"score": 0.87, "label": "traffic light", "box": {"xmin": 400, "ymin": 50, "xmax": 420, "ymax": 120}}
        ]"#;
        let detections: Vec<Detection> = serde_json::from_str(payload).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[1].label, "traffic light");
        assert_eq!(detections[1].bbox.ymax, 120);
    }

    #[test]
    fn test_grounding_response_zips_columns() {
        let response: GroundingResponse = serde_json::from_str(
            r#"{"boxes": [[0.5, 0.5, 0.2, 0.1]], "scores": [0.41], "phrases": ["pothole"]}"#,
        )
        .unwrap();
        let boxes = response.into_boxes().unwrap();
        assert_eq!(
            boxes,
            vec![GroundedBox {
                phrase: "pothole".to_string(),
                score: 0.41,
                cx: 0.5,
                cy: 0.5,
                w: 0.2,
                h: 0.1,
            }]
        );
    }

    #[test]
    fn test_grounding_response_length_mismatch() {
        let response: GroundingResponse =
            serde_json::from_str(r#"{"boxes": [[0.5, 0.5, 0.2, 0.1]], "scores": [], "phrases": []}"#)
                .unwrap();
        assert!(matches!(
            response.into_boxes(),
            Err(DetectError::Response(_))
        ));
    }

    #[test]
    fn test_missing_image_is_read_error() {
        let detector =
            HuggingFaceDetector::new("http://127.0.0.1:9/detect", None, Duration::from_secs(1))
                .unwrap();
        let result = detector.detect(Path::new("/no/such/image.jpg"));
        assert!(matches!(result, Err(DetectError::ReadImage { .. })));
    }
}
