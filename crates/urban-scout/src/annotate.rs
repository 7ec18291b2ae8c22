//! Draws detection boxes and labels onto a copy of the scanned image.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AnnotationConfig;
use crate::models::{BoundingBox, Detection};
use crate::sanitize::redact_path;

/// Box colours, cycled by detection index.
pub const PALETTE: [Rgb<u8>; 8] = [
    Rgb([255, 0, 0]),
    Rgb([0, 0, 255]),
    Rgb([0, 255, 0]),
    Rgb([255, 255, 0]),
    Rgb([128, 0, 128]),
    Rgb([255, 165, 0]),
    Rgb([0, 255, 255]),
    Rgb([255, 0, 255]),
];

const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("Failed to open image '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read font '{path}': {source}")]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid font file '{0}'")]
    FontInvalid(PathBuf),

    #[error("Failed to create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save annotated image '{path}': {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn palette_color(index: usize) -> Rgb<u8> {
    PALETTE[index % PALETTE.len()]
}

pub fn label_text(detection: &Detection) -> String {
    format!("{} {:.2}", detection.label, detection.score)
}

pub struct Annotator {
    font_path: Option<PathBuf>,
    line_width: u32,
    font_size: f32,
}

impl Annotator {
    pub fn new(config: &AnnotationConfig) -> Self {
        Self {
            font_path: config.font_path.clone(),
            line_width: config.line_width.max(1),
            font_size: config.font_size,
        }
    }

    /// Writes an annotated copy of `image` to `output`. Returns `false` on any
    /// failure; the caller falls back to the unannotated image.
    pub fn annotate(&self, image: &Path, detections: &[Detection], output: &Path) -> bool {
        match self.try_annotate(image, detections, output) {
            Ok(drawn) => {
                debug!(
                    drawn,
                    total = detections.len(),
                    output = %redact_path(output),
                    "Annotated image written"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Annotation failed");
                false
            }
        }
    }

    /// Returns the number of boxes actually drawn.
    pub fn try_annotate(
        &self,
        image: &Path,
        detections: &[Detection],
        output: &Path,
    ) -> Result<usize, AnnotateError> {
        let font = self.load_font()?;
        let mut canvas = image::open(image)
            .map_err(|e| AnnotateError::Open {
                path: image.to_path_buf(),
                source: e,
            })?
            .to_rgb8();

        let (width, height) = canvas.dimensions();
        let mut drawn = 0;
        for (index, detection) in detections.iter().enumerate() {
            let bbox = detection.bbox.clamp_to(width, height);
            if !bbox.is_valid() {
                debug!(label = %detection.label, "Skipping degenerate box");
                continue;
            }
            let color = palette_color(index);
            self.draw_box(&mut canvas, &bbox, color);
            if let Some(font) = &font {
                self.draw_label(&mut canvas, font, &bbox, color, &label_text(detection));
            }
            drawn += 1;
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AnnotateError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        canvas.save(output).map_err(|e| AnnotateError::Save {
            path: output.to_path_buf(),
            source: e,
        })?;
        Ok(drawn)
    }

    /// No configured font means boxes only.
    fn load_font(&self) -> Result<Option<FontVec>, AnnotateError> {
        let Some(path) = &self.font_path else {
            return Ok(None);
        };
        let bytes = std::fs::read(path).map_err(|e| AnnotateError::FontRead {
            path: path.clone(),
            source: e,
        })?;
        FontVec::try_from_vec(bytes)
            .map(Some)
            .map_err(|_| AnnotateError::FontInvalid(path.clone()))
    }

    fn draw_box(&self, canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
        for inset in 0..self.line_width as i32 {
            let w = bbox.width() - 2 * i64::from(inset);
            let h = bbox.height() - 2 * i64::from(inset);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(bbox.xmin + inset, bbox.ymin + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(canvas, rect, color);
        }
    }

    fn draw_label(
        &self,
        canvas: &mut RgbImage,
        font: &FontVec,
        bbox: &BoundingBox,
        color: Rgb<u8>,
        text: &str,
    ) {
        let scale = PxScale::from(self.font_size);
        let (text_w, text_h) = text_size(scale, font, text);
        if text_w == 0 || text_h == 0 {
            return;
        }
        // Above the box when there is room, otherwise inside its top edge.
        let y = if bbox.ymin >= text_h as i32 + 2 {
            bbox.ymin - text_h as i32 - 2
        } else {
            bbox.ymin
        };
        let background = Rect::at(bbox.xmin, y).of_size(text_w + 4, text_h + 2);
        draw_filled_rect_mut(canvas, background, color);
        draw_text_mut(canvas, LABEL_TEXT, bbox.xmin + 2, y + 1, scale, font, text);
    }
}
