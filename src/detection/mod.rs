//! Remote vision-model detection: downscale, request, validate, rescale.
//!
//! The model sees a JPEG no larger than `max_dimension` on either side. The
//! boxes it returns are in that downscaled space and are divided by the
//! downscale factor before they reach an annotation store. The whole response
//! is rejected if any single box is invalid.

mod bridge;
mod client;
mod encode;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::{AnnotationError, Author, ImageKey, PendingBox};
use crate::geometry::ImageRect;

pub use bridge::{detect_image, DetectionBridge, DetectionJob, DetectionOutcome};
pub use client::{parse_detection_response, DetectionClient, HttpDetectionClient};
pub use encode::{encode_resized_jpeg, DownscalePlan, JPEG_QUALITY};

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detection request failed: {0}")]
    Transport(String),
    #[error("detection service answered with status {status}")]
    Status { status: u16 },
    #[error("malformed detection response: {0}")]
    Malformed(String),
    #[error("failed to read or encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("image has no usable size")]
    EmptyImage,
    #[error("detected box #{index} is invalid: {reason}")]
    InvalidBox { index: usize, reason: &'static str },
    #[error("detection already running for {key}")]
    AlreadyRunning { key: ImageKey },
    #[error("image {key} is not loaded yet")]
    NotLoaded { key: ImageKey },
    #[error("no image is selected")]
    NoActiveImage,
    #[error("detected boxes were rejected: {0}")]
    Store(#[from] AnnotationError),
}

pub type DetectionResult<T> = std::result::Result<T, DetectionError>;

impl From<reqwest::Error> for DetectionError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DetectionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionRequest {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub width: u32,
    pub height: u32,
}

fn default_author() -> Author {
    Author::Llm
}

/// One box as returned by the model, in downscaled image coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedBox {
    pub value: String,
    #[serde(default)]
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_author")]
    pub author: Author,
    pub score: f64,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl DetectedBox {
    fn rect(&self) -> ImageRect {
        ImageRect::new(self.x, self.y, self.width, self.height)
    }

    fn check(&self) -> Result<(), &'static str> {
        if self.value.trim().is_empty() {
            return Err("missing tag value");
        }
        if !self.rect().is_finite() {
            return Err("geometry is not finite");
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err("width and height must be positive");
        }
        if !self.score.is_finite() || !(0.0..=1.0).contains(&self.score) {
            return Err("score must be within 0..=1");
        }
        if self.author != Author::Llm {
            return Err("author must be llm");
        }
        Ok(())
    }
}

/// Validates every box and maps it back to natural image coordinates.
pub fn rescale_detections(
    detected: Vec<DetectedBox>,
    factor: f64,
) -> DetectionResult<Vec<PendingBox>> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(DetectionError::EmptyImage);
    }
    detected
        .into_iter()
        .enumerate()
        .map(|(index, detected)| {
            detected
                .check()
                .map_err(|reason| DetectionError::InvalidBox { index, reason })?;
            let rect = detected.rect().scaled_down(factor);
            let label = if detected.label.trim().is_empty() {
                detected.value.clone()
            } else {
                detected.label
            };
            Ok(PendingBox {
                rect,
                value: detected.value,
                label,
                author: Author::Llm,
                score: detected.score,
                rationale: detected.rationale,
            })
        })
        .collect()
}
