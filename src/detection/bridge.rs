use std::collections::HashSet;
use std::path::PathBuf;

use image::DynamicImage;

use super::{
    encode_resized_jpeg, rescale_detections, DetectionClient, DetectionError, DetectionRequest,
    DetectionResult, DownscalePlan,
};
use crate::annotation::{ImageKey, ImageUnit, PendingBox};
use crate::geometry::Size;

/// Work item for a detection worker. It carries only owned data so it can
/// move to another thread.
#[derive(Debug, Clone)]
pub struct DetectionJob {
    pub key: ImageKey,
    pub path: PathBuf,
    pub max_dimension: u32,
}

/// Result of a job, tagged with the image it was started for.
#[derive(Debug)]
pub struct DetectionOutcome {
    pub key: ImageKey,
    pub result: DetectionResult<Vec<PendingBox>>,
}

impl DetectionOutcome {
    /// Outcome for a job whose worker stopped before producing a result.
    pub fn interrupted(key: ImageKey, reason: impl std::fmt::Display) -> Self {
        Self {
            key,
            result: Err(DetectionError::Transport(reason.to_string())),
        }
    }
}

impl DetectionJob {
    pub fn run(self, client: &dyn DetectionClient) -> DetectionOutcome {
        let result = image::open(&self.path)
            .map_err(DetectionError::from)
            .and_then(|image| detect_image(&image, self.max_dimension, client));
        if let Err(err) = &result {
            tracing::warn!(key = %self.key, error = %err, "detection failed");
        }
        DetectionOutcome {
            key: self.key,
            result,
        }
    }
}

/// Downscales `image`, asks `client` for boxes and maps them back to natural size.
pub fn detect_image(
    image: &DynamicImage,
    max_dimension: u32,
    client: &dyn DetectionClient,
) -> DetectionResult<Vec<PendingBox>> {
    let natural = Size::new(f64::from(image.width()), f64::from(image.height()));
    let plan = DownscalePlan::for_image(natural, max_dimension).ok_or(DetectionError::EmptyImage)?;
    tracing::debug!(
        factor = plan.factor,
        width = plan.width,
        height = plan.height,
        "detection downscale"
    );
    let request = DetectionRequest {
        image_url: encode_resized_jpeg(image, &plan)?,
        width: plan.width,
        height: plan.height,
    };
    let detected = client.detect(&request)?;
    rescale_detections(detected, plan.factor)
}

/// Tracks which images have a request in flight; one per image at a time.
#[derive(Debug, Default)]
pub struct DetectionBridge {
    in_flight: HashSet<ImageKey>,
}

impl DetectionBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, key: &ImageKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn begin(&mut self, image: &ImageUnit, max_dimension: u32) -> DetectionResult<DetectionJob> {
        if image.natural_size().is_none() {
            return Err(DetectionError::NotLoaded {
                key: image.key.clone(),
            });
        }
        if !self.in_flight.insert(image.key.clone()) {
            return Err(DetectionError::AlreadyRunning {
                key: image.key.clone(),
            });
        }
        tracing::info!(key = %image.key, "detection started");
        Ok(DetectionJob {
            key: image.key.clone(),
            path: image.path.clone(),
            max_dimension,
        })
    }

    /// Clears the in-flight flag; called for every outcome, success or not.
    pub fn finish(&mut self, key: &ImageKey) -> bool {
        self.in_flight.remove(key)
    }
}
