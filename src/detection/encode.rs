use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::DynamicImage;

use super::{DetectionError, DetectionResult};
use crate::geometry::Size;
use crate::viewport::fit_to_viewport;

pub const JPEG_QUALITY: u8 = 80;
const MIN_DOWNSCALE_FACTOR: f64 = 0.1;

/// Size of the image sent to the model and the factor that maps it back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownscalePlan {
    pub factor: f64,
    pub width: u32,
    pub height: u32,
}

impl DownscalePlan {
    /// Fits `natural` into a `max_dimension` square with the viewport fit rule.
    ///
    /// The factor keeps the one-decimal rounding of that rule, so small images
    /// are scaled up, and it never drops below 0.1.
    pub fn for_image(natural: Size, max_dimension: u32) -> Option<Self> {
        let bound = f64::from(max_dimension.max(1));
        let fit = fit_to_viewport(natural, Size::new(bound, bound))?;
        let factor = fit.scale.max(MIN_DOWNSCALE_FACTOR);
        Some(Self {
            factor,
            width: scaled_dimension(natural.width, factor),
            height: scaled_dimension(natural.height, factor),
        })
    }
}

fn scaled_dimension(value: f64, factor: f64) -> u32 {
    (value * factor).round().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Resizes `image` to the plan and returns it as a JPEG data URL.
pub fn encode_resized_jpeg(image: &DynamicImage, plan: &DownscalePlan) -> DetectionResult<String> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DetectionError::EmptyImage);
    }
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, plan.width, plan.height, FilterType::Triangle);
    let mut bytes = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    DynamicImage::ImageRgb8(resized).write_with_encoder(encoder)?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        BASE64.encode(bytes.into_inner())
    ))
}
