use std::path::Path;

use gtk4::gdk_pixbuf::{Colorspace, Pixbuf};
use gtk4::glib;
use thiserror::Error;

use crate::geometry::Size;

#[derive(Debug, Error)]
pub(super) enum ImageLoadError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image dimensions {width}x{height} exceed pixbuf limits")]
    TooLarge { width: u32, height: u32 },
}

/// RGBA pixels decoded off the main thread. A `Pixbuf` is not `Send`, so
/// the conversion happens once the bytes are back on the GTK loop.
#[derive(Debug)]
pub(super) struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    pub(super) fn natural_size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    pub(super) fn into_pixbuf(self) -> Result<Pixbuf, ImageLoadError> {
        let too_large = || ImageLoadError::TooLarge {
            width: self.width,
            height: self.height,
        };
        let width = i32::try_from(self.width).map_err(|_| too_large())?;
        let height = i32::try_from(self.height).map_err(|_| too_large())?;
        let rowstride = width.checked_mul(4).ok_or_else(too_large)?;
        let bytes = glib::Bytes::from_owned(self.pixels);
        Ok(Pixbuf::from_bytes(
            &bytes,
            Colorspace::Rgb,
            true,
            8,
            width,
            height,
            rowstride,
        ))
    }
}

pub(super) fn decode_image_file(path: &Path) -> Result<DecodedImage, ImageLoadError> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    tracing::debug!(path = %path.display(), width, height, "decoded image");
    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
