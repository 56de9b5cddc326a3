//! Boxes, per-image box lists and the images they belong to.

mod image;
mod model;
mod store;

pub use image::{is_supported_image_path, readable_file_size, ImageKey, ImageUnit};
pub use model::{Annotation, Author, BoxKey, KeyGenerator};
pub use store::{AnnotationError, AnnotationResult, AnnotationStore, PendingBox};
