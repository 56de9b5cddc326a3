use crate::annotation::AnnotationError;
use crate::detection::DetectionError;
use crate::export::ExportError;
use crate::state::StateError;
use crate::tags::TagError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Tags(#[from] TagError),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("application exited with status {0}")]
    Exit(i32),
}
