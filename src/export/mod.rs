//! Ground-truth / prediction export.
//!
//! Boxes are split by author: hand-drawn boxes are ground truth, model boxes
//! are predictions. Each image becomes one JSON record per side.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::annotation::{Annotation, Author, ImageUnit};

pub const ARCHIVE_FILE_NAME: &str = "annotations.zip";
pub const COMBINED_FILE_NAME: &str = "annotations.json";
const GROUND_TRUTH_DIR: &str = "ground_truth";
const PREDICTION_DIR: &str = "prediction";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no images to export")]
    NothingToExport,
    #[error("failed to write export: {0}")]
    Io(#[from] io::Error),
    #[error("failed to build archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportImage {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportBbox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportAnnotation {
    pub id: String,
    pub label: String,
    pub value: String,
    pub bbox: ExportBbox,
    pub author: Author,
    pub score: f64,
}

impl From<&Annotation> for ExportAnnotation {
    fn from(annotation: &Annotation) -> Self {
        Self {
            id: format!("{}-{}", annotation.author, annotation.key),
            label: annotation.label.clone(),
            value: annotation.value.clone(),
            bbox: ExportBbox {
                x: annotation.x,
                y: annotation.y,
                width: annotation.width,
                height: annotation.height,
            },
            author: annotation.author,
            score: annotation.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub image: ExportImage,
    pub annotations: Vec<ExportAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportPartition {
    pub ground_truth: ImageRecord,
    pub prediction: ImageRecord,
}

fn image_record(image: &ImageUnit, author: Author) -> ImageRecord {
    ImageRecord {
        image: ExportImage {
            id: image.key.to_string(),
            name: image.name.clone(),
        },
        annotations: image
            .annotations
            .by_author(author)
            .map(ExportAnnotation::from)
            .collect(),
    }
}

pub fn partition(image: &ImageUnit) -> ExportPartition {
    ExportPartition {
        ground_truth: image_record(image, Author::Manual),
        prediction: image_record(image, Author::Llm),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub images: usize,
    pub ground_truth: usize,
    pub prediction: usize,
}

/// File stems in image order. A stem already handed out, whether from a
/// repeated name or from a file literally named `home_1`, gets the first
/// free `_1`, `_2`, ... suffix.
fn unique_stems(images: &[ImageUnit]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    images
        .iter()
        .map(|image| {
            let stem = image.stem();
            let mut candidate = stem.clone();
            let mut suffix = 1usize;
            while taken.contains(&candidate) {
                candidate = format!("{stem}_{suffix}");
                suffix += 1;
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Writes `ground_truth/<stem>.json` and `prediction/<stem>.json` for every
/// image into a zip archive and returns the writer.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    images: &[ImageUnit],
) -> ExportResult<(W, ExportSummary)> {
    if images.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut summary = ExportSummary::default();

    for (image, stem) in images.iter().zip(unique_stems(images)) {
        let ExportPartition {
            ground_truth,
            prediction,
        } = partition(image);
        summary.images += 1;
        summary.ground_truth += ground_truth.annotations.len();
        summary.prediction += prediction.annotations.len();

        zip.start_file(format!("{GROUND_TRUTH_DIR}/{stem}.json"), options)?;
        zip.write_all(&serde_json::to_vec_pretty(&ground_truth)?)?;
        zip.start_file(format!("{PREDICTION_DIR}/{stem}.json"), options)?;
        zip.write_all(&serde_json::to_vec_pretty(&prediction)?)?;
    }

    let writer = zip.finish()?;
    Ok((writer, summary))
}

pub fn write_archive_file(path: &Path, images: &[ImageUnit]) -> ExportResult<ExportSummary> {
    let file = BufWriter::new(File::create(path)?);
    let (mut writer, summary) = write_archive(file, images)?;
    writer.flush()?;
    tracing::info!(
        path = %path.display(),
        images = summary.images,
        ground_truth = summary.ground_truth,
        prediction = summary.prediction,
        "annotations exported"
    );
    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedImage {
    pub image: ExportImage,
    pub ground_truth: Vec<ExportAnnotation>,
    pub prediction: Vec<ExportAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedDocument {
    pub images: Vec<CombinedImage>,
}

/// Every image with both sides in a single document.
pub fn combined_document(images: &[ImageUnit]) -> CombinedDocument {
    CombinedDocument {
        images: images
            .iter()
            .map(|image| {
                let ExportPartition {
                    ground_truth,
                    prediction,
                } = partition(image);
                CombinedImage {
                    image: ground_truth.image,
                    ground_truth: ground_truth.annotations,
                    prediction: prediction.annotations,
                }
            })
            .collect(),
    }
}

/// Writes the combined document as pretty JSON and returns how many images it holds.
pub fn write_combined_file(path: &Path, images: &[ImageUnit]) -> ExportResult<usize> {
    if images.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    let document = combined_document(images);
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writer.flush()?;
    tracing::info!(path = %path.display(), images = document.images.len(), "combined document exported");
    Ok(document.images.len())
}
