use thiserror::Error;

use super::model::{Annotation, Author, BoxKey, KeyGenerator};
use crate::geometry::ImageRect;
use crate::tags::Tag;

#[derive(Debug, Error, PartialEq)]
pub enum AnnotationError {
    #[error("box has no area: {width}x{height}")]
    ZeroArea { width: f64, height: f64 },
    #[error("box geometry is not finite")]
    NonFinite,
    #[error("score {score} is outside 0..=1")]
    ScoreOutOfRange { score: f64 },
}

pub type AnnotationResult<T> = std::result::Result<T, AnnotationError>;

/// A box proposed by some source that has not been given a key yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBox {
    pub rect: ImageRect,
    pub value: String,
    pub label: String,
    pub author: Author,
    pub score: f64,
    pub rationale: Option<String>,
}

fn validate_rect(rect: ImageRect) -> AnnotationResult<()> {
    if !rect.is_finite() {
        return Err(AnnotationError::NonFinite);
    }
    if !rect.has_area() {
        return Err(AnnotationError::ZeroArea {
            width: rect.width,
            height: rect.height,
        });
    }
    Ok(())
}

/// Ordered box list of one image. Order is insertion order and drives the
/// display numbering.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    boxes: Vec<Annotation>,
    keys: KeyGenerator,
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            boxes: Vec::new(),
            keys: KeyGenerator::new("box"),
        }
    }

    fn allocate_key(&mut self) -> BoxKey {
        BoxKey::new(self.keys.next_key())
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn as_slice(&self) -> &[Annotation] {
        &self.boxes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.boxes.iter()
    }

    pub fn contains(&self, key: &BoxKey) -> bool {
        self.boxes.iter().any(|annotation| &annotation.key == key)
    }

    pub fn index_of(&self, key: &BoxKey) -> Option<usize> {
        self.boxes.iter().position(|annotation| &annotation.key == key)
    }

    /// Appends a hand-drawn box. Negative extents are normalized first.
    pub fn push_manual(&mut self, rect: ImageRect, tag: &Tag) -> AnnotationResult<&Annotation> {
        validate_rect(rect)?;
        let key = self.allocate_key();
        let index = self.boxes.len();
        self.boxes.push(Annotation::manual(key, rect, tag));
        Ok(&self.boxes[index])
    }

    /// Assigns fresh keys and appends every box, or none of them if any is invalid.
    pub fn extend_pending(&mut self, pending: Vec<PendingBox>) -> AnnotationResult<Vec<BoxKey>> {
        for entry in &pending {
            validate_rect(entry.rect)?;
            if !(0.0..=1.0).contains(&entry.score) {
                return Err(AnnotationError::ScoreOutOfRange { score: entry.score });
            }
        }

        let mut keys = Vec::with_capacity(pending.len());
        for entry in pending {
            let rect = entry.rect.normalized();
            let key = self.allocate_key();
            keys.push(key.clone());
            self.boxes.push(Annotation {
                key,
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                value: entry.value,
                label: entry.label,
                author: entry.author,
                score: entry.score,
                rationale: entry.rationale,
            });
        }
        Ok(keys)
    }

    pub fn remove(&mut self, key: &BoxKey) -> Option<Annotation> {
        let index = self.index_of(key)?;
        Some(self.boxes.remove(index))
    }

    /// Drops every box and returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.boxes.len();
        self.boxes.clear();
        removed
    }

    pub fn by_author(&self, author: Author) -> impl Iterator<Item = &Annotation> {
        self.boxes
            .iter()
            .filter(move |annotation| annotation.author == author)
    }
}
