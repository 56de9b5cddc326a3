use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::ImageRect;
use crate::tags::Tag;

/// Provenance of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    Manual,
    Llm,
}

impl Author {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Llm => "llm",
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque box identity, unique within one image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoxKey(String);

impl BoxKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A committed bounding box in natural image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub key: BoxKey,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub value: String,
    pub label: String,
    pub author: Author,
    pub score: f64,
    pub rationale: Option<String>,
}

impl Annotation {
    /// Human-drawn box; the rectangle is normalized to a top-left origin.
    pub fn manual(key: BoxKey, rect: ImageRect, tag: &Tag) -> Self {
        let rect = rect.normalized();
        Self {
            key,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            value: tag.value.clone(),
            label: tag.label.clone(),
            author: Author::Manual,
            score: 1.0,
            rationale: None,
        }
    }

    pub fn rect(&self) -> ImageRect {
        ImageRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn score_percent(&self) -> i64 {
        (self.score * 100.0).round() as i64
    }

    /// Text shown on the canvas chip and in the box list, `index` is the list position.
    pub fn display_label(&self, index: usize) -> String {
        format!("{}_{} ({}%)", self.label, index, self.score_percent())
    }
}

/// Monotonic key source, `"{prefix}-{n}"`.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prefix: String,
    counter: u64,
}

impl KeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
        }
    }

    pub fn next_key(&mut self) -> String {
        self.counter = self.counter.saturating_add(1);
        format!("{}-{}", self.prefix, self.counter)
    }
}
