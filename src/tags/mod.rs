//! Ordered tag vocabulary. Digit key `N` binds to the Nth entry, so the order
//! must stay fixed for the lifetime of a session.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::Color;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub value: String,
    pub label: String,
    pub color: Color,
}

impl Tag {
    pub fn new(value: impl Into<String>, label: impl Into<String>, color: Color) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            color,
        }
    }
}

/// Tag entry as written in `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagConfig {
    pub value: String,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag vocabulary is empty")]
    Empty,
    #[error("duplicate tag value: {value}")]
    DuplicateValue { value: String },
    #[error("invalid color {color:?} for tag {value}")]
    InvalidColor { value: String, color: String },
    #[error("tag value is blank")]
    BlankValue,
}

pub type TagResult<T> = std::result::Result<T, TagError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVocabulary {
    tags: Vec<Tag>,
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self::default_ui_tags()
    }
}

impl TagVocabulary {
    pub fn new(tags: Vec<Tag>) -> TagResult<Self> {
        if tags.is_empty() {
            return Err(TagError::Empty);
        }
        let mut seen = HashSet::new();
        for tag in &tags {
            if tag.value.trim().is_empty() {
                return Err(TagError::BlankValue);
            }
            if !seen.insert(tag.value.as_str()) {
                return Err(TagError::DuplicateValue {
                    value: tag.value.clone(),
                });
            }
        }
        Ok(Self { tags })
    }

    pub fn from_config(entries: &[TagConfig]) -> TagResult<Self> {
        let tags = entries
            .iter()
            .map(|entry| {
                let color = Color::from_hex(&entry.color).ok_or_else(|| TagError::InvalidColor {
                    value: entry.value.clone(),
                    color: entry.color.clone(),
                })?;
                Ok(Tag::new(entry.value.clone(), entry.label.clone(), color))
            })
            .collect::<TagResult<Vec<_>>>()?;
        Self::new(tags)
    }

    /// Built-in UI component tags.
    pub fn default_ui_tags() -> Self {
        Self {
            tags: vec![
                Tag::new("button", "Button", Color::new(0x4A, 0x90, 0xE2)),
                Tag::new("input", "Input", Color::new(0x50, 0xE3, 0xC2)),
                Tag::new("radio", "Radio", Color::new(0x9B, 0x59, 0xB6)),
                Tag::new("dropdown", "Dropdown", Color::new(0xF1, 0xC4, 0x0F)),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    /// Tag bound to the 1-based digit key, if the vocabulary is long enough.
    pub fn by_digit(&self, digit: u32) -> Option<&Tag> {
        let index = usize::try_from(digit).ok()?.checked_sub(1)?;
        self.tags.get(index)
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        self.tags.iter().position(|tag| tag.value == value)
    }

    pub fn find(&self, value: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.value == value)
    }

    /// Tag for `value`, falling back to the first entry for unknown values.
    pub fn resolve(&self, value: &str) -> &Tag {
        self.find(value).unwrap_or(&self.tags[0])
    }

    pub fn first(&self) -> &Tag {
        &self.tags[0]
    }
}
