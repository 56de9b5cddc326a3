use crate::annotation::ImageKey;

/// What the shell has to refresh after a session call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionUpdate {
    pub redraw: bool,
    /// The active image's box list changed (chip row, export counts).
    pub store_changed: bool,
    /// Mode, active tag or detection state changed.
    pub toolbar_changed: bool,
    /// Image list, selection or done markers changed.
    pub list_changed: bool,
    /// The active image changed and its pixels must be decoded.
    pub image_changed: bool,
    pub detect_requested: bool,
}

impl SessionUpdate {
    pub const fn none() -> Self {
        Self {
            redraw: false,
            store_changed: false,
            toolbar_changed: false,
            list_changed: false,
            image_changed: false,
            detect_requested: false,
        }
    }

    pub const fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::none()
        }
    }

    pub const fn store() -> Self {
        Self {
            redraw: true,
            store_changed: true,
            ..Self::none()
        }
    }

    pub const fn toolbar() -> Self {
        Self {
            toolbar_changed: true,
            ..Self::none()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            redraw: self.redraw || other.redraw,
            store_changed: self.store_changed || other.store_changed,
            toolbar_changed: self.toolbar_changed || other.toolbar_changed,
            list_changed: self.list_changed || other.list_changed,
            image_changed: self.image_changed || other.image_changed,
            detect_requested: self.detect_requested || other.detect_requested,
        }
    }
}

/// How a finished detection was applied.
#[derive(Debug)]
pub enum DetectionMerge {
    Merged { key: ImageKey, added: usize },
    /// The user moved to another image before the result arrived.
    Discarded { key: ImageKey },
    Failed {
        key: ImageKey,
        error: crate::detection::DetectionError,
    },
}

/// Paths accepted by [`super::LabellingSession::add_paths`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddedImages {
    pub added: Vec<ImageKey>,
    pub skipped: usize,
}
