use crate::geometry::{ImagePoint, ImageRect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Select,
    Pan,
}

impl InteractionMode {
    pub const fn idle_state(self) -> InteractionState {
        match self {
            Self::Select => InteractionState::SelectIdle,
            Self::Pan => InteractionState::PanIdle,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Pan => "pan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    SelectIdle,
    SelectDrawing,
    PanIdle,
    PanDragging,
}

impl InteractionState {
    pub const fn mode(self) -> InteractionMode {
        match self {
            Self::SelectIdle | Self::SelectDrawing => InteractionMode::Select,
            Self::PanIdle | Self::PanDragging => InteractionMode::Pan,
        }
    }

    pub const fn is_drawing(self) -> bool {
        matches!(self, Self::SelectDrawing)
    }

    pub const fn is_dragging(self) -> bool {
        matches!(self, Self::PanDragging)
    }
}

/// Box being dragged out in select mode. The extents are signed: a negative
/// width means the pointer moved left of the anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftBox {
    pub anchor: ImagePoint,
    pub width: f64,
    pub height: f64,
}

impl DraftBox {
    pub const fn at(anchor: ImagePoint) -> Self {
        Self {
            anchor,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn stretch_to(&mut self, point: ImagePoint) {
        self.width = point.x - self.anchor.x;
        self.height = point.y - self.anchor.y;
    }

    /// Raw geometry, as drawn while dragging.
    pub fn rect(&self) -> ImageRect {
        ImageRect::new(self.anchor.x, self.anchor.y, self.width, self.height)
    }

    /// Geometry to store, `None` for a zero-area draw.
    pub fn committed_rect(&self) -> Option<ImageRect> {
        let rect = self.rect();
        rect.has_area().then(|| rect.normalized())
    }
}
