//! Immediate-mode canvas rendering.
//!
//! Every change rebuilds a [`RenderPlan`] from scratch: the commands are in
//! image space and the plan carries the view transform, so the painter only
//! has to translate by the pan offset and scale once. Sizes that must look
//! constant on screen (stroke width, font size, chip height and padding) are
//! divided by the scale while building the plan.

mod cairo;

pub use cairo::{paint_plan, CairoTextMeasure};

use crate::annotation::{Annotation, BoxKey};
use crate::geometry::{Color, ImagePoint, ImageRect, PanOffset};
use crate::tags::{Tag, TagVocabulary};

const DEFAULT_LINE_WIDTH: f64 = 2.0;
const DEFAULT_FONT_SIZE: f64 = 12.0;
const DEFAULT_CHIP_HEIGHT: f64 = 18.0;
const DEFAULT_CHIP_PADDING: f64 = 4.0;

/// Screen-pixel metrics and the hover colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub highlight: Color,
    pub line_width: f64,
    pub font_size: f64,
    pub chip_height: f64,
    pub chip_padding: f64,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            highlight: Color::RED,
            line_width: DEFAULT_LINE_WIDTH,
            font_size: DEFAULT_FONT_SIZE,
            chip_height: DEFAULT_CHIP_HEIGHT,
            chip_padding: DEFAULT_CHIP_PADDING,
        }
    }
}

impl RenderStyle {
    pub fn with_highlight(highlight: Color) -> Self {
        Self {
            highlight,
            ..Self::default()
        }
    }
}

/// Measures the advance width of `text` at `font_size` in the same units.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    StrokeRect {
        rect: ImageRect,
        color: Color,
        line_width: f64,
    },
    FillRect {
        rect: ImageRect,
        color: Color,
    },
    /// `origin` is the baseline start of the text.
    Text {
        origin: ImagePoint,
        text: String,
        color: Color,
        font_size: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub scale: f64,
    pub pan: PanOffset,
    pub commands: Vec<DrawCommand>,
}

impl RenderPlan {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

pub struct RenderInput<'a> {
    pub boxes: &'a [Annotation],
    pub tags: &'a TagVocabulary,
    pub hover: Option<&'a BoxKey>,
    /// In-progress rectangle, possibly with negative extents.
    pub draft: Option<ImageRect>,
    pub active_tag: &'a Tag,
    pub scale: f64,
    pub pan: PanOffset,
    pub style: RenderStyle,
}

fn chip_text_color(fill: Color) -> Color {
    if fill.is_light() {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

fn push_box(
    commands: &mut Vec<DrawCommand>,
    annotation: &Annotation,
    index: usize,
    input: &RenderInput<'_>,
    measure: &dyn TextMeasure,
) {
    let scale = input.scale;
    let style = input.style;
    let tag_color = input.tags.resolve(&annotation.value).color;
    let hovered = input.hover == Some(&annotation.key);
    let rect = annotation.rect();

    commands.push(DrawCommand::StrokeRect {
        rect,
        color: if hovered { style.highlight } else { tag_color },
        line_width: style.line_width / scale,
    });

    let text = annotation.display_label(index);
    let font_size = style.font_size / scale;
    let padding = style.chip_padding / scale;
    let chip_height = style.chip_height / scale;
    let chip_width = measure.text_width(&text, font_size) + padding * 2.0;
    commands.push(DrawCommand::FillRect {
        rect: ImageRect::new(rect.x, rect.y - chip_height, chip_width, chip_height),
        color: tag_color,
    });
    commands.push(DrawCommand::Text {
        origin: ImagePoint::new(rect.x + padding, rect.y - padding),
        text,
        color: chip_text_color(tag_color),
        font_size,
    });
}

/// Builds the full frame: every box in list order, then the draft on top.
pub fn build_render_plan(input: &RenderInput<'_>, measure: &dyn TextMeasure) -> RenderPlan {
    debug_assert!(input.scale > 0.0, "render scale must be positive");
    let mut commands = Vec::with_capacity(input.boxes.len() * 3 + 1);
    for (index, annotation) in input.boxes.iter().enumerate() {
        push_box(&mut commands, annotation, index, input, measure);
    }
    if let Some(draft) = input.draft {
        commands.push(DrawCommand::StrokeRect {
            rect: draft,
            color: input.active_tag.color,
            line_width: input.style.line_width / input.scale,
        });
    }
    RenderPlan {
        scale: input.scale,
        pan: input.pan,
        commands,
    }
}
