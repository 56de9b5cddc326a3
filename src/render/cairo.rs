use gtk4::cairo::{Context, FontSlant, FontWeight};

use super::{DrawCommand, RenderPlan, TextMeasure};
use crate::geometry::Color;

const CHIP_FONT_FAMILY: &str = "Sans";

fn select_chip_font(context: &Context, font_size: f64) {
    context.select_font_face(CHIP_FONT_FAMILY, FontSlant::Normal, FontWeight::Bold);
    context.set_font_size(font_size.max(f64::EPSILON));
}

fn set_source_color(context: &Context, color: Color) {
    let (r, g, b) = color.to_cairo_rgb();
    context.set_source_rgb(r, g, b);
}

/// Measures chip labels with the context the frame is painted on.
pub struct CairoTextMeasure<'a> {
    context: &'a Context,
}

impl<'a> CairoTextMeasure<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }
}

impl TextMeasure for CairoTextMeasure<'_> {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        self.context.save().ok();
        select_chip_font(self.context, font_size);
        let width = self
            .context
            .text_extents(text)
            .map(|extents| extents.x_advance())
            .unwrap_or_else(|_| text.chars().count() as f64 * font_size * 0.6);
        self.context.restore().ok();
        width
    }
}

/// Replays `plan` in image space: translate by the pan offset, then scale.
pub fn paint_plan(context: &Context, plan: &RenderPlan) {
    context.save().ok();
    context.translate(plan.pan.x, plan.pan.y);
    context.scale(plan.scale, plan.scale);
    for command in &plan.commands {
        match command {
            DrawCommand::StrokeRect {
                rect,
                color,
                line_width,
            } => {
                set_source_color(context, *color);
                context.set_line_width(*line_width);
                context.rectangle(rect.x, rect.y, rect.width, rect.height);
                let _ = context.stroke();
            }
            DrawCommand::FillRect { rect, color } => {
                set_source_color(context, *color);
                context.rectangle(rect.x, rect.y, rect.width, rect.height);
                let _ = context.fill();
            }
            DrawCommand::Text {
                origin,
                text,
                color,
                font_size,
            } => {
                set_source_color(context, *color);
                select_chip_font(context, *font_size);
                context.move_to(origin.x, origin.y);
                let _ = context.show_text(text);
            }
        }
    }
    context.restore().ok();
}
