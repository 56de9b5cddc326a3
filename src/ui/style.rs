use gtk4::CssProvider;

use crate::geometry::Color;
use crate::tags::TagVocabulary;

/// Compile-time layout tokens, not user-overridable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleTokens {
    pub spacing_4: i32,
    pub spacing_8: i32,
    pub spacing_12: i32,
    pub control_radius: u16,
    pub control_size: i32,
    pub border_width: u16,
    pub sidebar_width: i32,
    pub window_default_width: i32,
    pub window_default_height: i32,
    pub canvas_min_width: i32,
    pub canvas_min_height: i32,
}

pub const LAYOUT_TOKENS: StyleTokens = StyleTokens {
    spacing_4: 4,
    spacing_8: 8,
    spacing_12: 12,
    control_radius: 8,
    control_size: 36,
    border_width: 1,
    sidebar_width: 220,
    window_default_width: 1280,
    window_default_height: 800,
    canvas_min_width: 480,
    canvas_min_height: 320,
};

/// CSS class carrying the colour of the tag at `index`.
pub fn tag_css_class(index: usize) -> String {
    format!("uilabel-tag-{index}")
}

fn text_on(color: Color) -> &'static str {
    if color.is_light() {
        "#000000"
    } else {
        "#FFFFFF"
    }
}

pub fn runtime_css(tokens: StyleTokens, tags: &TagVocabulary, highlight: Color) -> String {
    let mut css = format!(
        "
window.uilabel-root .image-list row {{
  padding: {spacing_4}px {spacing_8}px;
}}
window.uilabel-root .image-list row.done label {{
  opacity: 0.6;
}}
window.uilabel-root .tool-column {{
  padding: {spacing_8}px {spacing_4}px;
  border-right: {border_width}px solid alpha(currentColor, 0.12);
}}
window.uilabel-root .status-label {{
  opacity: 0.8;
}}
window.uilabel-root .status-label.error {{
  color: {highlight};
  opacity: 1;
}}
window.uilabel-root .box-chip {{
  border-radius: {control_radius}px;
  padding: 0 {spacing_8}px;
  min-height: 0;
}}
window.uilabel-root .box-chip.hovered {{
  box-shadow: inset 0 0 0 2px {highlight};
}}
",
        spacing_4 = tokens.spacing_4,
        spacing_8 = tokens.spacing_8,
        border_width = tokens.border_width,
        control_radius = tokens.control_radius,
        highlight = highlight.to_hex(),
    );
    for (index, tag) in tags.iter().enumerate() {
        css.push_str(&format!(
            "
window.uilabel-root .{class} {{
  border-bottom: 3px solid {color};
}}
window.uilabel-root .{class}:checked,
window.uilabel-root .box-chip.{class} {{
  background: {color};
  color: {text};
}}
",
            class = tag_css_class(index),
            color = tag.color.to_hex(),
            text = text_on(tag.color),
        ));
    }
    css
}

pub fn install_runtime_css(css: &str) {
    let provider = CssProvider::new();
    provider.load_from_data(css);
    if let Some(display) = gtk4::gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    } else {
        tracing::warn!("no display available; skipping runtime css");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_tokens_keep_required_control_size() {
        assert_eq!(LAYOUT_TOKENS.control_size, 36);
        assert!(LAYOUT_TOKENS.canvas_min_width < LAYOUT_TOKENS.window_default_width);
    }

    #[test]
    fn runtime_css_has_one_class_per_tag_with_its_colour() {
        let tags = TagVocabulary::default();
        let css = runtime_css(LAYOUT_TOKENS, &tags, Color::RED);
        for (index, tag) in tags.iter().enumerate() {
            assert!(css.contains(&format!(".{}", tag_css_class(index))));
            assert!(css.contains(&tag.color.to_hex()));
        }
        assert!(css.contains("inset 0 0 0 2px #FF0000"));
    }

    #[test]
    fn chip_text_contrasts_with_tag_colour() {
        assert_eq!(text_on(Color::from_hex("#F1C40F").expect("valid hex")), "#000000");
        assert_eq!(text_on(Color::from_hex("#4A90E2").expect("valid hex")), "#FFFFFF");
    }
}
