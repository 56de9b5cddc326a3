use gtk4::prelude::*;
use gtk4::{Button, ToggleButton};

pub fn icon_button(
    icon_name: &str,
    tooltip: &str,
    control_size: i32,
    extra_classes: &[&str],
) -> Button {
    let button = Button::from_icon_name(icon_name);
    button.set_focus_on_click(false);
    button.set_tooltip_text(Some(tooltip));
    button.add_css_class("flat");
    button.add_css_class("icon-button");
    for css_class in extra_classes {
        button.add_css_class(css_class);
    }
    button.set_size_request(control_size, control_size);
    button
}

pub fn icon_toggle_button(
    icon_name: &str,
    tooltip: &str,
    control_size: i32,
    extra_classes: &[&str],
) -> ToggleButton {
    let button = ToggleButton::new();
    button.set_icon_name(icon_name);
    button.set_focus_on_click(false);
    button.set_active(false);
    button.set_tooltip_text(Some(tooltip));
    button.add_css_class("flat");
    button.add_css_class("icon-button");
    for css_class in extra_classes {
        button.add_css_class(css_class);
    }
    button.set_size_request(control_size, control_size);
    button
}

/// Toggle with a text label, used for the numbered tag chips.
pub fn label_toggle_button(label: &str, tooltip: &str, extra_classes: &[&str]) -> ToggleButton {
    let button = ToggleButton::with_label(label);
    button.set_focus_on_click(false);
    button.set_tooltip_text(Some(tooltip));
    for css_class in extra_classes {
        button.add_css_class(css_class);
    }
    button
}
