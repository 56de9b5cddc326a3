pub mod style;
pub mod widgets;

pub use style::{install_runtime_css, runtime_css, tag_css_class, StyleTokens, LAYOUT_TOKENS};
pub use widgets::{icon_button, icon_toggle_button, label_toggle_button};
