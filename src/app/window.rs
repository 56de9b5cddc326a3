use gtk4::prelude::*;
use gtk4::{
    Align, Application, ApplicationWindow, Box as GtkBox, Button, DrawingArea, Label, ListBox,
    Orientation, PolicyType, ProgressBar, ScrolledWindow, SelectionMode, Separator, ToggleButton,
};

use crate::annotation::{readable_file_size, BoxKey, ImageUnit};
use crate::session::LabellingSession;
use crate::state::InteractionMode;
use crate::tags::TagVocabulary;
use crate::ui::{icon_button, icon_toggle_button, label_toggle_button, tag_css_class, StyleTokens};

const WINDOW_TITLE: &str = "uilabel";
const DONE_MARKER: &str = "\u{2713}";
const EMPTY_CANVAS_TEXT: &str = "Open images to start labelling";

/// Every widget the runtime updates after a session call.
#[derive(Clone)]
pub(super) struct ShellWidgets {
    pub(super) window: ApplicationWindow,
    pub(super) canvas: DrawingArea,
    pub(super) image_list: ListBox,
    pub(super) chip_row: GtkBox,
    pub(super) status_label: Label,
    pub(super) progress: ProgressBar,
    pub(super) open_button: Button,
    pub(super) export_button: Button,
    pub(super) export_json_button: Button,
    pub(super) done_button: Button,
    pub(super) detect_button: Button,
    pub(super) select_button: ToggleButton,
    pub(super) pan_button: ToggleButton,
    pub(super) clear_button: Button,
    pub(super) reset_button: Button,
    pub(super) zoom_in_button: Button,
    pub(super) zoom_out_button: Button,
    pub(super) prev_tag_button: Button,
    pub(super) next_tag_button: Button,
    pub(super) tag_buttons: Vec<ToggleButton>,
}

pub(super) fn image_row_text(image: &ImageUnit) -> String {
    let marker = if image.is_done { DONE_MARKER } else { " " };
    format!(
        "{marker} {} ({})",
        image.name,
        readable_file_size(image.size_bytes)
    )
}

pub(super) fn progress_text(session: &LabellingSession) -> String {
    let total = session.images().len();
    let done = session.images().iter().filter(|image| image.is_done).count();
    format!("{done}/{total} done ({:.0}%)", session.progress())
}

pub(super) fn tag_button_text(index: usize, label: &str) -> String {
    format!("{} {label}", index + 1)
}

pub(super) fn canvas_placeholder_text(session: &LabellingSession) -> Option<&'static str> {
    if session.active_image().is_none() {
        Some(EMPTY_CANVAS_TEXT)
    } else if !session.is_loaded() {
        Some("Loading image\u{2026}")
    } else {
        None
    }
}

fn build_tool_column(tokens: StyleTokens) -> (GtkBox, [Button; 5], [ToggleButton; 2]) {
    let size = tokens.control_size;
    let detect = icon_button("system-search-symbolic", "Detect boxes (D)", size, &[]);
    let select = icon_toggle_button("edit-select-symbolic", "Draw boxes (V)", size, &[]);
    let pan = icon_toggle_button("view-fullscreen-symbolic", "Pan (H, hold Space)", size, &[]);
    pan.set_group(Some(&select));
    select.set_active(true);
    let clear = icon_button("edit-clear-all-symbolic", "Clear all boxes", size, &[]);
    let reset = icon_button("zoom-fit-best-symbolic", "Reset position (F)", size, &[]);
    let zoom_in = icon_button("zoom-in-symbolic", "Zoom in (+)", size, &[]);
    let zoom_out = icon_button("zoom-out-symbolic", "Zoom out (-)", size, &[]);

    let column = GtkBox::new(Orientation::Vertical, tokens.spacing_4);
    column.add_css_class("tool-column");
    column.append(&detect);
    column.append(&Separator::new(Orientation::Horizontal));
    column.append(&select);
    column.append(&pan);
    column.append(&Separator::new(Orientation::Horizontal));
    column.append(&clear);
    column.append(&reset);
    column.append(&zoom_in);
    column.append(&zoom_out);
    (
        column,
        [detect, clear, reset, zoom_in, zoom_out],
        [select, pan],
    )
}

fn build_tag_bar(
    tokens: StyleTokens,
    tags: &TagVocabulary,
) -> (GtkBox, Button, Button, Vec<ToggleButton>) {
    let bar = GtkBox::new(Orientation::Horizontal, tokens.spacing_4);
    bar.add_css_class("tag-bar");
    let prev = icon_button("go-previous-symbolic", "Previous tag", tokens.control_size, &[]);
    let next = icon_button("go-next-symbolic", "Next tag", tokens.control_size, &[]);
    bar.append(&prev);

    let mut buttons: Vec<ToggleButton> = Vec::with_capacity(tags.len());
    for (index, tag) in tags.iter().enumerate() {
        let class = tag_css_class(index);
        let tooltip = format!("{} ({})", tag.label, index + 1);
        let button = label_toggle_button(
            &tag_button_text(index, &tag.label),
            &tooltip,
            &["tag-chip", class.as_str()],
        );
        if let Some(first) = buttons.first() {
            button.set_group(Some(first));
        }
        bar.append(&button);
        buttons.push(button);
    }
    if let Some(first) = buttons.first() {
        first.set_active(true);
    }
    bar.append(&next);
    (bar, prev, next, buttons)
}

pub(super) fn build_shell_window(
    app: &Application,
    tokens: StyleTokens,
    tags: &TagVocabulary,
) -> ShellWidgets {
    let window = ApplicationWindow::new(app);
    window.add_css_class("uilabel-root");
    window.set_title(Some(WINDOW_TITLE));
    window.set_default_size(tokens.window_default_width, tokens.window_default_height);

    let open_button = icon_button("document-open-symbolic", "Open images", tokens.control_size, &[]);
    let export_button = icon_button(
        "document-save-symbolic",
        "Export annotations.zip",
        tokens.control_size,
        &[],
    );
    let export_json_button = icon_button(
        "text-x-generic-symbolic",
        "Export annotations.json",
        tokens.control_size,
        &[],
    );
    let done_button = Button::with_label("Mark done");
    done_button.set_tooltip_text(Some("Toggle done (X)"));
    let progress = ProgressBar::new();
    progress.set_show_text(true);
    progress.set_valign(Align::Center);
    progress.set_hexpand(true);
    let status_label = Label::new(Some("Ready"));
    status_label.add_css_class("status-label");
    status_label.set_halign(Align::End);
    status_label.set_ellipsize(gtk4::pango::EllipsizeMode::End);

    let header = GtkBox::new(Orientation::Horizontal, tokens.spacing_8);
    header.set_margin_top(tokens.spacing_4);
    header.set_margin_bottom(tokens.spacing_4);
    header.set_margin_start(tokens.spacing_8);
    header.set_margin_end(tokens.spacing_8);
    header.append(&open_button);
    header.append(&export_button);
    header.append(&export_json_button);
    header.append(&done_button);
    header.append(&progress);
    header.append(&status_label);

    let image_list = ListBox::new();
    image_list.add_css_class("image-list");
    image_list.set_selection_mode(SelectionMode::Single);
    let list_scroll = ScrolledWindow::new();
    list_scroll.set_policy(PolicyType::Never, PolicyType::Automatic);
    list_scroll.set_size_request(tokens.sidebar_width, -1);
    list_scroll.set_child(Some(&image_list));

    let (tool_column, buttons, toggles) = build_tool_column(tokens);
    let [detect_button, clear_button, reset_button, zoom_in_button, zoom_out_button] = buttons;
    let [select_button, pan_button] = toggles;

    let canvas = DrawingArea::new();
    canvas.set_hexpand(true);
    canvas.set_vexpand(true);
    canvas.set_focusable(true);
    canvas.set_size_request(tokens.canvas_min_width, tokens.canvas_min_height);

    let (tag_bar, prev_tag_button, next_tag_button, tag_buttons) = build_tag_bar(tokens, tags);

    let chip_row = GtkBox::new(Orientation::Horizontal, tokens.spacing_4);
    chip_row.add_css_class("chip-row");
    let chip_scroll = ScrolledWindow::new();
    chip_scroll.set_policy(PolicyType::Automatic, PolicyType::Never);
    chip_scroll.set_child(Some(&chip_row));

    let canvas_column = GtkBox::new(Orientation::Vertical, tokens.spacing_4);
    canvas_column.append(&tag_bar);
    canvas_column.append(&canvas);
    canvas_column.append(&chip_scroll);

    let body = GtkBox::new(Orientation::Horizontal, 0);
    body.append(&list_scroll);
    body.append(&tool_column);
    body.append(&canvas_column);

    let root = GtkBox::new(Orientation::Vertical, 0);
    root.append(&header);
    root.append(&Separator::new(Orientation::Horizontal));
    root.append(&body);
    window.set_child(Some(&root));

    ShellWidgets {
        window,
        canvas,
        image_list,
        chip_row,
        status_label,
        progress,
        open_button,
        export_button,
        export_json_button,
        done_button,
        detect_button,
        select_button,
        pan_button,
        clear_button,
        reset_button,
        zoom_in_button,
        zoom_out_button,
        prev_tag_button,
        next_tag_button,
        tag_buttons,
    }
}

fn clear_list(list: &ListBox) {
    while let Some(child) = list.first_child() {
        list.remove(&child);
    }
}

fn clear_box(container: &GtkBox) {
    while let Some(child) = container.first_child() {
        container.remove(&child);
    }
}

impl ShellWidgets {
    pub(super) fn set_status(&self, message: &str, is_error: bool) {
        self.status_label.set_text(message);
        if is_error {
            self.status_label.add_css_class("error");
        } else {
            self.status_label.remove_css_class("error");
        }
    }

    /// Mode toggles, active tag, button sensitivity and the canvas cursor.
    pub(super) fn sync_toolbar(&self, session: &LabellingSession) {
        let has_image = session.active_image().is_some();
        let loaded = session.is_loaded();
        let detecting = session.is_detecting();
        let mode = session.mode();
        self.select_button
            .set_active(mode == InteractionMode::Select);
        self.pan_button.set_active(mode == InteractionMode::Pan);
        if let Some(button) = self.tag_buttons.get(session.active_tag_index()) {
            button.set_active(true);
        }
        self.detect_button.set_sensitive(loaded && !detecting);
        self.detect_button.set_tooltip_text(Some(if detecting {
            "Detection running\u{2026}"
        } else {
            "Detect boxes (D)"
        }));
        for button in [
            &self.clear_button,
            &self.reset_button,
            &self.zoom_in_button,
            &self.zoom_out_button,
        ] {
            button.set_sensitive(loaded);
        }
        self.done_button.set_sensitive(has_image);
        let done = session.active_image().is_some_and(|image| image.is_done);
        self.done_button
            .set_label(if done { "Mark not done" } else { "Mark done" });
        self.export_button
            .set_sensitive(!session.images().is_empty());
        self.export_json_button
            .set_sensitive(!session.images().is_empty());
        let cursor = match (loaded, mode, session.machine().is_pan_held()) {
            (false, _, _) => None,
            (true, InteractionMode::Pan, _) | (true, _, true) => Some("grab"),
            (true, InteractionMode::Select, false) => Some("crosshair"),
        };
        self.canvas.set_cursor_from_name(cursor);
    }

    /// Rebuilds the image list rows and the progress bar.
    pub(super) fn rebuild_image_list(&self, session: &LabellingSession) {
        clear_list(&self.image_list);
        for (index, image) in session.images().iter().enumerate() {
            let label = Label::new(Some(&image_row_text(image)));
            label.set_halign(Align::Start);
            label.set_xalign(0.0);
            label.set_ellipsize(gtk4::pango::EllipsizeMode::Middle);
            label.set_tooltip_text(Some(&image.path.display().to_string()));
            self.image_list.append(&label);
            if let Some(row) = self.image_list.row_at_index(index as i32) {
                if image.is_done {
                    row.add_css_class("done");
                }
                if session.active_index() == Some(index) {
                    self.image_list.select_row(Some(&row));
                }
            }
        }
        self.progress.set_fraction(session.progress() / 100.0);
        self.progress.set_text(Some(&progress_text(session)));
    }

    /// Rebuilds the chip row from the active image's boxes. `on_chip` wires
    /// hover and click handlers onto each new chip.
    pub(super) fn rebuild_chip_row(
        &self,
        session: &LabellingSession,
        on_chip: &dyn Fn(&Button, &BoxKey),
    ) {
        clear_box(&self.chip_row);
        let Some(image) = session.active_image() else {
            return;
        };
        let hovered = session.hover();
        for (index, annotation) in image.annotations.iter().enumerate() {
            let button = Button::with_label(&annotation.display_label(index));
            button.set_focus_on_click(false);
            button.add_css_class("box-chip");
            if let Some(tag_index) = session.tags().position(&annotation.value) {
                button.add_css_class(&tag_css_class(tag_index));
            }
            if hovered == Some(&annotation.key) {
                button.add_css_class("hovered");
            }
            let tooltip = match annotation.rationale.as_deref() {
                Some(rationale) => format!("{} by {}: {rationale}", annotation.label, annotation.author),
                None => format!("{} by {}; click to delete", annotation.label, annotation.author),
            };
            button.set_tooltip_text(Some(&tooltip));
            on_chip(&button, &annotation.key);
            self.chip_row.append(&button);
        }
    }

    pub(super) fn sync_chip_hover(&self, session: &LabellingSession) {
        let Some(image) = session.active_image() else {
            return;
        };
        let hovered = session.hover();
        let mut child = self.chip_row.first_child();
        for annotation in image.annotations.iter() {
            let Some(widget) = child else {
                break;
            };
            if hovered == Some(&annotation.key) {
                widget.add_css_class("hovered");
            } else {
                widget.remove_css_class("hovered");
            }
            child = widget.next_sibling();
        }
    }
}
