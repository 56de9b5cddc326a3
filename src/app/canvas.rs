use std::rc::Rc;

use gtk4::cairo::Context;
use gtk4::gdk::prelude::GdkCairoContextExt;
use gtk4::glib::Propagation;
use gtk4::prelude::*;

use super::input_bridge::{normalize_shortcut_key, shortcut_modifiers};
use super::listeners::{ControllerHandle, ListenerScope};
use super::window::canvas_placeholder_text;
use super::ShellRuntime;
use crate::geometry::{ScreenPoint, Size};
use crate::input::{resolve_key_release, resolve_shortcut};
use crate::render::{paint_plan, CairoTextMeasure};

const CANVAS_BACKGROUND: (f64, f64, f64) = (0.17, 0.17, 0.19);
const PLACEHOLDER_FONT_SIZE: f64 = 15.0;
const LOAD_FAILED_TEXT: &str = "Could not load this image";

fn draw_placeholder(context: &Context, text: &str, width: i32, height: i32) {
    context.save().ok();
    context.set_source_rgb(0.75, 0.75, 0.78);
    context.select_font_face(
        "Sans",
        gtk4::cairo::FontSlant::Normal,
        gtk4::cairo::FontWeight::Normal,
    );
    context.set_font_size(PLACEHOLDER_FONT_SIZE);
    let text_width = context
        .text_extents(text)
        .map(|extents| extents.x_advance())
        .unwrap_or(0.0);
    context.move_to(
        ((f64::from(width) - text_width) / 2.0).max(0.0),
        f64::from(height) / 2.0,
    );
    context.show_text(text).ok();
    context.restore().ok();
}

fn paint_canvas(runtime: &ShellRuntime, context: &Context, width: i32, height: i32) {
    let (r, g, b) = CANVAS_BACKGROUND;
    context.set_source_rgb(r, g, b);
    context.paint().ok();

    let Ok(session) = runtime.session.try_borrow() else {
        tracing::debug!("session busy during draw; skipping frame");
        return;
    };
    if runtime.load_failed_for(session.active_key()) {
        draw_placeholder(context, LOAD_FAILED_TEXT, width, height);
        return;
    }
    if let Some(text) = canvas_placeholder_text(&session) {
        draw_placeholder(context, text, width, height);
        return;
    }

    if let Some(pixbuf) = runtime.pixbuf.borrow().as_ref() {
        let viewport = session.viewport();
        let pan = viewport.pan();
        context.save().ok();
        context.translate(pan.x, pan.y);
        context.scale(viewport.scale(), viewport.scale());
        context.set_source_pixbuf(pixbuf, 0.0, 0.0);
        context.paint().ok();
        context.restore().ok();
    }

    let measure = CairoTextMeasure::new(context);
    if let Some(plan) = session.render_plan(&measure) {
        paint_plan(context, &plan);
    }
}

/// Draw function and size tracking for the canvas. Installed once per window.
pub(super) fn install_canvas(runtime: &Rc<ShellRuntime>) {
    let canvas = &runtime.widgets.canvas;
    {
        let runtime = Rc::downgrade(runtime);
        canvas.set_draw_func(move |_, context, width, height| {
            if width <= 0 || height <= 0 {
                return;
            }
            if let Some(runtime) = runtime.upgrade() {
                paint_canvas(&runtime, context, width, height);
            }
        });
    }
    {
        let runtime = Rc::downgrade(runtime);
        canvas.connect_resize(move |_, width, height| {
            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            let canvas = Size::new(f64::from(width.max(0)), f64::from(height.max(0)));
            tracing::debug!(width, height, "canvas resized");
            runtime.dispatch(|session| session.resize(canvas));
        });
    }
}

/// Pointer and keyboard controllers for the active image. The drag gesture
/// keeps reporting once the pointer leaves the canvas, so a draw or pan that
/// ends outside still finishes. Dropping the returned scope removes both.
pub(super) fn attach_image_listeners(runtime: &Rc<ShellRuntime>) -> ListenerScope {
    let mut scope = ListenerScope::new();

    let drag = gtk4::GestureDrag::new();
    drag.set_button(gtk4::gdk::BUTTON_PRIMARY);
    {
        let runtime = Rc::downgrade(runtime);
        drag.connect_drag_begin(move |_, x, y| {
            if let Some(runtime) = runtime.upgrade() {
                runtime.widgets.canvas.grab_focus();
                runtime.dispatch(|session| session.pointer_down(ScreenPoint::new(x, y)));
            }
        });
    }
    {
        let runtime = Rc::downgrade(runtime);
        drag.connect_drag_update(move |gesture, offset_x, offset_y| {
            let (Some(runtime), Some((start_x, start_y))) = (runtime.upgrade(), gesture.start_point())
            else {
                return;
            };
            let point = ScreenPoint::new(start_x + offset_x, start_y + offset_y);
            runtime.dispatch(|session| session.pointer_move(point));
        });
    }
    {
        let runtime = Rc::downgrade(runtime);
        drag.connect_drag_end(move |gesture, offset_x, offset_y| {
            let (Some(runtime), Some((start_x, start_y))) = (runtime.upgrade(), gesture.start_point())
            else {
                return;
            };
            let point = ScreenPoint::new(start_x + offset_x, start_y + offset_y);
            runtime.dispatch(|session| session.pointer_up(point));
        });
    }
    scope.push(ControllerHandle::attach(&runtime.widgets.canvas, drag));

    let keys = gtk4::EventControllerKey::new();
    keys.set_propagation_phase(gtk4::PropagationPhase::Capture);
    {
        let runtime = Rc::downgrade(runtime);
        keys.connect_key_pressed(move |_, key, keycode, modifier| {
            let Some(runtime) = runtime.upgrade() else {
                return Propagation::Proceed;
            };
            let Some(shortcut) = normalize_shortcut_key(key, keycode) else {
                return Propagation::Proceed;
            };
            let Ok(context) = runtime
                .session
                .try_borrow()
                .map(|session| session.input_context())
            else {
                return Propagation::Proceed;
            };
            match resolve_shortcut(shortcut, shortcut_modifiers(modifier), context) {
                Some(action) => {
                    tracing::debug!(?action, "shortcut");
                    runtime.dispatch(|session| session.apply_shortcut(action));
                    Propagation::Stop
                }
                None => Propagation::Proceed,
            }
        });
    }
    {
        let runtime = Rc::downgrade(runtime);
        keys.connect_key_released(move |_, key, keycode, _| {
            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            let Some(shortcut) = normalize_shortcut_key(key, keycode) else {
                return;
            };
            let Ok(context) = runtime
                .session
                .try_borrow()
                .map(|session| session.input_context())
            else {
                return;
            };
            if let Some(action) = resolve_key_release(shortcut, context) {
                runtime.dispatch(|session| session.apply_shortcut(action));
            }
        });
    }
    scope.push(ControllerHandle::attach(&runtime.widgets.window, keys));

    tracing::debug!(count = scope.len(), "attached image listeners");
    scope
}
