use gtk4::prelude::*;

/// Something attached to a widget that must come off again.
pub(super) trait Detach {
    fn detach(&mut self);
}

/// Event controller added to a widget for the lifetime of a scope.
pub(super) struct ControllerHandle {
    widget: gtk4::Widget,
    controller: gtk4::EventController,
    attached: bool,
}

impl ControllerHandle {
    pub(super) fn attach<W, C>(widget: &W, controller: C) -> Self
    where
        W: IsA<gtk4::Widget>,
        C: IsA<gtk4::EventController>,
    {
        let widget = widget.clone().upcast::<gtk4::Widget>();
        let controller = controller.upcast::<gtk4::EventController>();
        widget.add_controller(controller.clone());
        Self {
            widget,
            controller,
            attached: true,
        }
    }
}

impl Detach for ControllerHandle {
    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.widget.remove_controller(&self.controller);
    }
}

/// Owns the controllers registered for the active image. Dropping the scope
/// detaches them all, so an image switch or window close never leaves a
/// stale handler behind.
#[derive(Default)]
pub(super) struct ListenerScope {
    handles: Vec<Box<dyn Detach>>,
}

impl ListenerScope {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn push(&mut self, handle: impl Detach + 'static) {
        self.handles.push(Box::new(handle));
    }

    pub(super) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(super) fn detach_all(&mut self) {
        let count = self.handles.len();
        // Reverse registration order.
        while let Some(mut handle) = self.handles.pop() {
            handle.detach();
        }
        if count > 0 {
            tracing::debug!(count, "detached listeners");
        }
    }
}

impl Drop for ListenerScope {
    fn drop(&mut self) {
        self.detach_all();
    }
}
