use std::cell::{Cell, RefCell};
use std::ffi::OsString;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use gtk4::gdk_pixbuf::Pixbuf;
use gtk4::prelude::*;
use gtk4::{gio, Application, Button};

use crate::annotation::{BoxKey, ImageKey};
use crate::config::{AppConfig, DetectionConfig};
use crate::detection::{DetectionClient, DetectionError, DetectionOutcome, HttpDetectionClient};
use crate::error::{AppError, AppResult};
use crate::export::{
    write_archive_file, write_combined_file, ARCHIVE_FILE_NAME, COMBINED_FILE_NAME,
};
use crate::notification;
use crate::session::{DetectionMerge, LabellingSession, SessionUpdate};
use crate::state::InteractionMode;
use crate::ui::{install_runtime_css, runtime_css, LAYOUT_TOKENS};

mod canvas;
mod image_loader;
mod input_bridge;
mod listeners;
mod window;
mod worker;

use self::canvas::{attach_image_listeners, install_canvas};
use self::image_loader::{decode_image_file, DecodedImage, ImageLoadError};
use self::listeners::ListenerScope;
use self::window::{build_shell_window, ShellWidgets};
use self::worker::spawn_worker_action;

const APPLICATION_ID: &str = "io.github.uilabel";
const FALLBACK_PROGRAM_NAME: &str = "uilabel";

/// Image paths passed on the command line; `argv[0]` and flags are skipped.
pub(crate) fn startup_paths_from_args<I>(args: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .skip(1)
        .filter(|arg| !arg.to_string_lossy().starts_with('-'))
        .map(PathBuf::from)
        .collect()
}

// Pass only argv[0] to GTK so image paths are not treated as files to open.
fn gtk_launch_args() -> Vec<String> {
    vec![std::env::args()
        .next()
        .unwrap_or_else(|| FALLBACK_PROGRAM_NAME.to_string())]
}

fn build_detection_client(config: &DetectionConfig) -> Option<Arc<dyn DetectionClient>> {
    match HttpDetectionClient::new(config.endpoint.clone(), config.timeout()) {
        Ok(client) => {
            tracing::info!(endpoint = client.endpoint(), "detection client ready");
            Some(Arc::new(client))
        }
        Err(err) => {
            tracing::warn!(%err, "detection client unavailable");
            None
        }
    }
}

/// State shared by every GTK callback of the window.
struct ShellRuntime {
    session: RefCell<LabellingSession>,
    pixbuf: RefCell<Option<Pixbuf>>,
    load_failed: RefCell<Option<ImageKey>>,
    listeners: RefCell<Option<ListenerScope>>,
    file_dialog: RefCell<Option<gtk4::FileChooserNative>>,
    syncing: Cell<bool>,
    client: Option<Arc<dyn DetectionClient>>,
    export_dir: PathBuf,
    widgets: ShellWidgets,
}

impl ShellRuntime {
    fn load_failed_for(&self, key: Option<&ImageKey>) -> bool {
        key.is_some() && self.load_failed.borrow().as_ref() == key
    }

    /// Runs one session call and refreshes whatever it reports as changed.
    /// Re-entrant calls, e.g. from a signal raised while widgets are being
    /// synced, are dropped.
    fn dispatch<F>(self: &Rc<Self>, action: F)
    where
        F: FnOnce(&mut LabellingSession) -> SessionUpdate,
    {
        let update = match self.session.try_borrow_mut() {
            Ok(mut session) => action(&mut session),
            Err(_) => {
                tracing::debug!("session busy; dropping re-entrant event");
                return;
            }
        };
        self.apply(update);
    }

    fn apply(self: &Rc<Self>, update: SessionUpdate) {
        if update.is_empty() {
            return;
        }
        if update.image_changed {
            self.image_changed();
        }
        {
            let session = self.session.borrow();
            self.syncing.set(true);
            if update.toolbar_changed || update.image_changed {
                self.widgets.sync_toolbar(&session);
            }
            if update.list_changed {
                self.widgets.rebuild_image_list(&session);
            }
            if update.store_changed {
                self.widgets
                    .rebuild_chip_row(&session, &|button: &Button, key: &BoxKey| {
                        self.wire_chip(button, key)
                    });
            } else if update.redraw {
                self.widgets.sync_chip_hover(&session);
            }
            self.syncing.set(false);
        }
        if update.redraw {
            self.widgets.canvas.queue_draw();
        }
        if update.detect_requested {
            self.start_detection();
        }
    }

    fn set_status(&self, message: &str) {
        self.widgets.set_status(message, false);
    }

    fn report_failure(&self, summary: &str, message: &str) {
        tracing::warn!(summary, message, "operation failed");
        self.widgets
            .set_status(&format!("{summary}: {message}"), true);
        notification::send_with_summary(summary, message);
    }

    fn wire_chip(self: &Rc<Self>, button: &Button, key: &BoxKey) {
        let motion = gtk4::EventControllerMotion::new();
        {
            let runtime = Rc::downgrade(self);
            let key = key.clone();
            motion.connect_enter(move |_, _, _| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.dispatch(|session| session.set_hover(Some(key.clone())));
                }
            });
        }
        {
            let runtime = Rc::downgrade(self);
            let key = key.clone();
            motion.connect_leave(move |_| {
                let Some(runtime) = runtime.upgrade() else {
                    return;
                };
                runtime.dispatch(|session| {
                    if session.hover() == Some(&key) {
                        session.set_hover(None)
                    } else {
                        SessionUpdate::none()
                    }
                });
            });
        }
        button.add_controller(motion);

        let runtime = Rc::downgrade(self);
        let key = key.clone();
        button.connect_clicked(move |_| {
            if let Some(runtime) = runtime.upgrade() {
                runtime.dispatch(|session| session.remove_box(&key));
            }
        });
    }

    /// Drops the previous image's pixels and listeners, then starts decoding
    /// the new active image with a fresh listener scope.
    fn image_changed(self: &Rc<Self>) {
        self.pixbuf.replace(None);
        self.load_failed.replace(None);
        drop(self.listeners.borrow_mut().take());
        let target = self
            .session
            .borrow()
            .active_image()
            .map(|image| (image.key.clone(), image.path.clone()));
        let Some((key, path)) = target else {
            return;
        };
        let scope = attach_image_listeners(self);
        self.listeners.replace(Some(scope));
        self.start_decode(key, path);
    }

    fn start_decode(self: &Rc<Self>, key: ImageKey, path: PathBuf) {
        tracing::debug!(%key, path = %path.display(), "decoding image");
        let runtime = Rc::downgrade(self);
        let failed_runtime = runtime.clone();
        let failed_key = key.clone();
        spawn_worker_action(
            "decode",
            move || decode_image_file(&path),
            move |result| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.finish_decode(&key, result);
                }
            },
            move |failure| {
                if let Some(runtime) = failed_runtime.upgrade() {
                    runtime.image_load_failed(&failed_key, &failure.to_string());
                }
            },
        );
    }

    fn finish_decode(self: &Rc<Self>, key: &ImageKey, result: Result<DecodedImage, ImageLoadError>) {
        let decoded = match result {
            Ok(decoded) => decoded,
            Err(err) => return self.image_load_failed(key, &err.to_string()),
        };
        let natural = decoded.natural_size();
        let is_active = self.session.borrow().active_key() == Some(key);
        if is_active {
            match decoded.into_pixbuf() {
                Ok(pixbuf) => {
                    self.pixbuf.replace(Some(pixbuf));
                }
                Err(err) => return self.image_load_failed(key, &err.to_string()),
            }
        }
        self.dispatch(|session| session.image_decoded(key, natural));
    }

    fn image_load_failed(self: &Rc<Self>, key: &ImageKey, reason: &str) {
        let is_active = self.session.borrow().active_key() == Some(key);
        if is_active {
            self.load_failed.replace(Some(key.clone()));
            self.widgets
                .set_status(&format!("Could not load {key}: {reason}"), true);
        }
        self.dispatch(|session| session.image_failed(key, reason));
    }

    fn start_detection(self: &Rc<Self>) {
        let Some(client) = self.client.clone() else {
            self.report_failure("Detection unavailable", "detection client could not be created");
            return;
        };
        let begun = self.session.borrow_mut().begin_detection();
        let job = match begun {
            Ok(job) => job,
            Err(DetectionError::AlreadyRunning { key }) => {
                tracing::debug!(%key, "detection already running");
                return;
            }
            Err(err) => {
                self.report_failure("Detection not started", &err.to_string());
                return;
            }
        };
        self.set_status(&format!("Detecting boxes for {}\u{2026}", job.key));
        self.apply(SessionUpdate::toolbar());

        let runtime = Rc::downgrade(self);
        let failed_runtime = runtime.clone();
        let failed_key = job.key.clone();
        spawn_worker_action(
            "detect",
            move || job.run(client.as_ref()),
            move |outcome| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.finish_detection(outcome);
                }
            },
            move |failure| {
                if let Some(runtime) = failed_runtime.upgrade() {
                    runtime.finish_detection(DetectionOutcome::interrupted(failed_key, failure));
                }
            },
        );
    }

    fn finish_detection(self: &Rc<Self>, outcome: DetectionOutcome) {
        let (merge, update) = self.session.borrow_mut().finish_detection(outcome);
        self.apply(update);
        match merge {
            DetectionMerge::Merged { key, added } => {
                self.set_status(&format!("Detected {added} boxes on {key}"));
            }
            DetectionMerge::Discarded { key } => {
                self.set_status(&format!("Ignored detection for {key}; image no longer active"));
            }
            DetectionMerge::Failed { key, error } => {
                self.report_failure("Detection failed", &format!("{key}: {error}"));
            }
        }
    }

    fn add_paths(self: &Rc<Self>, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        let (added, update) = self.session.borrow_mut().add_paths(&paths);
        self.apply(update);
        let mut status = format!("Added {} images", added.added.len());
        if added.skipped > 0 {
            status.push_str(&format!(", skipped {}", added.skipped));
        }
        self.set_status(&status);
    }

    fn open_images_dialog(self: &Rc<Self>) {
        let dialog = gtk4::FileChooserNative::new(
            Some("Open images"),
            Some(&self.widgets.window),
            gtk4::FileChooserAction::Open,
            Some("_Open"),
            Some("_Cancel"),
        );
        dialog.set_select_multiple(true);
        let filter = gtk4::FileFilter::new();
        filter.set_name(Some("Images"));
        filter.add_mime_type("image/*");
        dialog.add_filter(&filter);

        let runtime = Rc::downgrade(self);
        dialog.connect_response(move |dialog, response| {
            let Some(runtime) = runtime.upgrade() else {
                return;
            };
            if response == gtk4::ResponseType::Accept {
                let files = dialog.files();
                let paths = (0..files.n_items())
                    .filter_map(|index| files.item(index))
                    .filter_map(|item| item.downcast::<gio::File>().ok())
                    .filter_map(|file| file.path())
                    .collect::<Vec<_>>();
                runtime.add_paths(paths);
            }
            dialog.destroy();
            runtime.file_dialog.replace(None);
        });
        dialog.show();
        self.file_dialog.replace(Some(dialog));
    }

    fn export(self: &Rc<Self>) {
        if let Err(err) = std::fs::create_dir_all(&self.export_dir) {
            self.report_failure("Export failed", &err.to_string());
            return;
        }
        let path = self.export_dir.join(ARCHIVE_FILE_NAME);
        let result = write_archive_file(&path, self.session.borrow().images());
        match result {
            Ok(summary) => {
                let message = format!(
                    "Exported {} images ({} ground truth, {} predicted boxes) to {}",
                    summary.images,
                    summary.ground_truth,
                    summary.prediction,
                    path.display()
                );
                self.set_status(&message);
                notification::send(message);
            }
            Err(err) => self.report_failure("Export failed", &err.to_string()),
        }
    }

    fn export_json(self: &Rc<Self>) {
        if let Err(err) = std::fs::create_dir_all(&self.export_dir) {
            self.report_failure("Export failed", &err.to_string());
            return;
        }
        let path = self.export_dir.join(COMBINED_FILE_NAME);
        let result = write_combined_file(&path, self.session.borrow().images());
        match result {
            Ok(images) => {
                let message = format!("Exported {images} images to {}", path.display());
                self.set_status(&message);
                notification::send(message);
            }
            Err(err) => self.report_failure("Export failed", &err.to_string()),
        }
    }

    fn connect_button(self: &Rc<Self>, button: &Button, action: fn(&mut LabellingSession) -> SessionUpdate) {
        let runtime = Rc::downgrade(self);
        button.connect_clicked(move |_| {
            if let Some(runtime) = runtime.upgrade() {
                runtime.dispatch(action);
            }
        });
    }

    fn wire_widgets(self: &Rc<Self>) {
        let widgets = &self.widgets;
        self.connect_button(&widgets.clear_button, LabellingSession::clear_boxes);
        self.connect_button(&widgets.reset_button, LabellingSession::reset_position);
        self.connect_button(&widgets.zoom_in_button, LabellingSession::zoom_in);
        self.connect_button(&widgets.zoom_out_button, LabellingSession::zoom_out);
        self.connect_button(&widgets.prev_tag_button, LabellingSession::prev_tag);
        self.connect_button(&widgets.next_tag_button, LabellingSession::next_tag);
        self.connect_button(&widgets.done_button, LabellingSession::toggle_done);
        self.connect_button(&widgets.detect_button, |_| SessionUpdate {
            detect_requested: true,
            ..SessionUpdate::none()
        });

        for (button, mode) in [
            (&widgets.select_button, InteractionMode::Select),
            (&widgets.pan_button, InteractionMode::Pan),
        ] {
            let runtime = Rc::downgrade(self);
            button.connect_toggled(move |button| {
                let Some(runtime) = runtime.upgrade() else {
                    return;
                };
                if runtime.syncing.get() || !button.is_active() {
                    return;
                }
                runtime.dispatch(|session| session.set_mode(mode));
            });
        }

        for (index, button) in widgets.tag_buttons.iter().enumerate() {
            let runtime = Rc::downgrade(self);
            button.connect_toggled(move |button| {
                let Some(runtime) = runtime.upgrade() else {
                    return;
                };
                if runtime.syncing.get() || !button.is_active() {
                    return;
                }
                runtime.dispatch(|session| session.select_tag(index));
            });
        }

        {
            let runtime = Rc::downgrade(self);
            widgets.image_list.connect_row_activated(move |_, row| {
                let Some(runtime) = runtime.upgrade() else {
                    return;
                };
                let Ok(index) = usize::try_from(row.index()) else {
                    return;
                };
                runtime.dispatch(|session| session.select(index));
            });
        }
        {
            let runtime = Rc::downgrade(self);
            widgets.open_button.connect_clicked(move |_| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.open_images_dialog();
                }
            });
        }
        {
            let runtime = Rc::downgrade(self);
            widgets.export_button.connect_clicked(move |_| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.export();
                }
            });
        }
        {
            let runtime = Rc::downgrade(self);
            widgets.export_json_button.connect_clicked(move |_| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.export_json();
                }
            });
        }
        {
            let runtime = Rc::downgrade(self);
            widgets.window.connect_close_request(move |_| {
                if let Some(runtime) = runtime.upgrade() {
                    runtime.teardown();
                }
                gtk4::glib::Propagation::Proceed
            });
        }
    }

    fn teardown(&self) {
        drop(self.listeners.borrow_mut().take());
        self.pixbuf.replace(None);
        if let Some(dialog) = self.file_dialog.borrow_mut().take() {
            dialog.destroy();
        }
        tracing::info!("window closed; listeners detached");
    }
}

pub(crate) struct App {
    config: AppConfig,
    startup_paths: Vec<PathBuf>,
}

impl App {
    pub(crate) fn new(config: AppConfig, startup_paths: Vec<PathBuf>) -> Self {
        Self {
            config,
            startup_paths,
        }
    }

    pub(crate) fn start(self) -> AppResult<()> {
        let tags = self.config.tag_vocabulary();
        let settings = self.config.session_settings();
        let highlight = self.config.highlight();
        let export_dir = self.config.export_dir();
        let client = build_detection_client(&self.config.detection);
        tracing::info!(
            tags = tags.len(),
            startup_images = self.startup_paths.len(),
            export_dir = %export_dir.display(),
            "starting gtk runtime"
        );

        let application = Application::new(Some(APPLICATION_ID), gio::ApplicationFlags::NON_UNIQUE);
        let startup = RefCell::new(Some((tags, client, export_dir, self.startup_paths)));
        // Held by the activate handler, so the runtime lives as long as the application.
        let active_runtime = RefCell::new(None::<Rc<ShellRuntime>>);
        application.connect_activate(move |app| {
            let Some((tags, client, export_dir, startup_paths)) = startup.borrow_mut().take() else {
                tracing::debug!("ignoring duplicate gtk activate signal");
                return;
            };
            install_runtime_css(&runtime_css(LAYOUT_TOKENS, &tags, highlight));
            let widgets = build_shell_window(app, LAYOUT_TOKENS, &tags);
            let runtime = Rc::new(ShellRuntime {
                session: RefCell::new(LabellingSession::new(tags, settings)),
                pixbuf: RefCell::new(None),
                load_failed: RefCell::new(None),
                listeners: RefCell::new(None),
                file_dialog: RefCell::new(None),
                syncing: Cell::new(false),
                client,
                export_dir,
                widgets,
            });
            install_canvas(&runtime);
            runtime.wire_widgets();
            runtime.apply(SessionUpdate {
                toolbar_changed: true,
                list_changed: true,
                ..SessionUpdate::redraw()
            });
            runtime.add_paths(startup_paths);
            runtime.widgets.window.present();
            active_runtime.replace(Some(runtime));
        });

        let exit = application.run_with_args(&gtk_launch_args());
        if exit != gtk4::glib::ExitCode::SUCCESS {
            return Err(AppError::Exit(i32::from(exit.get())));
        }
        tracing::info!("gtk runtime finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_paths_skip_program_name_and_flags() {
        let args = ["uilabel", "--verbose", "/shots/a.png", "b.jpg"]
            .into_iter()
            .map(OsString::from);
        assert_eq!(
            startup_paths_from_args(args),
            vec![PathBuf::from("/shots/a.png"), PathBuf::from("b.jpg")]
        );
    }

    #[test]
    fn startup_paths_empty_without_arguments() {
        let args = ["uilabel"].into_iter().map(OsString::from);
        assert!(startup_paths_from_args(args).is_empty());
    }

    #[test]
    fn gtk_launch_args_pass_only_program_name() {
        assert_eq!(gtk_launch_args().len(), 1);
    }
}
