//! The labelling session: the image batch, the active image's viewport and
//! drawing machine, the tag selection and the detection gate.
//!
//! Every GTK callback goes through here and gets a [`SessionUpdate`] back.
//! Nothing in this module touches widgets.

mod update;

pub use update::{AddedImages, DetectionMerge, SessionUpdate};

use std::path::{Path, PathBuf};

use crate::annotation::{is_supported_image_path, BoxKey, ImageKey, ImageUnit};
use crate::detection::{DetectionBridge, DetectionError, DetectionJob, DetectionOutcome};
use crate::geometry::{Color, ScreenPoint, Size};
use crate::input::{InputContext, ShortcutAction};
use crate::render::{build_render_plan, RenderInput, RenderPlan, RenderStyle, TextMeasure};
use crate::state::{DrawingMachine, InteractionMode, MachineOutput};
use crate::tags::{Tag, TagVocabulary};
use crate::viewport::{Viewport, ViewportLimits};

pub const DEFAULT_MAX_DETECTION_DIMENSION: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub limits: ViewportLimits,
    pub highlight: Color,
    pub max_detection_dimension: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            limits: ViewportLimits::default(),
            highlight: Color::RED,
            max_detection_dimension: DEFAULT_MAX_DETECTION_DIMENSION,
        }
    }
}

pub struct LabellingSession {
    images: Vec<ImageUnit>,
    active: Option<usize>,
    loaded: bool,
    image_counter: u64,
    tags: TagVocabulary,
    active_tag: usize,
    viewport: Viewport,
    machine: DrawingMachine,
    bridge: DetectionBridge,
    settings: SessionSettings,
}

impl LabellingSession {
    pub fn new(tags: TagVocabulary, settings: SessionSettings) -> Self {
        Self {
            images: Vec::new(),
            active: None,
            loaded: false,
            image_counter: 0,
            tags,
            active_tag: 0,
            viewport: Viewport::new(settings.limits),
            machine: DrawingMachine::new(),
            bridge: DetectionBridge::new(),
            settings,
        }
    }

    pub fn images(&self) -> &[ImageUnit] {
        &self.images
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_image(&self) -> Option<&ImageUnit> {
        self.active.and_then(|index| self.images.get(index))
    }

    fn active_image_mut(&mut self) -> Option<&mut ImageUnit> {
        self.active.and_then(|index| self.images.get_mut(index))
    }

    pub fn active_key(&self) -> Option<&ImageKey> {
        self.active_image().map(|image| &image.key)
    }

    /// True once the active image's pixels were decoded; boxes are drawn only then.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn tags(&self) -> &TagVocabulary {
        &self.tags
    }

    pub fn active_tag_index(&self) -> usize {
        self.active_tag
    }

    pub fn active_tag(&self) -> &Tag {
        self.tags.get(self.active_tag).unwrap_or_else(|| self.tags.first())
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn machine(&self) -> &DrawingMachine {
        &self.machine
    }

    pub fn mode(&self) -> InteractionMode {
        self.machine.mode()
    }

    pub fn hover(&self) -> Option<&BoxKey> {
        self.machine.hover()
    }

    pub fn is_detecting(&self) -> bool {
        self.active_key()
            .is_some_and(|key| self.bridge.is_running(key))
    }

    pub fn input_context(&self) -> InputContext {
        InputContext {
            tag_count: self.tags.len(),
            has_image: self.active.is_some(),
        }
    }

    /// Percentage of images marked done.
    pub fn progress(&self) -> f64 {
        if self.images.is_empty() {
            return 0.0;
        }
        let done = self.images.iter().filter(|image| image.is_done).count();
        done as f64 / self.images.len() as f64 * 100.0
    }

    fn next_image_key(&mut self, name: &str) -> ImageKey {
        self.image_counter = self.image_counter.saturating_add(1);
        ImageKey::new(format!("{name}#{}", self.image_counter))
    }

    /// Appends one image; the first image of an empty batch becomes active.
    pub fn add_image(&mut self, path: PathBuf, size_bytes: u64) -> (ImageKey, SessionUpdate) {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let key = self.next_image_key(&name);
        self.images
            .push(ImageUnit::new(key.clone(), path, size_bytes));
        let mut update = SessionUpdate {
            list_changed: true,
            ..SessionUpdate::none()
        };
        if self.active.is_none() {
            update = update.merge(self.select(self.images.len() - 1));
        }
        (key, update)
    }

    /// Adds every readable image file among `paths`, skipping the rest.
    pub fn add_paths<P: AsRef<Path>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> (AddedImages, SessionUpdate) {
        let mut added = AddedImages::default();
        let mut update = SessionUpdate::none();
        for path in paths {
            let path = path.as_ref();
            if !is_supported_image_path(path) {
                tracing::warn!(path = %path.display(), "skipping unsupported file");
                added.skipped += 1;
                continue;
            }
            let size_bytes = match std::fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => metadata.len(),
                Ok(_) => {
                    tracing::warn!(path = %path.display(), "skipping non-file path");
                    added.skipped += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                    added.skipped += 1;
                    continue;
                }
            };
            let (key, image_update) = self.add_image(path.to_path_buf(), size_bytes);
            added.added.push(key);
            update = update.merge(image_update);
        }
        tracing::info!(
            added = added.added.len(),
            skipped = added.skipped,
            total = self.images.len(),
            "images added"
        );
        (added, update)
    }

    /// Makes `index` the active image. The viewport and the drawing machine
    /// start fresh; the new image stays unloaded until it is decoded.
    pub fn select(&mut self, index: usize) -> SessionUpdate {
        if index >= self.images.len() || self.active == Some(index) {
            return SessionUpdate::none();
        }
        self.active = Some(index);
        self.loaded = false;
        self.viewport.clear_image();
        self.machine.reset();
        tracing::debug!(key = %self.images[index].key, index, "image selected");
        SessionUpdate {
            redraw: true,
            store_changed: true,
            toolbar_changed: true,
            list_changed: true,
            image_changed: true,
            detect_requested: false,
        }
    }

    pub fn select_key(&mut self, key: &ImageKey) -> SessionUpdate {
        match self.images.iter().position(|image| &image.key == key) {
            Some(index) => self.select(index),
            None => SessionUpdate::none(),
        }
    }

    /// Moves to the following image, wrapping from the last to the first.
    pub fn next_image(&mut self) -> SessionUpdate {
        self.step_image(1)
    }

    /// Moves to the preceding image, wrapping from the first to the last.
    pub fn prev_image(&mut self) -> SessionUpdate {
        self.step_image(-1)
    }

    fn step_image(&mut self, step: isize) -> SessionUpdate {
        let count = self.images.len();
        if count == 0 {
            return SessionUpdate::none();
        }
        let next = match self.active {
            Some(index) => (index as isize + step).rem_euclid(count as isize) as usize,
            None => 0,
        };
        self.select(next)
    }

    /// Records the decoded size of `key`. Only the active image becomes loaded.
    pub fn image_decoded(&mut self, key: &ImageKey, natural: Size) -> SessionUpdate {
        let Some(index) = self.images.iter().position(|image| &image.key == key) else {
            return SessionUpdate::none();
        };
        self.images[index].set_natural_size(natural);
        if self.active != Some(index) {
            tracing::debug!(%key, "decoded image is no longer active");
            return SessionUpdate::none();
        }
        let natural = self.images[index].natural_size().unwrap_or(natural);
        self.loaded = true;
        self.viewport.fit(natural);
        tracing::debug!(%key, width = natural.width, height = natural.height, "image loaded");
        SessionUpdate {
            redraw: true,
            toolbar_changed: true,
            ..SessionUpdate::none()
        }
    }

    pub fn image_failed(&mut self, key: &ImageKey, reason: &str) -> SessionUpdate {
        tracing::warn!(%key, %reason, "failed to decode image");
        if self.active_key() == Some(key) {
            self.loaded = false;
            return SessionUpdate::redraw();
        }
        SessionUpdate::none()
    }

    pub fn resize(&mut self, canvas: Size) -> SessionUpdate {
        let had_canvas = self.viewport.canvas_size().is_positive();
        if !self.viewport.resize(canvas) {
            return SessionUpdate::none();
        }
        // An image decoded before the canvas had a size has not been fitted yet.
        if !had_canvas && self.loaded {
            self.viewport.reset_position();
        }
        SessionUpdate::redraw()
    }

    fn apply_machine_output(&mut self, output: MachineOutput) -> SessionUpdate {
        match output {
            MachineOutput::Nothing => SessionUpdate::none(),
            MachineOutput::DraftChanged
            | MachineOutput::DraftDiscarded
            | MachineOutput::DragEnded
            | MachineOutput::Cancelled => SessionUpdate::redraw(),
            MachineOutput::Committed(rect) => {
                let tag = self.active_tag().clone();
                let Some(image) = self.active_image_mut() else {
                    return SessionUpdate::redraw();
                };
                match image.annotations.push_manual(rect, &tag) {
                    Ok(annotation) => {
                        tracing::debug!(key = %annotation.key, value = %annotation.value, "box committed");
                        SessionUpdate::store()
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "discarded drawn box");
                        SessionUpdate::redraw()
                    }
                }
            }
            MachineOutput::Panned { delta_x, delta_y } => {
                if self.viewport.pan_by(delta_x, delta_y) {
                    SessionUpdate::redraw()
                } else {
                    SessionUpdate::none()
                }
            }
            MachineOutput::ModeChanged(mode) => {
                tracing::debug!(mode = mode.label(), "interaction mode changed");
                SessionUpdate {
                    redraw: true,
                    toolbar_changed: true,
                    ..SessionUpdate::none()
                }
            }
        }
    }

    pub fn pointer_down(&mut self, point: ScreenPoint) -> SessionUpdate {
        if !self.loaded {
            return SessionUpdate::none();
        }
        let output = self.machine.pointer_down(point, &self.viewport);
        self.apply_machine_output(output)
    }

    pub fn pointer_move(&mut self, point: ScreenPoint) -> SessionUpdate {
        if !self.loaded {
            return SessionUpdate::none();
        }
        let output = self.machine.pointer_move(point, &self.viewport);
        self.apply_machine_output(output)
    }

    pub fn pointer_up(&mut self, point: ScreenPoint) -> SessionUpdate {
        if !self.loaded {
            return SessionUpdate::none();
        }
        let output = self.machine.pointer_up(point, &self.viewport);
        self.apply_machine_output(output)
    }

    pub fn set_mode(&mut self, mode: InteractionMode) -> SessionUpdate {
        let output = self.machine.set_mode(mode);
        self.apply_machine_output(output)
    }

    pub fn cancel(&mut self) -> SessionUpdate {
        let output = self.machine.cancel();
        self.apply_machine_output(output)
    }

    pub fn pan_key_pressed(&mut self) -> SessionUpdate {
        let output = self.machine.pan_key_pressed();
        self.apply_machine_output(output)
    }

    pub fn pan_key_released(&mut self) -> SessionUpdate {
        let output = self.machine.pan_key_released();
        self.apply_machine_output(output)
    }

    /// Out-of-range indices are ignored.
    pub fn select_tag(&mut self, index: usize) -> SessionUpdate {
        if index >= self.tags.len() || index == self.active_tag {
            return SessionUpdate::none();
        }
        self.active_tag = index;
        tracing::debug!(tag = %self.active_tag().value, index, "active tag changed");
        SessionUpdate {
            redraw: self.machine.is_drawing(),
            ..SessionUpdate::toolbar()
        }
    }

    pub fn prev_tag(&mut self) -> SessionUpdate {
        match self.active_tag.checked_sub(1) {
            Some(index) => self.select_tag(index),
            None => SessionUpdate::none(),
        }
    }

    pub fn next_tag(&mut self) -> SessionUpdate {
        self.select_tag(self.active_tag + 1)
    }

    /// Keys that are not boxes of the active image are ignored.
    pub fn set_hover(&mut self, key: Option<BoxKey>) -> SessionUpdate {
        if let Some(key) = &key {
            let known = self
                .active_image()
                .is_some_and(|image| image.annotations.contains(key));
            if !known {
                tracing::trace!(%key, "hover on unknown box ignored");
                return SessionUpdate::none();
            }
        }
        if self.machine.set_hover(key) {
            SessionUpdate::redraw()
        } else {
            SessionUpdate::none()
        }
    }

    pub fn remove_box(&mut self, key: &BoxKey) -> SessionUpdate {
        let Some(image) = self.active_image_mut() else {
            return SessionUpdate::none();
        };
        let Some(removed) = image.annotations.remove(key) else {
            return SessionUpdate::none();
        };
        tracing::debug!(key = %removed.key, "box removed");
        if self.machine.hover() == Some(key) {
            self.machine.set_hover(None);
        }
        SessionUpdate::store()
    }

    pub fn remove_hovered(&mut self) -> SessionUpdate {
        match self.machine.hover().cloned() {
            Some(key) => self.remove_box(&key),
            None => SessionUpdate::none(),
        }
    }

    pub fn clear_boxes(&mut self) -> SessionUpdate {
        let Some(image) = self.active_image_mut() else {
            return SessionUpdate::none();
        };
        let removed = image.annotations.clear();
        if removed == 0 {
            return SessionUpdate::none();
        }
        tracing::info!(removed, "cleared all boxes");
        self.machine.set_hover(None);
        SessionUpdate::store()
    }

    pub fn toggle_done(&mut self) -> SessionUpdate {
        let Some(image) = self.active_image_mut() else {
            return SessionUpdate::none();
        };
        image.is_done = !image.is_done;
        SessionUpdate {
            list_changed: true,
            toolbar_changed: true,
            ..SessionUpdate::none()
        }
    }

    fn viewport_changed(changed: bool) -> SessionUpdate {
        if changed {
            SessionUpdate::redraw()
        } else {
            SessionUpdate::none()
        }
    }

    pub fn zoom_in(&mut self) -> SessionUpdate {
        Self::viewport_changed(self.loaded && self.viewport.zoom_in())
    }

    pub fn zoom_out(&mut self) -> SessionUpdate {
        Self::viewport_changed(self.loaded && self.viewport.zoom_out())
    }

    pub fn reset_position(&mut self) -> SessionUpdate {
        Self::viewport_changed(self.loaded && self.viewport.reset_position())
    }

    /// Routes a resolved key press or release.
    pub fn apply_shortcut(&mut self, action: ShortcutAction) -> SessionUpdate {
        match action {
            ShortcutAction::SelectTag(index) => self.select_tag(index),
            ShortcutAction::CancelInteraction => self.cancel(),
            ShortcutAction::PanHoldStart => self.pan_key_pressed(),
            ShortcutAction::PanHoldEnd => self.pan_key_released(),
            ShortcutAction::EnterSelect => self.set_mode(InteractionMode::Select),
            ShortcutAction::EnterPan => self.set_mode(InteractionMode::Pan),
            ShortcutAction::ZoomIn => self.zoom_in(),
            ShortcutAction::ZoomOut => self.zoom_out(),
            ShortcutAction::ResetPosition => self.reset_position(),
            ShortcutAction::Detect => SessionUpdate {
                detect_requested: true,
                ..SessionUpdate::none()
            },
            ShortcutAction::NextImage => self.next_image(),
            ShortcutAction::PrevImage => self.prev_image(),
            ShortcutAction::ToggleDone => self.toggle_done(),
            ShortcutAction::DeleteHovered => self.remove_hovered(),
        }
    }

    /// Starts detection for the active image if it is loaded and idle.
    pub fn begin_detection(&mut self) -> Result<DetectionJob, DetectionError> {
        if !self.loaded {
            return match self.active_key() {
                Some(key) => Err(DetectionError::NotLoaded { key: key.clone() }),
                None => Err(DetectionError::NoActiveImage),
            };
        }
        let index = self.active.ok_or(DetectionError::NoActiveImage)?;
        self.bridge
            .begin(&self.images[index], self.settings.max_detection_dimension)
    }

    /// Applies a finished job. The in-flight flag is cleared whatever the outcome.
    pub fn finish_detection(&mut self, outcome: DetectionOutcome) -> (DetectionMerge, SessionUpdate) {
        let DetectionOutcome { key, result } = outcome;
        self.bridge.finish(&key);
        let toolbar = SessionUpdate::toolbar();

        let boxes = match result {
            Ok(boxes) => boxes,
            Err(error) => return (DetectionMerge::Failed { key, error }, toolbar),
        };
        if self.active_key() != Some(&key) {
            tracing::info!(%key, count = boxes.len(), "discarding detection for inactive image");
            return (DetectionMerge::Discarded { key }, toolbar);
        }
        let Some(image) = self.active_image_mut() else {
            return (DetectionMerge::Discarded { key }, toolbar);
        };
        match image.annotations.extend_pending(boxes) {
            Ok(keys) => {
                tracing::info!(%key, added = keys.len(), total = image.annotations.len(), "detection merged");
                (
                    DetectionMerge::Merged {
                        key,
                        added: keys.len(),
                    },
                    toolbar.merge(SessionUpdate::store()),
                )
            }
            Err(err) => (
                DetectionMerge::Failed {
                    key,
                    error: DetectionError::Store(err),
                },
                toolbar,
            ),
        }
    }

    /// Frame for the canvas, `None` until the active image is loaded.
    pub fn render_plan(&self, measure: &dyn TextMeasure) -> Option<RenderPlan> {
        if !self.loaded {
            return None;
        }
        let image = self.active_image()?;
        let input = RenderInput {
            boxes: image.annotations.as_slice(),
            tags: &self.tags,
            hover: self.machine.hover(),
            draft: self.machine.draft().map(|draft| draft.rect()),
            active_tag: self.active_tag(),
            scale: self.viewport.scale(),
            pan: self.viewport.pan(),
            style: RenderStyle::with_highlight(self.settings.highlight),
        };
        Some(build_render_plan(&input, measure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Author, PendingBox};
    use crate::geometry::{ImageRect, PanOffset};
    use crate::input::{resolve_shortcut, ShortcutKey, ShortcutModifiers};
    use crate::state::InteractionState;

    struct FixedAdvance;

    impl TextMeasure for FixedAdvance {
        fn text_width(&self, text: &str, font_size: f64) -> f64 {
            text.len() as f64 * font_size * 0.5
        }
    }

    fn session_with_images(count: usize) -> LabellingSession {
        let mut session = LabellingSession::new(TagVocabulary::default(), SessionSettings::default());
        session.resize(Size::new(500.0, 500.0));
        for index in 0..count {
            session.add_image(PathBuf::from(format!("/shots/screen{index}.png")), 1024);
        }
        session
    }

    fn loaded_session(count: usize) -> LabellingSession {
        let mut session = session_with_images(count);
        let key = session.active_key().cloned().expect("first image active");
        session.image_decoded(&key, Size::new(500.0, 500.0));
        session
    }

    fn pending(count: usize) -> Vec<PendingBox> {
        (0..count)
            .map(|index| PendingBox {
                rect: ImageRect::new(index as f64 * 10.0, 0.0, 5.0, 5.0),
                value: "input".to_string(),
                label: "Input".to_string(),
                author: Author::Llm,
                score: 0.9,
                rationale: None,
            })
            .collect()
    }

    fn draw(session: &mut LabellingSession, from: (f64, f64), to: (f64, f64)) -> SessionUpdate {
        session.pointer_down(ScreenPoint::new(from.0, from.1));
        session.pointer_move(ScreenPoint::new(to.0, to.1));
        session.pointer_up(ScreenPoint::new(to.0, to.1))
    }

    fn active_rects(session: &LabellingSession) -> Vec<ImageRect> {
        session
            .active_image()
            .expect("active image")
            .annotations
            .iter()
            .map(|annotation| annotation.rect())
            .collect()
    }

    #[test]
    fn first_added_image_becomes_active_and_needs_decoding() {
        let mut session = LabellingSession::new(TagVocabulary::default(), SessionSettings::default());
        let (key, update) = session.add_image(PathBuf::from("/shots/home.png"), 10);
        assert_eq!(key.as_str(), "home.png#1");
        assert!(update.image_changed);
        assert!(update.list_changed);
        assert_eq!(session.active_key(), Some(&key));
        assert!(!session.is_loaded());

        let (_, update) = session.add_image(PathBuf::from("/shots/home.png"), 10);
        assert!(!update.image_changed);
        assert_eq!(session.images()[1].key.as_str(), "home.png#2");
    }

    #[test]
    fn add_paths_skips_unsupported_and_missing_files() {
        let mut session = LabellingSession::new(TagVocabulary::default(), SessionSettings::default());
        let (added, _) = session.add_paths(["/shots/notes.txt", "/definitely/missing.png"]);
        assert!(added.added.is_empty());
        assert_eq!(added.skipped, 2);
        assert!(session.active_image().is_none());
    }

    #[test]
    fn boxes_are_not_drawn_or_editable_until_loaded() {
        let mut session = session_with_images(1);
        assert!(session.render_plan(&FixedAdvance).is_none());
        assert!(draw(&mut session, (10.0, 10.0), (50.0, 50.0)).is_empty());
        assert!(active_rects(&session).is_empty());

        let key = session.active_key().cloned().expect("active image");
        session.image_decoded(&key, Size::new(1000.0, 500.0));
        assert!(session.is_loaded());
        assert_eq!(session.viewport().scale(), 0.5);
        assert_eq!(session.viewport().pan(), PanOffset::new(0.0, 125.0));
        assert!(session.render_plan(&FixedAdvance).is_some());
    }

    #[test]
    fn draws_in_every_direction_store_normalized_boxes() {
        let mut session = loaded_session(1);
        for (from, to) in [
            ((10.0, 20.0), (40.0, 60.0)),
            ((40.0, 60.0), (10.0, 20.0)),
            ((40.0, 20.0), (10.0, 60.0)),
            ((10.0, 60.0), (40.0, 20.0)),
        ] {
            let update = draw(&mut session, from, to);
            assert!(update.store_changed);
        }
        let expected = ImageRect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(active_rects(&session), vec![expected; 4]);
        let image = session.active_image().expect("active image");
        assert!(image
            .annotations
            .iter()
            .all(|annotation| annotation.author == Author::Manual && annotation.score == 1.0));
    }

    #[test]
    fn click_without_movement_adds_nothing() {
        let mut session = loaded_session(1);
        session.pointer_down(ScreenPoint::new(10.0, 10.0));
        let update = session.pointer_up(ScreenPoint::new(10.0, 10.0));
        assert!(!update.store_changed);
        assert!(active_rects(&session).is_empty());
    }

    #[test]
    fn committed_box_uses_active_tag() {
        let mut session = loaded_session(1);
        let action = resolve_shortcut(
            ShortcutKey::Character('3'),
            ShortcutModifiers::default(),
            session.input_context(),
        )
        .expect("digit within vocabulary");
        session.apply_shortcut(action);
        assert_eq!(session.active_tag().value, "radio");
        draw(&mut session, (0.0, 0.0), (5.0, 5.0));
        let image = session.active_image().expect("active image");
        assert_eq!(image.annotations.as_slice()[0].value, "radio");
        assert_eq!(image.annotations.as_slice()[0].label, "Radio");
    }

    #[test]
    fn digit_beyond_vocabulary_is_a_no_op() {
        let session = loaded_session(1);
        assert_eq!(
            resolve_shortcut(
                ShortcutKey::Character('9'),
                ShortcutModifiers::default(),
                session.input_context()
            ),
            None
        );
        let mut session = session;
        assert!(session.select_tag(8).is_empty());
        assert_eq!(session.active_tag_index(), 0);
    }

    #[test]
    fn pan_drag_moves_viewport() {
        let mut session = loaded_session(1);
        let before = session.viewport().pan();
        session.set_mode(InteractionMode::Pan);
        draw(&mut session, (100.0, 100.0), (130.0, 90.0));
        assert_eq!(
            session.viewport().pan(),
            PanOffset::new(before.x + 30.0, before.y - 10.0)
        );
        assert!(active_rects(&session).is_empty());
    }

    #[test]
    fn detection_merge_is_additive_and_keeps_existing_keys() {
        let mut session = loaded_session(1);
        draw(&mut session, (0.0, 0.0), (10.0, 10.0));
        draw(&mut session, (20.0, 20.0), (30.0, 30.0));
        let before: Vec<BoxKey> = session
            .active_image()
            .expect("active image")
            .annotations
            .iter()
            .map(|annotation| annotation.key.clone())
            .collect();

        let job = session.begin_detection().expect("loaded image can detect");
        assert!(session.is_detecting());
        let (merge, update) = session.finish_detection(DetectionOutcome {
            key: job.key,
            result: Ok(pending(3)),
        });
        assert!(matches!(merge, DetectionMerge::Merged { added: 3, .. }));
        assert!(update.store_changed);
        assert!(!session.is_detecting());

        let image = session.active_image().expect("active image");
        assert_eq!(image.annotations.len(), 5);
        let after: Vec<BoxKey> = image
            .annotations
            .iter()
            .take(2)
            .map(|annotation| annotation.key.clone())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn stale_detection_is_discarded_after_switching_images() {
        let mut session = loaded_session(2);
        let job = session.begin_detection().expect("loaded image can detect");
        let first_key = job.key.clone();
        session.next_image();
        assert_ne!(session.active_key(), Some(&first_key));

        let (merge, _) = session.finish_detection(DetectionOutcome {
            key: job.key,
            result: Ok(pending(3)),
        });
        assert!(matches!(merge, DetectionMerge::Discarded { .. }));
        assert!(session
            .images()
            .iter()
            .all(|image| image.annotations.is_empty()));

        session.prev_image();
        let key = session.active_key().cloned().expect("active image");
        session.image_decoded(&key, Size::new(500.0, 500.0));
        session
            .begin_detection()
            .expect("flag cleared by the discarded outcome");
    }

    #[test]
    fn failed_detection_clears_flag_and_commits_nothing() {
        let mut session = loaded_session(1);
        let job = session.begin_detection().expect("loaded image can detect");
        assert!(matches!(
            session.begin_detection(),
            Err(DetectionError::AlreadyRunning { .. })
        ));
        let (merge, _) = session.finish_detection(DetectionOutcome {
            key: job.key,
            result: Err(DetectionError::Status { status: 500 }),
        });
        assert!(matches!(merge, DetectionMerge::Failed { .. }));
        assert!(active_rects(&session).is_empty());
        assert!(!session.is_detecting());
    }

    #[test]
    fn interrupted_detection_worker_clears_flag() {
        let mut session = loaded_session(1);
        let job = session.begin_detection().expect("loaded image can detect");
        assert!(session.is_detecting());
        let (merge, update) = session.finish_detection(DetectionOutcome::interrupted(
            job.key,
            "worker thread exited without a result",
        ));
        assert!(matches!(
            merge,
            DetectionMerge::Failed {
                error: DetectionError::Transport(_),
                ..
            }
        ));
        assert!(update.toolbar_changed);
        assert!(!session.is_detecting());
        session
            .begin_detection()
            .expect("detection can be retried after the worker is lost");
    }

    #[test]
    fn invalid_merged_box_rejects_whole_batch() {
        let mut session = loaded_session(1);
        let job = session.begin_detection().expect("loaded image can detect");
        let mut boxes = pending(2);
        boxes[1].rect = ImageRect::new(0.0, 0.0, 0.0, 4.0);
        let (merge, _) = session.finish_detection(DetectionOutcome {
            key: job.key,
            result: Ok(boxes),
        });
        assert!(matches!(
            merge,
            DetectionMerge::Failed {
                error: DetectionError::Store(_),
                ..
            }
        ));
        assert!(active_rects(&session).is_empty());
    }

    #[test]
    fn detection_requires_loaded_image() {
        let mut session = session_with_images(1);
        assert!(matches!(
            session.begin_detection(),
            Err(DetectionError::NotLoaded { .. })
        ));
        let mut empty = LabellingSession::new(TagVocabulary::default(), SessionSettings::default());
        assert!(matches!(
            empty.begin_detection(),
            Err(DetectionError::NoActiveImage)
        ));
    }

    #[test]
    fn switching_images_resets_view_and_interaction() {
        let mut session = loaded_session(2);
        session.zoom_in();
        session.pointer_down(ScreenPoint::new(5.0, 5.0));
        assert_eq!(session.machine().state(), InteractionState::SelectDrawing);

        let update = session.next_image();
        assert!(update.image_changed);
        assert!(!session.is_loaded());
        assert_eq!(session.machine().state(), InteractionState::SelectIdle);
        assert!(session.machine().draft().is_none());
        assert_eq!(session.viewport().pan(), PanOffset::zero());
        assert_eq!(session.viewport().scale(), 1.0);
    }

    #[test]
    fn image_navigation_wraps_at_both_ends() {
        let mut session = session_with_images(3);
        assert_eq!(session.active_index(), Some(0));
        assert!(session.prev_image().image_changed);
        assert_eq!(session.active_index(), Some(2));
        assert!(session.next_image().image_changed);
        assert_eq!(session.active_index(), Some(0));

        let mut single = session_with_images(1);
        assert!(single.next_image().is_empty());
        assert!(single.prev_image().is_empty());
        assert_eq!(single.active_index(), Some(0));
    }

    #[test]
    fn late_decode_of_previous_image_does_not_load_current() {
        let mut session = session_with_images(2);
        let first = session.active_key().cloned().expect("first image");
        session.next_image();
        let update = session.image_decoded(&first, Size::new(40.0, 30.0));
        assert!(update.is_empty());
        assert!(!session.is_loaded());
        assert_eq!(
            session.images()[0].natural_size(),
            Some(Size::new(40.0, 30.0))
        );
    }

    #[test]
    fn delete_removes_hovered_box_only() {
        let mut session = loaded_session(1);
        draw(&mut session, (0.0, 0.0), (10.0, 10.0));
        draw(&mut session, (20.0, 20.0), (30.0, 30.0));
        assert!(session.apply_shortcut(ShortcutAction::DeleteHovered).is_empty());

        let key = session.active_image().expect("active image").annotations.as_slice()[0]
            .key
            .clone();
        session.set_hover(Some(key.clone()));
        let update = session.apply_shortcut(ShortcutAction::DeleteHovered);
        assert!(update.store_changed);
        assert!(session.hover().is_none());
        let image = session.active_image().expect("active image");
        assert_eq!(image.annotations.len(), 1);
        assert!(!image.annotations.contains(&key));
    }

    #[test]
    fn hover_ignores_boxes_of_other_images() {
        let mut session = loaded_session(1);
        assert!(session.set_hover(Some(BoxKey::new("box-9"))).is_empty());
        assert!(session.hover().is_none());

        draw(&mut session, (20.0, 20.0), (30.0, 30.0));
        let key = session.active_image().expect("active image").annotations.as_slice()[0]
            .key
            .clone();
        assert!(session.set_hover(Some(key.clone())).redraw);
        assert_eq!(session.hover(), Some(&key));
    }

    #[test]
    fn clear_boxes_empties_active_store() {
        let mut session = loaded_session(1);
        draw(&mut session, (0.0, 0.0), (10.0, 10.0));
        assert!(session.clear_boxes().store_changed);
        assert!(active_rects(&session).is_empty());
        assert!(session.clear_boxes().is_empty());
    }

    #[test]
    fn progress_counts_done_images() {
        let mut session = loaded_session(4);
        assert_eq!(session.progress(), 0.0);
        session.apply_shortcut(ShortcutAction::ToggleDone);
        assert_eq!(session.progress(), 25.0);
        session.toggle_done();
        assert_eq!(session.progress(), 0.0);
    }

    #[test]
    fn detect_shortcut_is_forwarded_to_the_shell() {
        let mut session = loaded_session(1);
        let update = session.apply_shortcut(ShortcutAction::Detect);
        assert!(update.detect_requested);
    }

    #[test]
    fn render_plan_includes_draft_while_drawing() {
        let mut session = loaded_session(1);
        draw(&mut session, (0.0, 0.0), (10.0, 10.0));
        session.pointer_down(ScreenPoint::new(20.0, 20.0));
        session.pointer_move(ScreenPoint::new(40.0, 40.0));
        let plan = session.render_plan(&FixedAdvance).expect("loaded image");
        assert_eq!(plan.commands.len(), 4);
    }

    #[test]
    fn decode_before_canvas_size_is_fitted_on_first_resize() {
        let mut session = LabellingSession::new(TagVocabulary::default(), SessionSettings::default());
        let (key, _) = session.add_image(PathBuf::from("/shots/a.png"), 1);
        session.image_decoded(&key, Size::new(1000.0, 500.0));
        assert_eq!(session.viewport().scale(), 1.0);
        session.resize(Size::new(500.0, 500.0));
        assert_eq!(session.viewport().scale(), 0.5);
        session.resize(Size::new(800.0, 800.0));
        assert_eq!(session.viewport().scale(), 0.5);
    }
}
