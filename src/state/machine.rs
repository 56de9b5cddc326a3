use std::collections::VecDeque;

use super::error::{StateError, StateResult};
use super::event::{InteractionEvent, StateTransition};
use super::model::{DraftBox, InteractionMode, InteractionState};
use crate::annotation::BoxKey;
use crate::geometry::{ImageRect, ScreenPoint};
use crate::viewport::Viewport;

const TRANSITION_HISTORY_LIMIT: usize = 64;

/// What a pointer or mode event did, so the caller can update the store and
/// the viewport and decide whether to redraw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MachineOutput {
    Nothing,
    DraftChanged,
    /// Normalized, non-empty rectangle ready to be stored.
    Committed(ImageRect),
    DraftDiscarded,
    Panned { delta_x: f64, delta_y: f64 },
    DragEnded,
    ModeChanged(InteractionMode),
    Cancelled,
}

#[derive(Debug)]
pub struct DrawingMachine {
    state: InteractionState,
    draft: Option<DraftBox>,
    pan_anchor: Option<ScreenPoint>,
    hover: Option<BoxKey>,
    pan_held: bool,
    hold_release_pending: bool,
    transition_history: VecDeque<StateTransition>,
}

impl DrawingMachine {
    pub fn new() -> Self {
        Self {
            state: InteractionState::default(),
            draft: None,
            pan_anchor: None,
            hover: None,
            pan_held: false,
            hold_release_pending: false,
            transition_history: VecDeque::new(),
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn mode(&self) -> InteractionMode {
        self.state.mode()
    }

    pub fn draft(&self) -> Option<DraftBox> {
        self.draft
    }

    pub fn hover(&self) -> Option<&BoxKey> {
        self.hover.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        self.state.is_drawing()
    }

    pub fn is_pan_held(&self) -> bool {
        self.pan_held
    }

    pub fn next_state(&self, event: InteractionEvent) -> Option<InteractionState> {
        use InteractionEvent::*;
        use InteractionState::*;
        match (self.state, event) {
            (SelectIdle, PointerDown) => Some(SelectDrawing),
            (SelectDrawing, PointerMove) => Some(SelectDrawing),
            (SelectDrawing, PointerUp) => Some(SelectIdle),
            (PanIdle, PointerDown) => Some(PanDragging),
            (PanDragging, PointerMove) => Some(PanDragging),
            (PanDragging, PointerUp | Cancel) if self.hold_release_pending => Some(SelectIdle),
            (PanDragging, PointerUp) => Some(PanIdle),
            (_, SelectModeButton) => Some(SelectIdle),
            (_, PanModeButton) => Some(PanIdle),
            (SelectIdle, PanKeyPressed) => Some(PanIdle),
            (PanIdle, PanKeyReleased) if self.pan_held => Some(SelectIdle),
            (PanDragging, PanKeyReleased) if self.pan_held => Some(PanDragging),
            (SelectIdle | SelectDrawing, Cancel) => Some(SelectIdle),
            (PanIdle | PanDragging, Cancel) => Some(PanIdle),
            _ => None,
        }
    }

    /// Applies `event` to the state alone, recording state changes.
    pub fn transition(&mut self, event: InteractionEvent) -> StateResult<InteractionState> {
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::trace!(from = ?from, event = ?event, "ignored interaction event");
            StateError::InvalidTransition { from, event }
        })?;

        if next != self.state {
            tracing::debug!(from = ?self.state, event = ?event, to = ?next, "interaction transition");
            if self.transition_history.len() == TRANSITION_HISTORY_LIMIT {
                self.transition_history.pop_front();
            }
            self.transition_history
                .push_back(StateTransition::new(self.state, event, next));
        }
        self.state = next;
        Ok(self.state)
    }

    pub fn pointer_down(&mut self, point: ScreenPoint, viewport: &Viewport) -> MachineOutput {
        match self.transition(InteractionEvent::PointerDown) {
            Ok(InteractionState::SelectDrawing) => {
                self.draft = Some(DraftBox::at(viewport.screen_to_image(point)));
                MachineOutput::DraftChanged
            }
            Ok(InteractionState::PanDragging) => {
                self.pan_anchor = Some(point);
                MachineOutput::Nothing
            }
            Ok(_) | Err(_) => MachineOutput::Nothing,
        }
    }

    pub fn pointer_move(&mut self, point: ScreenPoint, viewport: &Viewport) -> MachineOutput {
        if self.transition(InteractionEvent::PointerMove).is_err() {
            return MachineOutput::Nothing;
        }
        match self.state {
            InteractionState::SelectDrawing => {
                let Some(draft) = self.draft.as_mut() else {
                    return MachineOutput::Nothing;
                };
                draft.stretch_to(viewport.screen_to_image(point));
                MachineOutput::DraftChanged
            }
            InteractionState::PanDragging => {
                let Some(anchor) = self.pan_anchor.replace(point) else {
                    return MachineOutput::Nothing;
                };
                MachineOutput::Panned {
                    delta_x: point.x - anchor.x,
                    delta_y: point.y - anchor.y,
                }
            }
            InteractionState::SelectIdle | InteractionState::PanIdle => MachineOutput::Nothing,
        }
    }

    pub fn pointer_up(&mut self, point: ScreenPoint, viewport: &Viewport) -> MachineOutput {
        let from = self.state;
        let Ok(next) = self.transition(InteractionEvent::PointerUp) else {
            return MachineOutput::Nothing;
        };
        match from {
            InteractionState::SelectDrawing => {
                let Some(mut draft) = self.draft.take() else {
                    return MachineOutput::DraftDiscarded;
                };
                draft.stretch_to(viewport.screen_to_image(point));
                match draft.committed_rect() {
                    Some(rect) => MachineOutput::Committed(rect),
                    None => MachineOutput::DraftDiscarded,
                }
            }
            InteractionState::PanDragging => {
                self.pan_anchor = None;
                if next == InteractionState::SelectIdle {
                    self.end_pan_hold();
                    MachineOutput::ModeChanged(InteractionMode::Select)
                } else {
                    MachineOutput::DragEnded
                }
            }
            InteractionState::SelectIdle | InteractionState::PanIdle => MachineOutput::Nothing,
        }
    }

    /// Toolbar mode button: switches immediately and drops any draft or drag.
    pub fn set_mode(&mut self, mode: InteractionMode) -> MachineOutput {
        if self.state == mode.idle_state() {
            self.end_pan_hold();
            return MachineOutput::Nothing;
        }
        let event = match mode {
            InteractionMode::Select => InteractionEvent::SelectModeButton,
            InteractionMode::Pan => InteractionEvent::PanModeButton,
        };
        if self.transition(event).is_err() {
            return MachineOutput::Nothing;
        }
        self.draft = None;
        self.pan_anchor = None;
        self.end_pan_hold();
        MachineOutput::ModeChanged(mode)
    }

    /// Holding the pan key switches to pan, unless a box is being drawn.
    pub fn pan_key_pressed(&mut self) -> MachineOutput {
        if self.transition(InteractionEvent::PanKeyPressed).is_err() {
            return MachineOutput::Nothing;
        }
        self.pan_held = true;
        MachineOutput::ModeChanged(InteractionMode::Pan)
    }

    pub fn pan_key_released(&mut self) -> MachineOutput {
        let from = self.state;
        if self.transition(InteractionEvent::PanKeyReleased).is_err() {
            return MachineOutput::Nothing;
        }
        if from == InteractionState::PanDragging {
            self.hold_release_pending = true;
            return MachineOutput::Nothing;
        }
        self.end_pan_hold();
        MachineOutput::ModeChanged(InteractionMode::Select)
    }

    /// Escape: drop the draft, the drag and the hover highlight.
    pub fn cancel(&mut self) -> MachineOutput {
        let had_draft = self.draft.take().is_some();
        let had_hover = self.hover.take().is_some();
        let had_drag = self.pan_anchor.take().is_some();
        let releasing = self.hold_release_pending;
        if self.transition(InteractionEvent::Cancel).is_err() {
            return MachineOutput::Nothing;
        }
        if releasing {
            self.end_pan_hold();
        }
        if had_draft || had_hover || had_drag {
            MachineOutput::Cancelled
        } else {
            MachineOutput::Nothing
        }
    }

    pub fn set_hover(&mut self, key: Option<BoxKey>) -> bool {
        if self.hover == key {
            return false;
        }
        self.hover = key;
        true
    }

    /// Drops transient geometry when the active image changes. The mode is kept.
    pub fn reset(&mut self) {
        self.draft = None;
        self.pan_anchor = None;
        self.hover = None;
        self.hold_release_pending = false;
        self.state = self.state.mode().idle_state();
        if self.pan_held && self.state == InteractionState::PanIdle {
            return;
        }
        self.pan_held = false;
    }

    fn end_pan_hold(&mut self) {
        self.pan_held = false;
        self.hold_release_pending = false;
    }
}

#[cfg(test)]
impl DrawingMachine {
    fn history(&self) -> Vec<StateTransition> {
        self.transition_history.iter().copied().collect()
    }
}

impl Default for DrawingMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DrawingMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InteractionState::{:?}", self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PanOffset, Size};
    use crate::viewport::ViewportLimits;

    fn identity_viewport() -> Viewport {
        Viewport::new(ViewportLimits::default())
    }

    fn zoomed_viewport() -> Viewport {
        let mut viewport = identity_viewport();
        viewport.resize(Size::new(1000.0, 1000.0));
        viewport.zoom_by(1.0);
        viewport.pan_by(10.0, 20.0);
        viewport
    }

    fn draw(
        machine: &mut DrawingMachine,
        viewport: &Viewport,
        from: (f64, f64),
        to: (f64, f64),
    ) -> MachineOutput {
        machine.pointer_down(ScreenPoint::new(from.0, from.1), viewport);
        machine.pointer_move(ScreenPoint::new(to.0, to.1), viewport);
        machine.pointer_up(ScreenPoint::new(to.0, to.1), viewport)
    }

    #[test]
    fn drawing_in_any_direction_commits_normalized_rect() {
        let viewport = identity_viewport();
        let expected = ImageRect::new(10.0, 20.0, 30.0, 40.0);
        let drags = [
            ((10.0, 20.0), (40.0, 60.0)),
            ((40.0, 60.0), (10.0, 20.0)),
            ((40.0, 20.0), (10.0, 60.0)),
            ((10.0, 60.0), (40.0, 20.0)),
        ];
        for (from, to) in drags {
            let mut machine = DrawingMachine::new();
            assert_eq!(
                draw(&mut machine, &viewport, from, to),
                MachineOutput::Committed(expected)
            );
            assert_eq!(machine.state(), InteractionState::SelectIdle);
            assert!(machine.draft().is_none());
        }
    }

    #[test]
    fn drawing_uses_image_coordinates_under_zoom_and_pan() {
        let viewport = zoomed_viewport();
        assert_eq!(viewport.pan(), PanOffset::new(10.0, 20.0));
        let mut machine = DrawingMachine::new();
        let output = draw(&mut machine, &viewport, (30.0, 40.0), (10.0, 60.0));
        assert_eq!(
            output,
            MachineOutput::Committed(ImageRect::new(0.0, 10.0, 10.0, 10.0))
        );
    }

    #[test]
    fn click_without_movement_is_discarded() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        assert_eq!(
            machine.pointer_down(ScreenPoint::new(5.0, 5.0), &viewport),
            MachineOutput::DraftChanged
        );
        assert_eq!(
            machine.pointer_up(ScreenPoint::new(5.0, 5.0), &viewport),
            MachineOutput::DraftDiscarded
        );

        let output = draw(&mut machine, &viewport, (5.0, 5.0), (25.0, 5.0));
        assert_eq!(output, MachineOutput::DraftDiscarded);
        assert_eq!(machine.state(), InteractionState::SelectIdle);
    }

    #[test]
    fn draft_tracks_signed_extents_while_dragging() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        machine.pointer_down(ScreenPoint::new(50.0, 50.0), &viewport);
        machine.pointer_move(ScreenPoint::new(20.0, 70.0), &viewport);
        let draft = machine.draft().expect("drawing");
        assert_eq!(draft.rect(), ImageRect::new(50.0, 50.0, -30.0, 20.0));
    }

    #[test]
    fn pan_drag_reports_incremental_deltas() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        machine.set_mode(InteractionMode::Pan);
        machine.pointer_down(ScreenPoint::new(100.0, 100.0), &viewport);
        assert_eq!(machine.state(), InteractionState::PanDragging);
        assert_eq!(
            machine.pointer_move(ScreenPoint::new(110.0, 95.0), &viewport),
            MachineOutput::Panned {
                delta_x: 10.0,
                delta_y: -5.0
            }
        );
        assert_eq!(
            machine.pointer_move(ScreenPoint::new(111.0, 95.0), &viewport),
            MachineOutput::Panned {
                delta_x: 1.0,
                delta_y: 0.0
            }
        );
        assert_eq!(
            machine.pointer_up(ScreenPoint::new(111.0, 95.0), &viewport),
            MachineOutput::DragEnded
        );
        assert_eq!(machine.state(), InteractionState::PanIdle);
    }

    #[test]
    fn pan_key_is_ignored_while_drawing() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        machine.pointer_down(ScreenPoint::new(0.0, 0.0), &viewport);
        assert_eq!(machine.pan_key_pressed(), MachineOutput::Nothing);
        assert_eq!(machine.state(), InteractionState::SelectDrawing);
        assert!(!machine.is_pan_held());
    }

    #[test]
    fn pan_key_hold_switches_and_release_returns_to_select() {
        let mut machine = DrawingMachine::new();
        assert_eq!(
            machine.pan_key_pressed(),
            MachineOutput::ModeChanged(InteractionMode::Pan)
        );
        assert_eq!(machine.pan_key_pressed(), MachineOutput::Nothing);
        assert_eq!(
            machine.pan_key_released(),
            MachineOutput::ModeChanged(InteractionMode::Select)
        );
        assert_eq!(machine.state(), InteractionState::SelectIdle);
    }

    #[test]
    fn pan_key_release_mid_drag_waits_for_pointer_up() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        machine.pan_key_pressed();
        machine.pointer_down(ScreenPoint::new(0.0, 0.0), &viewport);
        assert_eq!(machine.pan_key_released(), MachineOutput::Nothing);
        assert_eq!(machine.state(), InteractionState::PanDragging);
        assert_eq!(
            machine.pointer_up(ScreenPoint::new(4.0, 4.0), &viewport),
            MachineOutput::ModeChanged(InteractionMode::Select)
        );
        assert_eq!(machine.state(), InteractionState::SelectIdle);
    }

    #[test]
    fn pan_key_release_keeps_button_selected_pan_mode() {
        let mut machine = DrawingMachine::new();
        machine.set_mode(InteractionMode::Pan);
        assert_eq!(machine.pan_key_released(), MachineOutput::Nothing);
        assert_eq!(machine.state(), InteractionState::PanIdle);
    }

    #[test]
    fn mode_button_cancels_draft_immediately() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        machine.pointer_down(ScreenPoint::new(0.0, 0.0), &viewport);
        machine.pointer_move(ScreenPoint::new(10.0, 10.0), &viewport);
        assert_eq!(
            machine.set_mode(InteractionMode::Pan),
            MachineOutput::ModeChanged(InteractionMode::Pan)
        );
        assert!(machine.draft().is_none());
        assert_eq!(
            machine.pointer_up(ScreenPoint::new(10.0, 10.0), &viewport),
            MachineOutput::Nothing
        );
        assert_eq!(machine.set_mode(InteractionMode::Pan), MachineOutput::Nothing);
    }

    #[test]
    fn escape_clears_draft_and_hover_in_current_mode() {
        let viewport = identity_viewport();
        let mut machine = DrawingMachine::new();
        machine.set_hover(Some(BoxKey::new("box-1")));
        machine.pointer_down(ScreenPoint::new(0.0, 0.0), &viewport);
        assert_eq!(machine.cancel(), MachineOutput::Cancelled);
        assert_eq!(machine.state(), InteractionState::SelectIdle);
        assert!(machine.draft().is_none());
        assert!(machine.hover().is_none());

        machine.set_mode(InteractionMode::Pan);
        machine.pointer_down(ScreenPoint::new(0.0, 0.0), &viewport);
        assert_eq!(machine.cancel(), MachineOutput::Cancelled);
        assert_eq!(machine.state(), InteractionState::PanIdle);
        assert_eq!(machine.cancel(), MachineOutput::Nothing);
    }

    #[test]
    fn hover_reports_changes_only() {
        let mut machine = DrawingMachine::new();
        assert!(machine.set_hover(Some(BoxKey::new("box-2"))));
        assert!(!machine.set_hover(Some(BoxKey::new("box-2"))));
        assert!(machine.set_hover(None));
    }

    #[test]
    fn transition_records_history_of_state_changes_only() {
        let mut machine = DrawingMachine::new();
        machine
            .transition(InteractionEvent::PointerDown)
            .expect("select idle -> drawing");
        machine
            .transition(InteractionEvent::PointerMove)
            .expect("drawing -> drawing");
        machine
            .transition(InteractionEvent::PointerUp)
            .expect("drawing -> idle");

        assert_eq!(
            machine.history(),
            vec![
                StateTransition::new(
                    InteractionState::SelectIdle,
                    InteractionEvent::PointerDown,
                    InteractionState::SelectDrawing
                ),
                StateTransition::new(
                    InteractionState::SelectDrawing,
                    InteractionEvent::PointerUp,
                    InteractionState::SelectIdle
                ),
            ]
        );
    }

    #[test]
    fn invalid_transition_returns_error_without_mutating_history() {
        let mut machine = DrawingMachine::new();
        let err = machine
            .transition(InteractionEvent::PointerUp)
            .expect_err("idle pointer up has no transition");
        assert_eq!(
            err,
            StateError::InvalidTransition {
                from: InteractionState::SelectIdle,
                event: InteractionEvent::PointerUp
            }
        );
        assert_eq!(machine.state(), InteractionState::SelectIdle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut machine = DrawingMachine::new();
        for _ in 0..TRANSITION_HISTORY_LIMIT {
            machine.set_mode(InteractionMode::Pan);
            machine.set_mode(InteractionMode::Select);
        }
        assert_eq!(machine.history().len(), TRANSITION_HISTORY_LIMIT);
    }
}
