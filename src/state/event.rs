use super::model::InteractionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    PointerDown,
    PointerMove,
    PointerUp,
    SelectModeButton,
    PanModeButton,
    PanKeyPressed,
    PanKeyReleased,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: InteractionState,
    pub event: InteractionEvent,
    pub to: InteractionState,
}

impl StateTransition {
    pub const fn new(from: InteractionState, event: InteractionEvent, to: InteractionState) -> Self {
        Self { from, event, to }
    }
}
