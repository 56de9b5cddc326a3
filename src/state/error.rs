use super::event::InteractionEvent;
use super::model::InteractionState;
use thiserror::Error;

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid interaction transition: from {from:?} using event {event:?}")]
    InvalidTransition {
        from: InteractionState,
        event: InteractionEvent,
    },
}
