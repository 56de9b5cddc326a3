//! Interaction state machine of the annotation canvas.

pub mod error;
pub mod event;
pub mod machine;
pub mod model;

pub use error::{StateError, StateResult};
pub use event::{InteractionEvent, StateTransition};
pub use machine::{DrawingMachine, MachineOutput};
pub use model::{DraftBox, InteractionMode, InteractionState};
