//! Turn dispatch state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod compose;
mod effect;
pub mod event;
pub mod gate;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use gate::{OverrideDetector, PhraseDetector, DEFAULT_OVERRIDE_PHRASES};
pub use state::{
    ActiveQuiz, Difficulty, Intent, LearningStyle, LogEntry, LogRole, Mode, NextAction,
    TurnContext, TurnState,
};
pub use transition::{transition, TransitionError, Turn, TurnPhase};
