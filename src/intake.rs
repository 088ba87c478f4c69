//! Scripted intake dialogue
//!
//! Pure state transitions: the router feeds visitor text in, applies the
//! returned effects to the session and performs any I/O itself.

mod effect;
pub mod state;
mod summary;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use state::{Field, IntakeRecord, Phase};
pub use summary::render_summary;
pub use transition::{transition, TransitionError, TransitionResult, GREETING};
