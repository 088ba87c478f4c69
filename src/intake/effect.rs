//! Effects produced by intake transitions

use super::state::Field;

/// Effects the router carries out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write a collected answer into the session record
    Record { field: Field, value: String },

    /// Send scripted text to the visitor
    Prompt { text: &'static str },

    /// Intake is complete: send the summary to the operator and bridge
    NotifyOperator,
}

impl Effect {
    pub fn record(field: Field, value: impl Into<String>) -> Self {
        Effect::Record {
            field,
            value: value.into(),
        }
    }

    pub fn prompt(text: &'static str) -> Self {
        Effect::Prompt { text }
    }
}
