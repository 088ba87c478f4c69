//! Pure intake transition function

use super::{Effect, Field, Phase};
use thiserror::Error;

pub const GREETING: &str =
    "Welcome to the support Chat. My name is Oliver, what can I help you out with today?";

const ASK_CONTACT: &str =
    "Thank you. Please tell me your name and email in case the chat gets disconnected.";

const ASK_PHONE: &str = "Great! Lastly, what is your phone number? [We will give you a call shortly]\n*No charge to your phone Bill*";

const HANDOFF: &str = "Redirecting to next available agent! Your queue is being filtered the order it came in, Thank you.";

/// Result of an intake transition
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionResult {
    pub next_phase: Phase,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(phase: Phase) -> Self {
        Self {
            next_phase: phase,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Prompts in the order they must reach the visitor
    pub fn prompts(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Prompt { text } => Some(*text),
            _ => None,
        })
    }

    pub fn notifies_operator(&self) -> bool {
        self.effects.contains(&Effect::NotifyOperator)
    }
}

/// Input the intake machine does not act on
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("empty visitor input")]
    EmptyInput,
    #[error("intake already complete")]
    AlreadyBridged,
}

/// Given the same phase and text, always yields the same result.
/// Any non-blank text advances the phase; content is not validated.
pub fn transition(phase: Phase, text: &str) -> Result<TransitionResult, TransitionError> {
    if text.trim().is_empty() {
        return Err(TransitionError::EmptyInput);
    }

    match phase {
        Phase::AwaitingInquiry => Ok(TransitionResult::new(Phase::AwaitingContact)
            .with_effect(Effect::record(Field::Inquiry, text))
            .with_effect(Effect::prompt(ASK_CONTACT))),

        Phase::AwaitingContact => Ok(TransitionResult::new(Phase::AwaitingPhone)
            .with_effect(Effect::record(Field::Contact, text))
            .with_effect(Effect::prompt(ASK_PHONE))),

        Phase::AwaitingPhone => Ok(TransitionResult::new(Phase::Bridged)
            .with_effect(Effect::record(Field::Phone, text))
            .with_effect(Effect::prompt(HANDOFF))
            .with_effect(Effect::NotifyOperator)),

        // Bridged text is forwarded by the router, not scripted here
        Phase::Bridged => Err(TransitionError::AlreadyBridged),
    }
}
