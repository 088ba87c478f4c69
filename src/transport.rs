//! Visitor and operator transports
//!
//! Both sides are thin duplex channels: a `send` returning a delivery
//! result, plus an inbound event stream owned by the adapter's task.

pub mod telegram;
pub mod traits;
pub mod visitor;

#[cfg(test)]
pub mod testing;

pub use telegram::TelegramOperator;
pub use traits::*;
pub use visitor::WsVisitor;

use std::fmt;

/// Identifier the operator transport assigns to an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How operator-bound text is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Plain,
    /// Lightweight emphasis markup
    Markdown,
}

/// Operator commands that answer with static text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    Start,
    Help,
}

impl OperatorCommand {
    pub fn reply_text(self) -> &'static str {
        match self {
            OperatorCommand::Start => {
                "Future Growth Support Bot Ready.\nCreate a web session to test."
            }
            OperatorCommand::Help => {
                "Reply to a message to speak to that specific user.\nOr simply type to speak to the last active user."
            }
        }
    }
}

/// Something the operator did, already filtered to the configured operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    Command(OperatorCommand),
    Text {
        /// Outbound message the operator replied to, if any
        reply_to: Option<MessageId>,
        text: String,
    },
}
