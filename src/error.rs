//! Relay error types

use crate::session::SessionId;
use thiserror::Error;

/// Transport send failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Closed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Network, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Rejected, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::Decode, message)
    }
}

/// Why a send did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// The peer connection is gone
    Closed,
    /// Transport I/O failed
    Network,
    /// Remote API answered but refused the message
    Rejected,
    /// Remote API answered with something unparseable
    Decode,
}

/// Routing and lifecycle failures
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("no active session to route to")]
    NoActiveSession,
    #[error("session {0} is no longer connected")]
    StaleTarget(SessionId),
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[from] DeliveryError),
    #[error("message did not come from the operator")]
    Unauthorized,
    #[error("session {0} already exists")]
    SessionExists(SessionId),
    #[error("session limit of {limit} reached")]
    AtCapacity { limit: usize },
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),
}

impl RelayError {
    /// Plain-text notice shown to the operator when a reply cannot be routed
    pub fn operator_notice(&self) -> String {
        match self {
            RelayError::StaleTarget(_) | RelayError::NotFound(_) => {
                "Session disconnected or expired.".to_string()
            }
            RelayError::NoActiveSession => "No active chat. Waiting for customers...".to_string(),
            RelayError::DeliveryFailed(e) => format!("Message not delivered: {e}"),
            other => other.to_string(),
        }
    }

    /// Text sent to a visitor whose connection is refused
    pub fn visitor_notice(&self) -> &'static str {
        match self {
            RelayError::SessionExists(_) => {
                "This chat is already open in another window. Please continue there."
            }
            RelayError::AtCapacity { .. } => {
                "All of our agents are busy right now. Please try again in a few minutes."
            }
            _ => "Sorry, the chat could not be started.",
        }
    }
}
