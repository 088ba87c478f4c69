//! Operator message correlation and the focus pointer
//!
//! Entries are append-only. A session that has since disconnected leaves
//! its entries behind, so every lookup is checked against the session
//! store by the caller.

use crate::session::SessionId;
use crate::transport::MessageId;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<MessageId, SessionId>,
    /// Session the operator is talking to when not replying to anything
    focus: Option<SessionId>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that `message_id` was sent on behalf of `session_id`
    pub fn record(&mut self, message_id: MessageId, session_id: SessionId) {
        self.entries.insert(message_id, session_id);
    }

    pub fn lookup(&self, message_id: MessageId) -> Option<&SessionId> {
        self.entries.get(&message_id)
    }

    pub fn focus(&self) -> Option<&SessionId> {
        self.focus.as_ref()
    }

    pub fn set_focus(&mut self, session_id: SessionId) {
        self.focus = Some(session_id);
    }

    /// Clear the focus pointer if it names `session_id`. Returns whether it did.
    pub fn clear_focus_if(&mut self, session_id: &SessionId) -> bool {
        if self.focus.as_ref() == Some(session_id) {
            self.focus = None;
            true
        } else {
            false
        }
    }

    /// Entries recorded for `session_id`
    #[cfg(test)]
    pub fn entries_for(&self, session_id: &SessionId) -> usize {
        self.entries.values().filter(|s| *s == session_id).count()
    }
}
