//! Visitor sessions and the in-memory store that owns them

use crate::error::RelayError;
use crate::intake::{Effect, IntakeRecord, Phase, TransitionResult};
use crate::transport::VisitorChannel;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

const MAX_SESSION_ID_LEN: usize = 64;

/// Opaque, validated visitor session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Accept 1..=64 characters of `[A-Za-z0-9_-]`
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(RelayError::InvalidSessionId(raw.to_string()))
        }
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tells apart successive connections that reuse one session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(u64);

/// One visitor's connection-scoped conversation
pub struct Session {
    id: SessionId,
    connection: ConnectionId,
    visitor: Arc<dyn VisitorChannel>,
    phase: Phase,
    record: IntakeRecord,
    /// Set once the operator has received the intake summary
    bridged: bool,
    last_activity: Instant,
}

impl Session {
    fn new(
        id: SessionId,
        connection: ConnectionId,
        visitor: Arc<dyn VisitorChannel>,
        now: Instant,
    ) -> Self {
        Self {
            id,
            connection,
            visitor,
            phase: Phase::AwaitingInquiry,
            record: IntakeRecord::default(),
            bridged: false,
            last_activity: now,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn visitor(&self) -> Arc<dyn VisitorChannel> {
        Arc::clone(&self.visitor)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn record(&self) -> &IntakeRecord {
        &self.record
    }

    pub fn is_bridged(&self) -> bool {
        self.bridged
    }

    /// Intake finished but the operator never got the summary
    pub fn handoff_pending(&self) -> bool {
        self.phase.is_bridged() && !self.bridged
    }

    /// No activity at or after `cutoff`
    pub fn inactive_since(&self, cutoff: Instant) -> bool {
        self.last_activity < cutoff
    }

    pub fn touch(&mut self, now: Instant) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    pub(crate) fn mark_bridged(&mut self) {
        self.bridged = true;
    }

    /// Apply the record effects and phase of an intake transition
    pub fn apply(&mut self, result: &TransitionResult) {
        debug_assert!(result.next_phase > self.phase, "intake phase moved backward");
        if result.next_phase <= self.phase {
            return;
        }
        for effect in &result.effects {
            if let Effect::Record { field, value } = effect {
                self.record.set_once(*field, value.as_str());
            }
        }
        self.phase = result.next_phase;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("phase", &self.phase)
            .field("record", &self.record)
            .field("bridged", &self.bridged)
            .finish_non_exhaustive()
    }
}

/// Session identifier to session. No I/O, no locking.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    /// `None` means unbounded
    max_sessions: Option<usize>,
    next_connection: u64,
}

impl SessionStore {
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
            next_connection: 0,
        }
    }

    pub fn create(
        &mut self,
        id: SessionId,
        visitor: Arc<dyn VisitorChannel>,
        now: Instant,
    ) -> Result<&mut Session, RelayError> {
        if self.sessions.contains_key(&id) {
            return Err(RelayError::SessionExists(id));
        }
        if let Some(limit) = self.max_sessions {
            if self.sessions.len() >= limit {
                return Err(RelayError::AtCapacity { limit });
            }
        }
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;
        Ok(self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id, connection, visitor, now)))
    }

    pub fn get(&self, id: &SessionId) -> Result<&Session, RelayError> {
        self.sessions
            .get(id)
            .ok_or_else(|| RelayError::NotFound(id.clone()))
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session, RelayError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| RelayError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove `id` only when `matches` accepts the stored session
    pub fn remove_if(
        &mut self,
        id: &SessionId,
        matches: impl FnOnce(&Session) -> bool,
    ) -> Option<Session> {
        if self.sessions.get(id).is_some_and(matches) {
            self.sessions.remove(id)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions whose last activity is strictly before `cutoff`
    pub fn idle_before(&self, cutoff: Instant) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.inactive_since(cutoff))
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
