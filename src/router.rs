//! Routing between visitors and the operator
//!
//! All shared routing state (sessions, correlations, focus) lives behind a
//! single lock. Sends happen with the lock released: the router snapshots
//! what it needs, performs the I/O, then re-acquires the lock to record the
//! outcome, so a slow transport never stalls other sessions.


use crate::correlation::CorrelationTable;
use crate::error::RelayError;
use crate::intake::{render_summary, transition, TransitionError, GREETING};
use crate::session::{ConnectionId, Session, SessionId, SessionStore};
use crate::transport::{MessageId, OperatorChannel, TextFormat, VisitorChannel};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REAPER_MAX_INTERVAL: Duration = Duration::from_secs(30);

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The visitor's connection closed
    Closed,
    /// No visitor activity within the idle timeout
    IdleTimeout,
}

impl DisconnectReason {
    fn operator_notice(self, id: &SessionId) -> String {
        match self {
            DisconnectReason::Closed => format!("Client {id} disconnected."),
            DisconnectReason::IdleTimeout => format!("Client {id} timed out."),
        }
    }
}

struct RoutingState {
    sessions: SessionStore,
    correlations: CorrelationTable,
}

impl RoutingState {
    /// Reply correlation first, then the focus pointer. A candidate whose
    /// session is gone is remembered so the failure can say so.
    fn resolve_target(&self, reply_to: Option<MessageId>) -> Result<SessionId, RelayError> {
        let mut stale = None;

        if let Some(session_id) = reply_to.and_then(|mid| self.correlations.lookup(mid)) {
            if self.sessions.contains(session_id) {
                return Ok(session_id.clone());
            }
            stale = Some(session_id.clone());
        }

        if let Some(focus) = self.correlations.focus() {
            if self.sessions.contains(focus) {
                return Ok(focus.clone());
            }
            stale.get_or_insert_with(|| focus.clone());
        }

        Err(stale.map_or(RelayError::NoActiveSession, RelayError::StaleTarget))
    }
}

/// I/O decided under the lock, carried out after it is released
struct VisitorPlan {
    visitor: Arc<dyn VisitorChannel>,
    prompts: Vec<&'static str>,
    summary: Option<String>,
    forward: Option<String>,
}

pub struct Router {
    state: Mutex<RoutingState>,
    operator: Arc<dyn OperatorChannel>,
}

impl Router {
    pub fn new(operator: Arc<dyn OperatorChannel>, max_sessions: Option<usize>) -> Self {
        Self {
            state: Mutex::new(RoutingState {
                sessions: SessionStore::new(max_sessions),
                correlations: CorrelationTable::new(),
            }),
            operator,
        }
    }

    /// Register a new visitor and greet them.
    ///
    /// The returned connection id is what the caller later passes to
    /// [`Router::disconnect`].
    pub async fn connect(
        &self,
        id: SessionId,
        visitor: Arc<dyn VisitorChannel>,
    ) -> Result<ConnectionId, RelayError> {
        let (connection, live) = {
            let mut state = self.state.lock().await;
            let connection = state
                .sessions
                .create(id.clone(), Arc::clone(&visitor), Instant::now())?
                .connection();
            (connection, state.sessions.len())
        };

        tracing::info!(session_id = %id, live_sessions = live, "Visitor connected");
        deliver_to_visitor(&id, visitor.as_ref(), GREETING).await;
        Ok(connection)
    }

    /// Drive intake or forward bridged text to the operator.
    ///
    /// Delivery failures are logged and swallowed; only a missing session
    /// is reported back.
    pub async fn on_visitor_text(&self, id: &SessionId, text: &str) -> Result<(), RelayError> {
        let plan = {
            let mut state = self.state.lock().await;
            let live = state.sessions.len();
            let session = state.sessions.get_mut(id)?;
            session.touch(Instant::now());

            if text.trim().is_empty() {
                return Ok(());
            }

            if session.phase().is_bridged() {
                VisitorPlan {
                    visitor: session.visitor(),
                    prompts: vec![],
                    summary: session
                        .handoff_pending()
                        .then(|| render_summary(session.record(), live)),
                    forward: Some(format!("[{id}]: {text}")),
                }
            } else {
                let result = match transition(session.phase(), text) {
                    Ok(result) => result,
                    Err(TransitionError::EmptyInput | TransitionError::AlreadyBridged) => {
                        return Ok(());
                    }
                };
                session.apply(&result);
                tracing::debug!(session_id = %id, phase = %session.phase(), "Intake advanced");

                VisitorPlan {
                    visitor: session.visitor(),
                    prompts: result.prompts().collect(),
                    summary: result
                        .notifies_operator()
                        .then(|| render_summary(session.record(), live)),
                    forward: None,
                }
            }
        };

        for prompt in &plan.prompts {
            deliver_to_visitor(id, plan.visitor.as_ref(), prompt).await;
        }

        if let Some(summary) = plan.summary {
            match self.operator.send(&summary, TextFormat::Markdown).await {
                Ok(message_id) => self.record_operator_message(id, message_id, true).await,
                Err(e) => {
                    tracing::warn!(
                        session_id = %id,
                        kind = ?e.kind,
                        error = %e,
                        "Intake summary not delivered"
                    );
                    return Ok(());
                }
            }
        }

        if let Some(forward) = plan.forward {
            match self.operator.send(&forward, TextFormat::Plain).await {
                Ok(message_id) => self.record_operator_message(id, message_id, false).await,
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Visitor message not forwarded");
                }
            }
        }

        Ok(())
    }

    /// Record an operator-bound message and move focus to its session
    async fn record_operator_message(
        &self,
        id: &SessionId,
        message_id: MessageId,
        completes_handoff: bool,
    ) {
        let still_connected = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            state.correlations.record(message_id, id.clone());
            if let Ok(session) = state.sessions.get_mut(id) {
                if completes_handoff {
                    session.mark_bridged();
                }
                state.correlations.set_focus(id.clone());
                true
            } else {
                false
            }
        };

        if completes_handoff {
            if still_connected {
                tracing::info!(
                    session_id = %id,
                    message_id = %message_id,
                    "Session bridged to operator"
                );
            } else {
                // The visitor left while the summary was in flight
                self.notify_operator(&DisconnectReason::Closed.operator_notice(id))
                    .await;
            }
        }
    }

    /// Route operator text to a visitor, returning who received it
    pub async fn on_operator_text(
        &self,
        reply_to: Option<MessageId>,
        text: &str,
    ) -> Result<SessionId, RelayError> {
        let (target, visitor) = {
            let mut state = self.state.lock().await;
            let target = state.resolve_target(reply_to)?;
            state.correlations.set_focus(target.clone());
            let session = state.sessions.get_mut(&target)?;
            session.touch(Instant::now());
            (target, session.visitor())
        };

        visitor.send(text).await.map_err(|e| {
            tracing::warn!(session_id = %target, error = %e, "Operator reply not delivered");
            RelayError::from(e)
        })?;

        tracing::debug!(session_id = %target, "Operator reply delivered");
        Ok(target)
    }

    /// End the session opened by `connection`. Once this returns no operator
    /// message can resolve to it. A later connection that reused `id` is left
    /// alone.
    pub async fn disconnect(
        &self,
        id: &SessionId,
        connection: ConnectionId,
        reason: DisconnectReason,
    ) {
        self.end_session(id, reason, |session| session.connection() == connection)
            .await;
    }

    /// Remove `id` if `matches` still holds under the lock; true if removed
    async fn end_session(
        &self,
        id: &SessionId,
        reason: DisconnectReason,
        matches: impl FnOnce(&Session) -> bool,
    ) -> bool {
        let removed = {
            let mut state = self.state.lock().await;
            let removed = state.sessions.remove_if(id, matches);
            if removed.is_some() {
                state.correlations.clear_focus_if(id);
            }
            removed
        };

        let Some(session) = removed else {
            return false;
        };

        session.visitor().close();
        tracing::info!(
            session_id = %id,
            reason = ?reason,
            phase = %session.phase(),
            "Visitor session ended"
        );

        if session.is_bridged() {
            self.notify_operator(&reason.operator_notice(id)).await;
        }
        true
    }

    /// Plain-text notice to the operator; failures are only logged
    pub async fn notify_operator(&self, text: &str) {
        if let Err(e) = self.operator.send(text, TextFormat::Plain).await {
            tracing::warn!(error = %e, "Operator notice not delivered");
        }
    }

    /// Evict sessions with no activity since `cutoff`
    pub async fn evict_idle_before(&self, cutoff: Instant) -> Vec<SessionId> {
        let idle = self.state.lock().await.sessions.idle_before(cutoff);
        let mut evicted = Vec::with_capacity(idle.len());
        for id in idle {
            // Activity since the scan keeps the session
            let removed = self
                .end_session(&id, DisconnectReason::IdleTimeout, |session| {
                    session.inactive_since(cutoff)
                })
                .await;
            if removed {
                evicted.push(id);
            }
        }
        evicted
    }

    /// Periodically evict sessions idle longer than `max_idle`
    pub fn spawn_idle_reaper(
        self: &Arc<Self>,
        max_idle: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let period = max_idle.min(REAPER_MAX_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(cutoff) = Instant::now().checked_sub(max_idle) else {
                    continue;
                };
                let evicted = router.evict_idle_before(cutoff).await;
                if !evicted.is_empty() {
                    tracing::info!(count = evicted.len(), "Evicted idle sessions");
                }
            }
            tracing::info!("Idle reaper stopped");
        })
    }
}

async fn deliver_to_visitor(id: &SessionId, visitor: &dyn VisitorChannel, text: &str) {
    if let Err(e) = visitor.send(text).await {
        tracing::warn!(session_id = %id, kind = ?e.kind, error = %e, "Visitor delivery failed");
    }
}

#[cfg(test)]
impl Router {
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn connection_of(&self, id: &SessionId) -> Option<ConnectionId> {
        self.state
            .lock()
            .await
            .sessions
            .get(id)
            .ok()
            .map(Session::connection)
    }

    pub async fn phase_of(&self, id: &SessionId) -> Option<crate::intake::Phase> {
        self.state.lock().await.sessions.get(id).ok().map(|s| s.phase())
    }

    pub async fn record_of(&self, id: &SessionId) -> Option<crate::intake::IntakeRecord> {
        self.state
            .lock()
            .await
            .sessions
            .get(id)
            .ok()
            .map(|s| s.record().clone())
    }

    pub async fn is_bridged(&self, id: &SessionId) -> bool {
        self.state
            .lock()
            .await
            .sessions
            .get(id)
            .is_ok_and(Session::is_bridged)
    }

    pub async fn focus(&self) -> Option<SessionId> {
        self.state.lock().await.correlations.focus().cloned()
    }

    pub async fn correlations_for(&self, id: &SessionId) -> usize {
        self.state.lock().await.correlations.entries_for(id)
    }

    pub async fn lookup_correlation(&self, message_id: MessageId) -> Option<SessionId> {
        self.state
            .lock()
            .await
            .correlations
            .lookup(message_id)
            .cloned()
    }
}
