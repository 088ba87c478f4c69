//! Operator event loop
//!
//! One task consumes operator events in arrival order: commands get their
//! static reply, text is routed to a visitor, and routing failures come
//! back to the operator as a plain notice.

use crate::router::Router;
use crate::transport::OperatorEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn handle_event(router: &Router, event: OperatorEvent) {
    match event {
        OperatorEvent::Command(command) => {
            tracing::debug!(command = ?command, "Operator command");
            router.notify_operator(command.reply_text()).await;
        }
        OperatorEvent::Text { reply_to, text } => {
            match router.on_operator_text(reply_to, &text).await {
                Ok(target) => {
                    tracing::debug!(session_id = %target, "Operator message routed");
                }
                Err(e) => {
                    tracing::info!(error = %e, "Operator message not routed");
                    router.notify_operator(&e.operator_notice()).await;
                }
            }
        }
    }
}

/// Run until the event source closes
pub async fn run(router: Arc<Router>, mut events: mpsc::Receiver<OperatorEvent>) {
    while let Some(event) = events.recv().await {
        handle_event(&router, event).await;
    }
    tracing::info!("Operator event loop stopped");
}
