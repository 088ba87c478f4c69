//! Support Relay - visitor chat bridged to a human operator
//!
//! Web visitors chat over WebSockets; after a short scripted intake their
//! messages are relayed to a single operator on Telegram, and the
//! operator's replies are routed back to the right visitor.

mod api;
mod config;
mod correlation;
mod error;
mod intake;
mod operator;
mod router;
mod session;
mod transport;

use api::{create_router, AppState};
use config::RelayConfig;
use router::Router;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::TelegramOperator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "support_relay=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = RelayConfig::from_env()?;
    tracing::info!(config = ?config, "Configuration loaded");

    // Operator transport
    let telegram = Arc::new(TelegramOperator::new(
        config.bot_token.clone(),
        config.operator_chat_id.clone(),
    ));
    if telegram.health_check().await {
        tracing::info!("Operator bot reachable");
    } else {
        tracing::warn!("Operator bot not reachable; check TELEGRAM_BOT_TOKEN");
    }

    let relay = Arc::new(Router::new(telegram.clone(), config.max_sessions));
    let shutdown = CancellationToken::new();

    // Operator side: poller feeds the event loop
    let (event_tx, event_rx) = mpsc::channel(64);
    let poller = {
        let telegram = Arc::clone(&telegram);
        let cancel = shutdown.clone();
        tokio::spawn(async move { telegram.run_poller(event_tx, cancel).await })
    };
    let operator_loop = tokio::spawn(operator::run(Arc::clone(&relay), event_rx));

    let reaper = config
        .idle_timeout
        .map(|max_idle| relay.spawn_idle_reaper(max_idle, shutdown.clone()));

    // Create router
    let state = AppState::new(Arc::clone(&relay), config.pages_dir.clone());
    let app = create_router(state, &config.static_dir).layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.listen_addr();
    tracing::info!("Support relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
            server_shutdown.cancel();
        })
        .await?;

    shutdown.cancel();
    let _ = poller.await;
    let _ = operator_loop.await;
    if let Some(reaper) = reaper {
        let _ = reaper.await;
    }

    tracing::info!("Support relay stopped");
    Ok(())
}
