//! Telegram Bot API operator channel
//!
//! Sends with `sendMessage` and long-polls `getUpdates` for operator input.

use super::{MessageId, OperatorChannel, OperatorCommand, OperatorEvent, TextFormat};
use crate::error::{DeliveryError, RelayError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Operator reachable through a Telegram bot, fixed to one chat
pub struct TelegramOperator {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<IncomingMessage>>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramOperator {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Call a Bot API method and unwrap its `{ok, result}` envelope
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, DeliveryError> {
        // reqwest errors carry the URL, which embeds the token
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DeliveryError::network(e.without_url().to_string()))?;

        let status = resp.status();
        let envelope: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| DeliveryError::decode(format!("{method}: {}", e.without_url())))?;

        if !envelope.ok {
            let reason = envelope
                .description
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(DeliveryError::rejected(format!("{method}: {reason}")));
        }
        envelope
            .result
            .ok_or_else(|| DeliveryError::decode(format!("{method}: missing result")))
    }

    pub async fn health_check(&self) -> bool {
        self.call::<serde_json::Value>("getMe", &json!({}), SEND_TIMEOUT)
            .await
            .is_ok()
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, DeliveryError> {
        let body = json!({
            "offset": offset,
            "timeout": POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"]
        });
        self.call(
            "getUpdates",
            &body,
            Duration::from_secs(POLL_TIMEOUT_SECS + 10),
        )
        .await
    }

    /// Long-poll for operator input until `cancel` fires or `tx` closes
    pub async fn run_poller(&self, tx: mpsc::Sender<OperatorEvent>, cancel: CancellationToken) {
        let mut offset: i64 = 0;

        tracing::info!("Operator channel listening for messages");

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.get_updates(offset) => result,
            };

            let updates = match result {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "Operator poll failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                // Advance offset past this update
                offset = offset.max(update.update_id + 1);

                let Some(message) = update.message else {
                    continue;
                };

                match classify_message(&message, &self.chat_id) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(_) => {
                        tracing::debug!(
                            chat_id = message.chat.id,
                            "Ignoring message from non-operator chat"
                        );
                    }
                }
            }
        }

        tracing::info!("Operator poller stopped");
    }
}

#[async_trait]
impl OperatorChannel for TelegramOperator {
    async fn send(&self, text: &str, format: TextFormat) -> Result<MessageId, DeliveryError> {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        if format == TextFormat::Markdown {
            body["parse_mode"] = json!("Markdown");
        }

        let sent: SentMessage = self.call("sendMessage", &body, SEND_TIMEOUT).await?;
        Ok(MessageId(sent.message_id))
    }
}

/// Turn an inbound message into an operator event.
///
/// `Err(Unauthorized)` for chats other than the operator's; `Ok(None)` for
/// messages the relay does not act on (no text, unknown commands).
pub fn classify_message(
    message: &IncomingMessage,
    operator_chat: &str,
) -> Result<Option<OperatorEvent>, RelayError> {
    if message.chat.id.to_string() != operator_chat.trim() {
        return Err(RelayError::Unauthorized);
    }

    let Some(text) = message.text.as_deref() else {
        return Ok(None);
    };

    if text.starts_with('/') {
        return Ok(parse_command(text).map(OperatorEvent::Command));
    }

    Ok(Some(OperatorEvent::Text {
        reply_to: message
            .reply_to_message
            .as_ref()
            .map(|replied| MessageId(replied.message_id)),
        text: text.to_string(),
    }))
}

/// `/start` and `/help`, optionally addressed as `/help@botname`
fn parse_command(text: &str) -> Option<OperatorCommand> {
    let word = text.split_whitespace().next()?;
    let name = word.trim_start_matches('/').split('@').next()?;
    match name {
        "start" => Some(OperatorCommand::Start),
        "help" => Some(OperatorCommand::Help),
        _ => None,
    }
}
