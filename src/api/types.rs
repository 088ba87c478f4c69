//! Visitor WebSocket wire frames

use serde::{Deserialize, Serialize};

/// Frame sent to the visitor's chat widget
#[derive(Debug, Serialize)]
pub struct AgentFrame<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: &'a str,
    pub sender: &'static str,
}

impl<'a> AgentFrame<'a> {
    pub fn message(content: &'a str) -> Self {
        Self {
            kind: "message",
            content,
            sender: "agent",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Frame received from the chat widget; only `content` matters
#[derive(Debug, Deserialize)]
pub struct VisitorFrame {
    #[serde(default)]
    pub content: Option<String>,
}

impl VisitorFrame {
    /// Extract non-blank content from a raw text frame
    pub fn content_of(raw: &str) -> Option<String> {
        let frame: VisitorFrame = serde_json::from_str(raw).ok()?;
        frame.content.filter(|c| !c.trim().is_empty())
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
