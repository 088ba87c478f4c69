//! Mock channels for testing
//!
//! These let the router run end to end without sockets or HTTP.

use super::traits::*;
use super::{MessageId, TextFormat};
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

// ============================================================================
// Recording Visitor
// ============================================================================

/// Visitor channel that records everything sent to it
#[derive(Default)]
pub struct RecordingVisitor {
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    failing: AtomicBool,
}

impl RecordingVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail as if the socket dropped
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisitorChannel for RecordingVisitor {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::closed("mock visitor gone"));
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Operator
// ============================================================================

/// A message the mock operator received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentToOperator {
    pub id: MessageId,
    pub text: String,
    pub format: TextFormat,
}

/// Operator channel handing out sequential message ids
pub struct MockOperator {
    next_id: AtomicI64,
    sent: Mutex<Vec<SentToOperator>>,
    failing: AtomicBool,
}

impl MockOperator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(100),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentToOperator> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SentToOperator> {
        self.sent.lock().unwrap().last().cloned()
    }

    /// Messages rendered as Markdown, i.e. intake summaries
    pub fn summaries(&self) -> Vec<SentToOperator> {
        self.sent()
            .into_iter()
            .filter(|m| m.format == TextFormat::Markdown)
            .collect()
    }
}

impl Default for MockOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperatorChannel for MockOperator {
    async fn send(&self, text: &str, format: TextFormat) -> Result<MessageId, DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::network("mock operator unreachable"));
        }
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().unwrap().push(SentToOperator {
            id,
            text: text.to_string(),
            format,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_operator_assigns_sequential_ids() {
        let op = MockOperator::new();
        let a = op.send("one", TextFormat::Plain).await.unwrap();
        let b = op.send("two", TextFormat::Markdown).await.unwrap();
        assert_eq!(b.0, a.0 + 1);
        assert_eq!(op.summaries().len(), 1);

        op.set_failing(true);
        assert!(op.send("three", TextFormat::Plain).await.is_err());
        assert_eq!(op.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_recording_visitor() {
        let visitor = RecordingVisitor::new();
        visitor.send("hi").await.unwrap();
        visitor.fail_sends();
        assert!(visitor.send("lost").await.is_err());
        assert_eq!(visitor.sent(), vec!["hi".to_string()]);
        visitor.close();
        assert!(visitor.is_closed());
    }
}
