//! Trait abstractions for transport I/O
//!
//! These traits let the router run against mock channels in tests.

use super::{MessageId, TextFormat};
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::sync::Arc;

/// Live connection to one visitor
#[async_trait]
pub trait VisitorChannel: Send + Sync {
    /// Deliver agent text to the visitor
    async fn send(&self, text: &str) -> Result<(), DeliveryError>;

    /// Ask the underlying connection to shut down
    fn close(&self);
}

/// Connection to the single operator account
#[async_trait]
pub trait OperatorChannel: Send + Sync {
    /// Deliver text to the operator, returning the id the transport assigned
    async fn send(&self, text: &str, format: TextFormat) -> Result<MessageId, DeliveryError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: VisitorChannel + ?Sized> VisitorChannel for Arc<T> {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        (**self).send(text).await
    }

    fn close(&self) {
        (**self).close();
    }
}

#[async_trait]
impl<T: OperatorChannel + ?Sized> OperatorChannel for Arc<T> {
    async fn send(&self, text: &str, format: TextFormat) -> Result<MessageId, DeliveryError> {
        (**self).send(text, format).await
    }
}
