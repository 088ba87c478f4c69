//! WebSocket-backed visitor channel
//!
//! The socket writer runs in its own task and drains an unbounded queue,
//! so sending never waits on the network.

use super::VisitorChannel;
use crate::error::DeliveryError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct WsVisitor {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
}

impl WsVisitor {
    /// Create the channel plus the queue the socket writer should drain
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let visitor = Self {
            outbound,
            shutdown: CancellationToken::new(),
        };
        (visitor, rx)
    }

    /// Cancelled when the router wants the connection gone
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[async_trait]
impl VisitorChannel for WsVisitor {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.outbound
            .send(text.to_string())
            .map_err(|_| DeliveryError::closed("visitor connection closed"))
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}
