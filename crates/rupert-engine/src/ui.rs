//! Overlay and badge seam.

use async_trait::async_trait;
use rupert_common::messages::{Badge, UiMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// Receives visual feedback. Delivery is best effort: a sink that cannot
/// deliver logs and drops the message.
#[async_trait]
pub trait UiSink: Send + Sync {
    async fn send(&self, message: UiMessage);
    async fn set_badge(&self, badge: Badge);
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Message(UiMessage),
    Badge(Badge),
}

/// Forwards everything to a channel (REPL printer, tests).
#[derive(Debug, Clone)]
pub struct ChannelUi {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelUi {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl UiSink for ChannelUi {
    async fn send(&self, message: UiMessage) {
        if self.tx.send(UiEvent::Message(message)).is_err() {
            debug!("ui channel closed");
        }
    }

    async fn set_badge(&self, badge: Badge) {
        if self.tx.send(UiEvent::Badge(badge)).is_err() {
            debug!("ui channel closed");
        }
    }
}
