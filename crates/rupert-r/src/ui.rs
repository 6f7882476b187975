use crate::server::BridgeHandle;
use async_trait::async_trait;
use rupert_common::messages::{Badge, UiMessage};
use rupert_common::protocol::BridgeOutbound;
use rupert_engine::ui::UiSink;
use tracing::debug;

/// Overlay and toolbar badge rendered by the extension.
pub struct RemoteUi {
    handle: BridgeHandle,
}

impl RemoteUi {
    pub fn new(handle: BridgeHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl UiSink for RemoteUi {
    async fn send(&self, message: UiMessage) {
        let kind = message.kind();
        if let Err(e) = self.handle.send(BridgeOutbound::Ui { message }) {
            debug!(kind, "ui message dropped: {}", e);
        }
    }

    async fn set_badge(&self, badge: Badge) {
        if let Err(e) = self.handle.send(BridgeOutbound::badge(badge)) {
            debug!(?badge, "badge dropped: {}", e);
        }
    }
}
