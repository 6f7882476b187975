use crate::server::BridgeHandle;
use async_trait::async_trait;
use rupert_common::error_mapping::map_browser_error;
use rupert_common::protocol::{BrowserCommand, BrowserResponse, PageAction, TabInfo, TabQuery};
use rupert_engine::backend::{Browser, BrowserError};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Browser reached through the extension's tab API over the bridge.
pub struct RemoteBrowser {
    handle: BridgeHandle,
    request_timeout: Duration,
    launched: bool,
}

impl RemoteBrowser {
    pub fn new(handle: BridgeHandle) -> Self {
        Self {
            handle,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            launched: false,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn send_command(&self, command: BrowserCommand) -> Result<Value, BrowserError> {
        let response = self.handle.request(command, self.request_timeout).await?;
        match response {
            BrowserResponse::Ok { data } => Ok(data),
            BrowserResponse::Error {
                code,
                message,
                details,
            } => Err(map_browser_error(&code, &message, details.as_ref())),
        }
    }

    async fn send_unit(&self, command: BrowserCommand) -> Result<(), BrowserError> {
        self.send_command(command).await.map(|_| ())
    }
}

#[async_trait]
impl Browser for RemoteBrowser {
    /// Resolves once an extension has connected.
    async fn launch(&mut self) -> Result<(), BrowserError> {
        info!("Remote browser on {}", self.handle.local_addr());
        self.handle.wait_for_extension().await;
        self.launched = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.launched = false;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launched && self.handle.is_connected()
    }

    async fn query_tabs(&mut self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError> {
        let data = self
            .send_command(BrowserCommand::QueryTabs { scope: query })
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn create_tab(
        &mut self,
        url: Option<&str>,
        active: bool,
    ) -> Result<TabInfo, BrowserError> {
        let data = self
            .send_command(BrowserCommand::CreateTab {
                url: url.map(str::to_string),
                active,
            })
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn close_tab(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.send_unit(BrowserCommand::CloseTab { tab_id }).await
    }

    async fn activate_tab(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.send_unit(BrowserCommand::ActivateTab { tab_id }).await
    }

    async fn update_tab(&mut self, tab_id: i64, url: &str) -> Result<(), BrowserError> {
        self.send_unit(BrowserCommand::UpdateTab {
            tab_id,
            url: url.to_string(),
        })
        .await
    }

    async fn go_back(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.send_unit(BrowserCommand::GoBack { tab_id }).await
    }

    async fn go_forward(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.send_unit(BrowserCommand::GoForward { tab_id }).await
    }

    async fn reload(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.send_unit(BrowserCommand::Reload { tab_id }).await
    }

    async fn run_page_action(
        &mut self,
        tab_id: i64,
        action: PageAction,
    ) -> Result<Value, BrowserError> {
        self.send_command(BrowserCommand::Page {
            tab_id,
            page: action,
        })
        .await
    }
}
