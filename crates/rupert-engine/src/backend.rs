use async_trait::async_trait;
pub use rupert_common::error::BrowserError;
use rupert_common::protocol::{PageAction, TabInfo, TabQuery};
use serde_json::Value;

/// The Browser trait is the tab/window/scripting surface every host must
/// implement: the extension bridge and the Chromium backend.
///
/// Tab ids are opaque handles handed out by `query_tabs`/`create_tab`.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Launch the backend (start browser, wait for the extension, etc.)
    async fn launch(&mut self) -> Result<(), BrowserError>;

    /// Close the backend and cleanup resources.
    async fn close(&mut self) -> Result<(), BrowserError>;

    /// Check if the backend is ready to accept commands.
    async fn is_ready(&self) -> bool;

    /// All tabs, in window order, or only the focused window's active tab.
    async fn query_tabs(&mut self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError>;

    /// Open a tab. `None` opens the browser's new tab page.
    async fn create_tab(&mut self, url: Option<&str>, active: bool)
    -> Result<TabInfo, BrowserError>;

    async fn close_tab(&mut self, _tab_id: i64) -> Result<(), BrowserError> {
        Err(BrowserError::NotSupported("close_tab".into()))
    }

    async fn activate_tab(&mut self, _tab_id: i64) -> Result<(), BrowserError> {
        Err(BrowserError::NotSupported("activate_tab".into()))
    }

    /// Navigate an existing tab.
    async fn update_tab(&mut self, _tab_id: i64, _url: &str) -> Result<(), BrowserError> {
        Err(BrowserError::NotSupported("update_tab".into()))
    }

    /// Navigate back in the tab's history.
    async fn go_back(&mut self, _tab_id: i64) -> Result<(), BrowserError> {
        Err(BrowserError::NotSupported("go_back".into()))
    }

    /// Navigate forward in the tab's history.
    async fn go_forward(&mut self, _tab_id: i64) -> Result<(), BrowserError> {
        Err(BrowserError::NotSupported("go_forward".into()))
    }

    async fn reload(&mut self, _tab_id: i64) -> Result<(), BrowserError> {
        Err(BrowserError::NotSupported("reload".into()))
    }

    /// Run an in-page action (scroll, click, type, find) in the given tab.
    async fn run_page_action(
        &mut self,
        _tab_id: i64,
        _action: PageAction,
    ) -> Result<Value, BrowserError> {
        Err(BrowserError::NotSupported("run_page_action".into()))
    }
}

/// The focused tab, or `NoActiveTab`.
pub async fn active_tab<B: Browser + ?Sized>(browser: &mut B) -> Result<TabInfo, BrowserError> {
    browser
        .query_tabs(TabQuery::Active)
        .await?
        .into_iter()
        .next()
        .ok_or(BrowserError::NoActiveTab)
}
