use crate::cdp::{CdpClient, LaunchOptions};
use crate::inject;
use async_trait::async_trait;
use chromiumoxide::Page;
use rupert_common::protocol::{PageAction, TabInfo, TabQuery};
use rupert_engine::backend::{Browser, BrowserError};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Page a tab opens with when no URL (or the browser's new tab page) is
/// requested; headless Chromium has no new tab page.
pub const NEW_TAB_URL: &str = "about:blank";

/// History navigation is fire-and-forget in the page; give it a moment to
/// commit before anyone reads the URL back.
const HISTORY_SETTLE: Duration = Duration::from_millis(300);

/// Tabs opened through this backend, in opening order, with the focused one
/// tracked separately. Ids are handed out once and never reused.
#[derive(Debug)]
pub struct TabStrip<P> {
    tabs: Vec<(i64, P)>,
    active: Option<i64>,
    next_id: i64,
}

impl<P> Default for TabStrip<P> {
    fn default() -> Self {
        Self {
            tabs: Vec::new(),
            active: None,
            next_id: 1,
        }
    }
}

impl<P> TabStrip<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, page: P, active: bool) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tabs.push((id, page));
        if active || self.active.is_none() {
            self.active = Some(id);
        }
        id
    }

    /// Removes a tab. Closing the focused tab focuses its right neighbour,
    /// or the new last tab.
    pub fn remove(&mut self, id: i64) -> Option<P> {
        let pos = self.tabs.iter().position(|(tab_id, _)| *tab_id == id)?;
        let (_, page) = self.tabs.remove(pos);
        if self.active == Some(id) {
            self.active = self
                .tabs
                .get(pos)
                .or_else(|| self.tabs.last())
                .map(|(tab_id, _)| *tab_id);
        }
        Some(page)
    }

    pub fn activate(&mut self, id: i64) -> bool {
        if self.get(id).is_some() {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: i64) -> Option<&P> {
        self.tabs
            .iter()
            .find(|(tab_id, _)| *tab_id == id)
            .map(|(_, page)| page)
    }

    pub fn active(&self) -> Option<i64> {
        self.active
    }

    /// `(id, 1-based index, is_active, page)` in tab order.
    pub fn entries(&self) -> impl Iterator<Item = (i64, usize, bool, &P)> {
        self.tabs
            .iter()
            .enumerate()
            .map(|(i, (id, page))| (*id, i + 1, self.active == Some(*id), page))
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn clear(&mut self) {
        self.tabs.clear();
        self.active = None;
    }
}

/// Chromium driven over CDP. Every page it opens is one tab.
pub struct HeadlessBrowser {
    client: Option<CdpClient>,
    visible: bool,
    tabs: TabStrip<Page>,
}

impl HeadlessBrowser {
    pub fn new() -> Self {
        Self::new_with_visibility(false)
    }

    pub fn new_with_visibility(visible: bool) -> Self {
        Self {
            client: None,
            visible,
            tabs: TabStrip::new(),
        }
    }

    fn page(&self, tab_id: i64) -> Result<&Page, BrowserError> {
        if self.client.is_none() {
            return Err(BrowserError::NotReady);
        }
        self.tabs.get(tab_id).ok_or(BrowserError::TabNotFound(tab_id))
    }

    async fn history(&self, tab_id: i64, script: &str) -> Result<(), BrowserError> {
        let page = self.page(tab_id)?;
        page.evaluate(script)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{} failed: {}", script, e)))?;
        tokio::time::sleep(HISTORY_SETTLE).await;
        Ok(())
    }
}

impl Default for HeadlessBrowser {
    fn default() -> Self {
        Self::new()
    }
}

async fn describe(page: &Page) -> (String, String) {
    let title = page
        .get_title()
        .await
        .unwrap_or_default()
        .unwrap_or_default();
    let url = page.url().await.unwrap_or_default().unwrap_or_default();
    (title, url)
}

#[async_trait]
impl Browser for HeadlessBrowser {
    async fn launch(&mut self) -> Result<(), BrowserError> {
        info!("Launching headless backend (Chromium)...");
        let client = CdpClient::launch(LaunchOptions::from_env(self.visible))
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        self.tabs.clear();
        self.tabs.insert(client.page.clone(), true);
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.tabs.clear();
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BrowserError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn query_tabs(&mut self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError> {
        if self.client.is_none() {
            return Err(BrowserError::NotReady);
        }
        let mut tabs = Vec::with_capacity(self.tabs.len());
        for (id, index, active, page) in self.tabs.entries() {
            if query == TabQuery::Active && !active {
                continue;
            }
            let (title, url) = describe(page).await;
            tabs.push(TabInfo {
                id,
                index,
                title,
                url,
                active,
            });
        }
        Ok(tabs)
    }

    async fn create_tab(
        &mut self,
        url: Option<&str>,
        active: bool,
    ) -> Result<TabInfo, BrowserError> {
        let client = self.client.as_ref().ok_or(BrowserError::NotReady)?;
        let url = match url {
            Some(url) if !url.starts_with("chrome://newtab") => url,
            _ => NEW_TAB_URL,
        };
        info!("Opening tab: {}", url);
        let page = client
            .open_page(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        if active {
            page.bring_to_front()
                .await
                .map_err(|e| BrowserError::Other(format!("bring_to_front failed: {}", e)))?;
        }
        let (title, current_url) = describe(&page).await;
        let id = self.tabs.insert(page, active);
        Ok(TabInfo {
            id,
            index: self.tabs.len(),
            title,
            url: current_url,
            active: self.tabs.active() == Some(id),
        })
    }

    async fn close_tab(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.page(tab_id)?;
        let page = self
            .tabs
            .remove(tab_id)
            .ok_or(BrowserError::TabNotFound(tab_id))?;
        page.close()
            .await
            .map_err(|e| BrowserError::Other(format!("close_tab failed: {}", e)))?;
        if let Some(next) = self.tabs.active().and_then(|id| self.tabs.get(id)) {
            if let Err(e) = next.bring_to_front().await {
                debug!("Failed to focus tab after close: {}", e);
            }
        }
        Ok(())
    }

    async fn activate_tab(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        let page = self.page(tab_id)?;
        page.bring_to_front()
            .await
            .map_err(|e| BrowserError::Other(format!("activate_tab failed: {}", e)))?;
        self.tabs.activate(tab_id);
        Ok(())
    }

    async fn update_tab(&mut self, tab_id: i64, url: &str) -> Result<(), BrowserError> {
        let page = self.page(tab_id)?;
        info!("Navigating tab {} to: {}", tab_id, url);
        page.goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn go_back(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.history(tab_id, "history.back();").await
    }

    async fn go_forward(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.history(tab_id, "history.forward();").await
    }

    async fn reload(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        let page = self.page(tab_id)?;
        page.reload()
            .await
            .map_err(|e| BrowserError::Navigation(format!("reload failed: {}", e)))?;
        Ok(())
    }

    async fn run_page_action(
        &mut self,
        tab_id: i64,
        action: PageAction,
    ) -> Result<Value, BrowserError> {
        let page = self.page(tab_id)?;
        inject::run_page_action(page, &action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tab_becomes_active() {
        let mut strip = TabStrip::new();
        let first = strip.insert("a", false);
        assert_eq!(strip.active(), Some(first));
        let second = strip.insert("b", false);
        assert_eq!(strip.active(), Some(first));
        assert!(strip.activate(second));
        assert_eq!(strip.active(), Some(second));
        assert!(!strip.activate(99));
    }

    #[test]
    fn test_closing_active_focuses_neighbour() {
        let mut strip = TabStrip::new();
        let a = strip.insert("a", true);
        let b = strip.insert("b", true);
        let c = strip.insert("c", false);
        assert_eq!(strip.active(), Some(b));

        assert_eq!(strip.remove(b), Some("b"));
        assert_eq!(strip.active(), Some(c));
        assert_eq!(strip.remove(c), Some("c"));
        assert_eq!(strip.active(), Some(a));
        assert_eq!(strip.remove(a), Some("a"));
        assert_eq!(strip.active(), None);
        assert!(strip.is_empty());
    }

    #[test]
    fn test_entries_are_one_based() {
        let mut strip = TabStrip::new();
        strip.insert("a", true);
        let b = strip.insert("b", false);
        strip.remove(1);
        let entries: Vec<_> = strip.entries().collect();
        assert_eq!(entries, vec![(b, 1, true, &"b")]);
    }

    #[test]
    fn test_ids_not_reused() {
        let mut strip = TabStrip::new();
        let a = strip.insert("a", true);
        strip.remove(a);
        let b = strip.insert("b", true);
        assert_ne!(a, b);
        assert_eq!(strip.remove(a), None);
    }

    #[tokio::test]
    async fn test_operations_before_launch() {
        let mut browser = HeadlessBrowser::new();
        assert!(!browser.is_ready().await);
        assert_eq!(
            browser.query_tabs(TabQuery::All).await,
            Err(BrowserError::NotReady)
        );
        assert_eq!(browser.reload(1).await, Err(BrowserError::NotReady));
        assert!(browser.close().await.is_ok());
    }
}
