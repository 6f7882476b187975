//! Executes intents against a [`Browser`].
//!
//! The dispatcher owns two guards: a per-source confidence bar and a busy
//! flag so that two commands never drive the browser at the same time.
//! Every outcome, including browser failures, comes back as an
//! [`ActionResult`].

use crate::backend::{Browser, BrowserError, active_tab};
use rupert_common::protocol::{
    ActionKind, ActionResult, Intent, IntentSource, PageAction, ScrollAmount, ScrollDirection,
    TabInfo, TabQuery,
};
use rupert_common::sites::{normalize_url, search_url};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub const CAPABILITIES: &str =
    "I can open websites, search, manage tabs, scroll, click, type and find text on the page.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_grammar_threshold")]
    pub grammar_threshold: f64,
    #[serde(default = "default_manual_threshold")]
    pub manual_threshold: f64,
    #[serde(default = "default_llm_threshold")]
    pub llm_threshold: f64,
    #[serde(default = "default_new_tab_url")]
    pub new_tab_url: String,
}

fn default_grammar_threshold() -> f64 {
    0.5
}

fn default_manual_threshold() -> f64 {
    0.5
}

fn default_llm_threshold() -> f64 {
    0.6
}

fn default_new_tab_url() -> String {
    "chrome://newtab/".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            grammar_threshold: default_grammar_threshold(),
            manual_threshold: default_manual_threshold(),
            llm_threshold: default_llm_threshold(),
            new_tab_url: default_new_tab_url(),
        }
    }
}

impl DispatchConfig {
    pub fn threshold_for(&self, source: IntentSource) -> f64 {
        match source {
            IntentSource::Grammar => self.grammar_threshold,
            IntentSource::ManualFallback => self.manual_threshold,
            IntentSource::Llm => self.llm_threshold,
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandDispatcher {
    config: DispatchConfig,
    busy: AtomicBool,
}

/// Clears the busy flag when the dispatch finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type HandlerResult = Result<ActionResult, BrowserError>;

impl CommandDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            busy: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn dispatch<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> ActionResult {
        if intent.is_unknown() {
            let message = if intent.explanation.trim().is_empty() {
                format!("I didn't recognize that command. {}", CAPABILITIES)
            } else {
                format!("{} {}", intent.explanation.trim(), CAPABILITIES)
            };
            return ActionResult::failure(message).with("action", "unknown");
        }

        let threshold = self.config.threshold_for(intent.source);
        if intent.confidence < threshold {
            info!(
                action = %intent.action,
                confidence = intent.confidence,
                threshold,
                "Intent below confidence threshold"
            );
            return ActionResult::failure(format!(
                "I'm not confident about that command ({}%). Please try rephrasing.",
                (intent.confidence * 100.0).round() as i64
            ))
            .with("confidence", intent.confidence);
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return ActionResult::failure("Another command is still running");
        }
        let _guard = BusyGuard(&self.busy);

        info!(action = %intent.action, source = %intent.source, "Dispatching");
        let result = match intent.action {
            ActionKind::Navigate => self.navigate(browser, intent).await,
            ActionKind::Search => self.search(browser, intent).await,
            ActionKind::NewTab => self.new_tab(browser, intent).await,
            ActionKind::CloseTab => self.close_tab(browser, intent).await,
            ActionKind::SwitchTab => self.switch_tab(browser, intent).await,
            ActionKind::Scroll => self.scroll(browser, intent).await,
            ActionKind::Click => self.click(browser, intent).await,
            ActionKind::Type => self.type_text(browser, intent).await,
            ActionKind::Find => self.find(browser, intent).await,
            ActionKind::Refresh => self.refresh(browser).await,
            ActionKind::Back => self.history(browser, true).await,
            ActionKind::Forward => self.history(browser, false).await,
            ActionKind::Unknown => Ok(ActionResult::failure(CAPABILITIES)),
        };

        match result {
            Ok(r) => r.with("action", intent.action.as_str()),
            Err(e) => {
                warn!(action = %intent.action, error = %e, "Browser action failed");
                ActionResult::failure(format!("Error executing {}: {}", intent.action, e))
                    .with("action", intent.action.as_str())
                    .with("error_code", e.code())
            }
        }
    }

    async fn navigate<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let destination = intent.url.clone().or_else(|| intent.target_text());
        let Some(destination) = destination else {
            return Ok(ActionResult::failure("No URL specified for navigation"));
        };
        let Some(url) = normalize_url(&destination) else {
            // Not a site or an address: treat the words as a search.
            return self.run_search(browser, &destination).await;
        };
        let tab = browser.create_tab(Some(&url), true).await?;
        Ok(ActionResult::ok(format!("Navigated to {}", url))
            .with("url", url)
            .with("tab_id", tab.id))
    }

    async fn search<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let query = intent.target_text().or_else(|| intent.data.clone());
        match query {
            Some(query) => self.run_search(browser, &query).await,
            None => Ok(ActionResult::failure("No search term provided")),
        }
    }

    async fn run_search<B: Browser + ?Sized>(&self, browser: &mut B, query: &str) -> HandlerResult {
        // A missing active tab only loses the site-aware search.
        let active_url = active_tab(browser).await.ok().map(|t| t.url);
        let url = search_url(query, active_url.as_deref());
        let tab = browser.create_tab(Some(&url), true).await?;
        Ok(ActionResult::ok(format!("Searching for \"{}\"", query))
            .with("query", query)
            .with("url", url)
            .with("tab_id", tab.id))
    }

    async fn new_tab<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let url = intent
            .url
            .clone()
            .or_else(|| intent.target_text().and_then(|t| normalize_url(&t)))
            .unwrap_or_else(|| self.config.new_tab_url.clone());
        let tab = browser.create_tab(Some(&url), true).await?;
        Ok(ActionResult::ok("Opened new tab")
            .with("url", url)
            .with("tab_id", tab.id))
    }

    async fn close_tab<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        match intent.target.as_ref().and_then(|t| t.as_index()) {
            Some(number) => {
                let Some(tab) = nth_tab(browser, number).await? else {
                    return Ok(ActionResult::failure(format!("Tab {} not found", number)));
                };
                browser.close_tab(tab.id).await?;
                Ok(ActionResult::ok(format!("Closed tab {}: {}", number, tab.title))
                    .with("tab_id", tab.id))
            }
            None => {
                let tab = match active_tab(browser).await {
                    Ok(tab) => tab,
                    Err(BrowserError::NoActiveTab) => {
                        return Ok(ActionResult::failure("No active tab to close"));
                    }
                    Err(e) => return Err(e),
                };
                browser.close_tab(tab.id).await?;
                Ok(ActionResult::ok(format!("Closed current tab: {}", tab.title))
                    .with("tab_id", tab.id))
            }
        }
    }

    async fn switch_tab<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let Some(number) = intent.target.as_ref().and_then(|t| t.as_index()) else {
            return Ok(ActionResult::failure("Invalid tab number"));
        };
        let Some(tab) = nth_tab(browser, number).await? else {
            return Ok(ActionResult::failure(format!("Tab {} not found", number)));
        };
        browser.activate_tab(tab.id).await?;
        Ok(ActionResult::ok(format!("Switched to tab {}: {}", number, tab.title))
            .with("tab_id", tab.id))
    }

    async fn scroll<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let direction = intent
            .target_text()
            .and_then(|t| ScrollDirection::from_word(&t))
            .unwrap_or_default();
        let amount = intent
            .data
            .as_deref()
            .map(ScrollAmount::from_word)
            .unwrap_or_default();
        self.on_active_page(
            browser,
            PageAction::Scroll { direction, amount },
            format!("Scrolled {}", direction.as_str()),
        )
        .await
    }

    async fn click<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let Some(target) = intent.target_text() else {
            return Ok(ActionResult::failure("No element specified to click"));
        };
        let message = format!("Clicked on {}", target);
        self.on_active_page(browser, PageAction::Click { target }, message)
            .await
    }

    async fn type_text<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let (Some(target), Some(text)) = (intent.target_text(), intent.data.clone()) else {
            return Ok(ActionResult::failure(
                "Typing needs both a field and the text to type",
            ));
        };
        let message = format!("Typed \"{}\" in {}", text, target);
        self.on_active_page(browser, PageAction::Type { target, text }, message)
            .await
    }

    async fn find<B: Browser + ?Sized>(&self, browser: &mut B, intent: &Intent) -> HandlerResult {
        let Some(text) = intent.target_text().or_else(|| intent.data.clone()) else {
            return Ok(ActionResult::failure("No text specified to find"));
        };
        let message = format!("Looking for \"{}\" on page", text);
        self.on_active_page(browser, PageAction::Find { text }, message)
            .await
    }

    async fn refresh<B: Browser + ?Sized>(&self, browser: &mut B) -> HandlerResult {
        let Some(tab) = focused(browser).await? else {
            return Ok(ActionResult::failure("No active tab found"));
        };
        browser.reload(tab.id).await?;
        Ok(ActionResult::ok("Page refreshed").with("tab_id", tab.id))
    }

    async fn history<B: Browser + ?Sized>(&self, browser: &mut B, back: bool) -> HandlerResult {
        let Some(tab) = focused(browser).await? else {
            return Ok(ActionResult::failure("No active tab found"));
        };
        if back {
            browser.go_back(tab.id).await?;
            Ok(ActionResult::ok("Went back").with("tab_id", tab.id))
        } else {
            browser.go_forward(tab.id).await?;
            Ok(ActionResult::ok("Went forward").with("tab_id", tab.id))
        }
    }

    async fn on_active_page<B: Browser + ?Sized>(
        &self,
        browser: &mut B,
        action: PageAction,
        message: String,
    ) -> HandlerResult {
        let Some(tab) = focused(browser).await? else {
            return Ok(ActionResult::failure("No active tab found"));
        };
        let data = browser.run_page_action(tab.id, action).await?;
        let mut result = ActionResult::ok(message).with("tab_id", tab.id);
        if !data.is_null() {
            result = result.with("page", data);
        }
        Ok(result)
    }
}

/// The active tab, with "none" reported as `Ok(None)` instead of an error.
async fn focused<B: Browser + ?Sized>(browser: &mut B) -> Result<Option<TabInfo>, BrowserError> {
    match active_tab(browser).await {
        Ok(tab) => Ok(Some(tab)),
        Err(BrowserError::NoActiveTab) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Tab by 1-based position across all windows.
async fn nth_tab<B: Browser + ?Sized>(browser: &mut B, number: i64) -> Result<Option<TabInfo>, BrowserError> {
    if number < 1 {
        return Ok(None);
    }
    let tabs = browser.query_tabs(TabQuery::All).await?;
    Ok(tabs.into_iter().nth(number as usize - 1))
}
