use crate::backend::Browser;
use rupert_common::protocol::{TabInfo, TabQuery};
use rupert_common::sites::host_of;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

pub const MAX_CONTEXT_TABS: usize = 10;
pub const MAX_TITLE_CHARS: usize = 50;
pub const RECENT_COMMANDS: usize = 3;
pub const HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSummary {
    pub index: usize,
    pub title: String,
    pub url: String,
    pub active: bool,
}

/// Browser state shown to the language model alongside a command.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BrowserContext {
    pub tabs: Vec<TabSummary>,
    pub active_tab_index: Option<usize>,
    pub recent_commands: Vec<String>,
    pub total_tabs: usize,
    /// Full URL of the focused tab, kept even when it falls outside `tabs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_title: Option<String>,
}

impl BrowserContext {
    pub fn from_tabs(tabs: &[TabInfo], history: &CommandHistory) -> Self {
        let active = tabs.iter().find(|t| t.active);
        Self {
            tabs: tabs
                .iter()
                .take(MAX_CONTEXT_TABS)
                .map(|t| TabSummary {
                    index: t.index,
                    title: truncate_title(&t.title),
                    url: t.url.clone(),
                    active: t.active,
                })
                .collect(),
            active_tab_index: active.map(|t| t.index),
            recent_commands: history.recent(RECENT_COMMANDS),
            total_tabs: tabs.len(),
            active_url: active.map(|t| t.url.clone()),
            active_title: active.map(|t| t.title.clone()),
        }
    }

    /// Queries the browser for its tabs. A failing browser yields an empty
    /// context rather than an error; interpretation still works without it.
    pub async fn snapshot<B: Browser + ?Sized>(browser: &mut B, history: &CommandHistory) -> Self {
        match browser.query_tabs(TabQuery::All).await {
            Ok(tabs) => Self::from_tabs(&tabs, history),
            Err(e) => {
                warn!("Could not read browser tabs for context: {}", e);
                Self {
                    recent_commands: history.recent(RECENT_COMMANDS),
                    ..Self::default()
                }
            }
        }
    }

    pub fn active_host(&self) -> Option<String> {
        self.active_url.as_deref().and_then(host_of)
    }

    /// One-line description of the focused page for the prompt header.
    pub fn describe_active(&self) -> String {
        match (&self.active_title, self.active_host()) {
            (Some(title), Some(host)) => format!("Currently on: {} ({})", title, host),
            (None, Some(host)) => format!("Currently on: {}", host),
            _ => "No active page".to_string(),
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let cut: String = title.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", cut)
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp_ms: u64,
    pub command: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Bounded log of recently processed commands, oldest dropped first.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl CommandHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, command: &str, success: bool, message: &str, host: Option<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            timestamp_ms: now_millis(),
            command: command.to_string(),
            success,
            message: message.to_string(),
            host,
        });
    }

    /// The last `n` commands, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).map(|e| e.command.clone()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
