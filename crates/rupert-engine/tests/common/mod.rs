#![allow(dead_code)]

use async_trait::async_trait;
use rupert_common::messages::CaptureMode;
use rupert_common::protocol::{PageAction, TabInfo, TabQuery};
use rupert_engine::backend::{Browser, BrowserError};
use rupert_engine::speech::{SpeechEngine, SpeechError};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct BrowserLog {
    pub calls: Vec<String>,
    pub tabs: Vec<TabInfo>,
    pub next_id: i64,
    pub page_actions: Vec<PageAction>,
}

/// In-memory tab strip that records every call.
#[derive(Clone, Default)]
pub struct MockBrowser {
    pub log: Arc<Mutex<BrowserLog>>,
    /// When set, `create_tab` waits for a notification before proceeding.
    pub gate: Option<Arc<Notify>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tabs(tabs: &[(&str, &str)], active: usize) -> Self {
        let browser = Self::default();
        {
            let mut log = browser.log.lock().unwrap();
            for (i, (title, url)) in tabs.iter().enumerate() {
                log.tabs.push(TabInfo {
                    id: 100 + i as i64,
                    index: i + 1,
                    title: title.to_string(),
                    url: url.to_string(),
                    active: i + 1 == active,
                });
            }
            log.next_id = 100 + tabs.len() as i64;
        }
        browser
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    /// Calls other than read-only tab queries.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("query_tabs"))
            .collect()
    }

    pub fn tabs(&self) -> Vec<TabInfo> {
        self.log.lock().unwrap().tabs.clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().calls.push(call);
    }
}

fn reindex(tabs: &mut [TabInfo]) {
    for (i, tab) in tabs.iter_mut().enumerate() {
        tab.index = i + 1;
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn launch(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        true
    }

    async fn query_tabs(&mut self, query: TabQuery) -> Result<Vec<TabInfo>, BrowserError> {
        self.record(format!("query_tabs {:?}", query));
        let tabs = self.tabs();
        Ok(match query {
            TabQuery::All => tabs,
            TabQuery::Active => tabs.into_iter().filter(|t| t.active).collect(),
        })
    }

    async fn create_tab(
        &mut self,
        url: Option<&str>,
        active: bool,
    ) -> Result<TabInfo, BrowserError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let url = url.unwrap_or("chrome://newtab/").to_string();
        self.record(format!("create_tab {}", url));
        let mut log = self.log.lock().unwrap();
        log.next_id += 1;
        if active {
            for tab in log.tabs.iter_mut() {
                tab.active = false;
            }
        }
        let tab = TabInfo {
            id: log.next_id,
            index: log.tabs.len() + 1,
            title: String::new(),
            url,
            active,
        };
        log.tabs.push(tab.clone());
        Ok(tab)
    }

    async fn close_tab(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.record(format!("close_tab {}", tab_id));
        let mut log = self.log.lock().unwrap();
        let before = log.tabs.len();
        log.tabs.retain(|t| t.id != tab_id);
        if log.tabs.len() == before {
            return Err(BrowserError::TabNotFound(tab_id));
        }
        reindex(&mut log.tabs);
        Ok(())
    }

    async fn activate_tab(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.record(format!("activate_tab {}", tab_id));
        let mut log = self.log.lock().unwrap();
        if !log.tabs.iter().any(|t| t.id == tab_id) {
            return Err(BrowserError::TabNotFound(tab_id));
        }
        for tab in log.tabs.iter_mut() {
            tab.active = tab.id == tab_id;
        }
        Ok(())
    }

    async fn update_tab(&mut self, tab_id: i64, url: &str) -> Result<(), BrowserError> {
        self.record(format!("update_tab {} {}", tab_id, url));
        Ok(())
    }

    async fn go_back(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.record(format!("go_back {}", tab_id));
        Ok(())
    }

    async fn go_forward(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.record(format!("go_forward {}", tab_id));
        Ok(())
    }

    async fn reload(&mut self, tab_id: i64) -> Result<(), BrowserError> {
        self.record(format!("reload {}", tab_id));
        Ok(())
    }

    async fn run_page_action(
        &mut self,
        tab_id: i64,
        action: PageAction,
    ) -> Result<Value, BrowserError> {
        self.record(format!("page_action {}", tab_id));
        self.log.lock().unwrap().page_actions.push(action.clone());
        match action {
            PageAction::Click { target } if target == "missing" => {
                Err(BrowserError::ElementNotFound(target))
            }
            _ => Ok(json!({ "ok": true })),
        }
    }
}

/// Records start/stop calls; optionally refuses to start.
#[derive(Clone, Default)]
pub struct MockSpeech {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub fail_with: Arc<Mutex<Option<SpeechError>>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: SpeechError) -> Self {
        let speech = Self::default();
        *speech.fail_with.lock().unwrap() = Some(error);
        speech
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechEngine for MockSpeech {
    async fn start(&mut self, mode: CaptureMode) -> Result<(), SpeechError> {
        if let Some(error) = self.fail_with.lock().unwrap().clone() {
            return Err(error);
        }
        self.calls.lock().unwrap().push(format!("start {:?}", mode));
        Ok(())
    }

    async fn stop(&mut self, mode: CaptureMode) -> Result<(), SpeechError> {
        self.calls.lock().unwrap().push(format!("stop {:?}", mode));
        Ok(())
    }
}
