use crate::messages::{Badge, ControlMessage, SpeechControl, SpeechEvent, UiMessage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One recognized speech segment, as produced by the speech engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub confidence: f32,
    #[serde(default = "default_is_final")]
    pub is_final: bool,
}

fn default_is_final() -> bool {
    true
}

impl Utterance {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            is_final: true,
        }
    }

    pub fn interim(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            is_final: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeMethod {
    Exact,
    Fuzzy,
    WordMatch,
}

/// Outcome of evaluating one utterance for an activation phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeDetection {
    pub detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<WakeMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub confidence: f32,
}

impl WakeDetection {
    pub fn miss(confidence: f32) -> Self {
        Self {
            detected: false,
            method: None,
            matched_phrase: None,
            similarity: None,
            confidence,
        }
    }

    pub fn hit(
        method: WakeMethod,
        phrase: impl Into<String>,
        similarity: Option<f64>,
        confidence: f32,
    ) -> Self {
        Self {
            detected: true,
            method: Some(method),
            matched_phrase: Some(phrase.into()),
            similarity,
            confidence,
        }
    }
}

/// The closed set of browser actions an intent can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Search,
    NewTab,
    CloseTab,
    SwitchTab,
    Scroll,
    Click,
    Type,
    Find,
    Refresh,
    Back,
    Forward,
    Unknown,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        ActionKind::Navigate,
        ActionKind::Search,
        ActionKind::NewTab,
        ActionKind::CloseTab,
        ActionKind::SwitchTab,
        ActionKind::Scroll,
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Find,
        ActionKind::Refresh,
        ActionKind::Back,
        ActionKind::Forward,
        ActionKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Search => "search",
            ActionKind::NewTab => "new_tab",
            ActionKind::CloseTab => "close_tab",
            ActionKind::SwitchTab => "switch_tab",
            ActionKind::Scroll => "scroll",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Find => "find",
            ActionKind::Refresh => "refresh",
            ActionKind::Back => "back",
            ActionKind::Forward => "forward",
            ActionKind::Unknown => "unknown",
        }
    }

    /// Looks up an action by wire name. Accepts the legacy aliases the
    /// extension and older model prompts used (`open_website`, `navigate_back`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match normalized.as_str() {
            "navigate" | "open_website" | "open" | "goto" => ActionKind::Navigate,
            "search" => ActionKind::Search,
            "new_tab" => ActionKind::NewTab,
            "close_tab" => ActionKind::CloseTab,
            "switch_tab" => ActionKind::SwitchTab,
            "scroll" | "scroll_down" | "scroll_up" => ActionKind::Scroll,
            "click" => ActionKind::Click,
            "type" => ActionKind::Type,
            "find" => ActionKind::Find,
            "refresh" | "reload" => ActionKind::Refresh,
            "back" | "go_back" | "navigate_back" => ActionKind::Back,
            "forward" | "go_forward" | "navigate_forward" => ActionKind::Forward,
            "unknown" => ActionKind::Unknown,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent target: a tab index or free text (search terms, element label, direction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Index(i64),
    Text(String),
}

impl Target {
    pub fn text(value: impl Into<String>) -> Self {
        Target::Text(value.into())
    }

    /// Numeric view of the target. Text targets such as "3" are accepted.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Target::Index(i) => Some(*i),
            Target::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Target::Index(i) => i.to_string(),
            Target::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Index(i) => write!(f, "{}", i),
            Target::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Grammar,
    Llm,
    ManualFallback,
}

impl fmt::Display for IntentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntentSource::Grammar => "grammar",
            IntentSource::Llm => "llm",
            IntentSource::ManualFallback => "manual_fallback",
        };
        f.write_str(name)
    }
}

/// The structured interpretation of a transcript.
///
/// Confidence is always within `[0, 1]`, and an `Unknown` intent always
/// carries `0.0`; both are enforced by the constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Secondary payload, e.g. the text for a `type` action or a scroll amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub confidence: f64,
    pub explanation: String,
    pub source: IntentSource,
}

impl Intent {
    pub fn new(
        action: ActionKind,
        confidence: f64,
        explanation: impl Into<String>,
        source: IntentSource,
    ) -> Self {
        let confidence = if action == ActionKind::Unknown {
            0.0
        } else {
            clamp_confidence(confidence)
        };
        Self {
            action,
            target: None,
            url: None,
            data: None,
            confidence,
            explanation: explanation.into(),
            source,
        }
    }

    pub fn unknown(explanation: impl Into<String>, source: IntentSource) -> Self {
        Self::new(ActionKind::Unknown, 0.0, explanation, source)
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.action == ActionKind::Unknown
    }

    pub fn target_text(&self) -> Option<String> {
        self.target
            .as_ref()
            .map(Target::as_text)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Clamps a self-reported score into `[0, 1]`. NaN is treated as no confidence.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Uniform outcome of a dispatched action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: i64,
    /// 1-based position across all windows, the way users count tabs.
    pub index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TabQuery {
    #[default]
    All,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Top,
    Bottom,
}

impl ScrollDirection {
    pub fn from_word(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "top" | "to_top" | "the top" => Some(ScrollDirection::Top),
            "bottom" | "to_bottom" | "the bottom" => Some(ScrollDirection::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Top => "top",
            ScrollDirection::Bottom => "bottom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollAmount {
    Small,
    #[default]
    Normal,
    Large,
}

impl ScrollAmount {
    pub fn from_word(word: &str) -> Self {
        match word.trim().to_ascii_lowercase().as_str() {
            "small" | "little" | "a little" | "a bit" => ScrollAmount::Small,
            "large" | "lot" | "a lot" | "page" | "a page" => ScrollAmount::Large,
            _ => ScrollAmount::Normal,
        }
    }
}

/// In-page operations executed by the content script (or an injected script).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    Scroll {
        direction: ScrollDirection,
        #[serde(default)]
        amount: ScrollAmount,
    },
    Click {
        target: String,
    },
    Type {
        target: String,
        text: String,
    },
    Find {
        text: String,
    },
}

/// Requests sent from the core to the browser's tab/window API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BrowserCommand {
    QueryTabs {
        #[serde(default)]
        scope: TabQuery,
    },
    CreateTab {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default = "default_active")]
        active: bool,
    },
    CloseTab {
        tab_id: i64,
    },
    ActivateTab {
        tab_id: i64,
    },
    UpdateTab {
        tab_id: i64,
        url: String,
    },
    GoBack {
        tab_id: i64,
    },
    GoForward {
        tab_id: i64,
    },
    Reload {
        tab_id: i64,
    },
    Page {
        tab_id: i64,
        page: PageAction,
    },
}

fn default_active() -> bool {
    true
}

impl BrowserCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserCommand::QueryTabs { .. } => "query_tabs",
            BrowserCommand::CreateTab { .. } => "create_tab",
            BrowserCommand::CloseTab { .. } => "close_tab",
            BrowserCommand::ActivateTab { .. } => "activate_tab",
            BrowserCommand::UpdateTab { .. } => "update_tab",
            BrowserCommand::GoBack { .. } => "go_back",
            BrowserCommand::GoForward { .. } => "go_forward",
            BrowserCommand::Reload { .. } => "reload",
            BrowserCommand::Page { .. } => "page",
        }
    }
}

/// Reply to a [`BrowserCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BrowserResponse {
    Ok {
        #[serde(default)]
        data: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

/// Core to extension frames on the bridge socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeOutbound {
    Browser { id: u64, command: BrowserCommand },
    Ui { message: UiMessage },
    Badge { badge: Badge, text: String, color: String },
    Speech { control: SpeechControl },
}

impl BridgeOutbound {
    pub fn badge(badge: Badge) -> Self {
        BridgeOutbound::Badge {
            badge,
            text: badge.text().to_string(),
            color: badge.color().to_string(),
        }
    }
}

/// Extension to core frames on the bridge socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeInbound {
    Response { id: u64, response: BrowserResponse },
    Speech { event: SpeechEvent },
    Control { message: ControlMessage },
}
