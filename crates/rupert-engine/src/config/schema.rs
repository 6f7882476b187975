use crate::dispatcher::DispatchConfig;
use crate::interpreter::InterpreterMode;
use crate::resolver::client::{DEFAULT_API_URL, GenerationConfig, ModelEndpoint, default_endpoints};
use crate::wake::WakeConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RupertConfig {
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub grammar: GrammarConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrammarConfig {
    /// Extra spoken site names, e.g. `hacker news: news.ycombinator.com`.
    #[serde(default)]
    pub sites: BTreeMap<String, String>,
}

impl GrammarConfig {
    pub fn site_pairs(&self) -> Vec<(String, String)> {
        self.sites
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<ModelEndpoint>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default = "default_rephrase_below")]
    pub rephrase_below: f64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_rephrase_below() -> f64 {
    0.5
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            endpoints: default_endpoints(),
            request_timeout_ms: default_request_timeout_ms(),
            generation: GenerationConfig::default(),
            rephrase_below: default_rephrase_below(),
        }
    }
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    #[serde(default)]
    pub mode: InterpreterMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// When false, enabling the session goes straight to command capture
    /// (manual toggle) instead of waiting for the activation phrase.
    #[serde(default = "default_true")]
    pub require_wake_word: bool,
    /// Interpret words spoken after the activation phrase in the same breath.
    #[serde(default = "default_true")]
    pub inline_commands: bool,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_status_display_ms")]
    pub status_display_ms: u64,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Re-enable capture at startup when the last session was enabled.
    #[serde(default = "default_true")]
    pub restore_on_start: bool,
}

fn default_true() -> bool {
    true
}

fn default_command_timeout_ms() -> u64 {
    10_000
}

fn default_status_display_ms() -> u64 {
    3_000
}

fn default_restart_delay_ms() -> u64 {
    1_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_wake_word: true,
            inline_commands: true,
            command_timeout_ms: default_command_timeout_ms(),
            status_display_ms: default_status_display_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            restore_on_start: true,
        }
    }
}

impl SessionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// State file; defaults to `~/.rupert/state.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Keep state in memory only.
    #[serde(default)]
    pub in_memory: bool,
}
