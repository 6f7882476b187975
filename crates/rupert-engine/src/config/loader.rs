use super::schema::RupertConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AIza[0-9A-Za-z\-_]{35}$").unwrap());

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./rupert.yaml
    /// 2. ~/.rupert/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<RupertConfig, ConfigError> {
        let local_config = PathBuf::from("./rupert.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".rupert").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        debug!("No config file found, using defaults");
        Ok(RupertConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<RupertConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: RupertConfig = serde_yaml::from_str(&content)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `path` when given, otherwise the default locations, then apply
    /// environment overrides and validate.
    pub async fn load(path: Option<&Path>) -> Result<RupertConfig, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path).await?,
            None => Self::load_default().await?,
        };
        apply_overrides(&mut config, |key| std::env::var(key).ok());
        validate(&config)?;
        Ok(config)
    }
}

/// Environment overrides, read through `lookup` so tests don't touch the
/// process environment.
pub fn apply_overrides<F>(config: &mut RupertConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(key) = set("GEMINI_API_KEY") {
        config.model.api_key = Some(key);
    }
    if let Some(url) = set("GEMINI_API_URL") {
        config.model.api_url = url;
    }
    if let Some(model) = set("GEMINI_MODEL") {
        // A pinned model goes to the front; the rest stay as fallbacks.
        let version = config
            .model
            .endpoints
            .first()
            .map(|e| e.api_version.clone())
            .unwrap_or_else(|| "v1beta".to_string());
        config.model.endpoints.retain(|e| e.model != model);
        config
            .model
            .endpoints
            .insert(0, crate::resolver::ModelEndpoint::new(&version, &model));
    }
    if let Some(words) = set("RUPERT_WAKE_WORDS") {
        let phrases: Vec<String> = words
            .split(',')
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if !phrases.is_empty() {
            config.wake.phrases = phrases;
        }
    }
    if let Some(ms) = set("RUPERT_COMMAND_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.session.command_timeout_ms = ms;
    }
}

pub fn validate(config: &RupertConfig) -> Result<(), ConfigError> {
    if config.wake.phrases.iter().all(|p| p.trim().is_empty()) {
        return Err(ConfigError::Invalid(
            "wake.phrases must contain at least one phrase".into(),
        ));
    }
    if config.model.endpoints.is_empty() {
        return Err(ConfigError::Invalid(
            "model.endpoints must list at least one endpoint".into(),
        ));
    }
    url::Url::parse(&config.model.api_url).map_err(|e| {
        ConfigError::Invalid(format!("model.api_url '{}': {}", config.model.api_url, e))
    })?;

    let thresholds = [
        ("dispatch.grammar_threshold", config.dispatch.grammar_threshold),
        ("dispatch.manual_threshold", config.dispatch.manual_threshold),
        ("dispatch.llm_threshold", config.dispatch.llm_threshold),
        ("model.rephrase_below", config.model.rephrase_below),
        ("wake.fuzzy_similarity", config.wake.fuzzy_similarity),
        ("wake.word_similarity", config.wake.word_similarity),
        ("wake.fuzzy_confidence", f64::from(config.wake.fuzzy_confidence)),
        ("wake.word_confidence", f64::from(config.wake.word_confidence)),
        ("wake.interim_confidence", f64::from(config.wake.interim_confidence)),
    ];
    for (name, value) in thresholds {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Invalid(format!(
                "{} must be between 0 and 1, got {}",
                name, value
            )));
        }
    }

    let timeouts = [
        ("model.request_timeout_ms", config.model.request_timeout_ms),
        ("session.command_timeout_ms", config.session.command_timeout_ms),
        ("session.status_display_ms", config.session.status_display_ms),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }
    }

    if let Some(key) = &config.model.api_key {
        if !validate_api_key(key) {
            return Err(ConfigError::Invalid("model.api_key is malformed".into()));
        }
    }
    Ok(())
}

/// Accepts the usual `AIza...` key shape, or anything long enough to be a
/// proxy token.
pub fn validate_api_key(key: &str) -> bool {
    let key = key.trim();
    API_KEY_RE.is_match(key) || key.len() > 20
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_validate() {
        assert!(validate(&RupertConfig::default()).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RupertConfig::default();
        apply_overrides(
            &mut config,
            env(&[
                ("GEMINI_API_KEY", "AIzaSyA1234567890abcdefghijklmnopqrstu"),
                ("GEMINI_MODEL", "gemini-1.5-flash"),
                ("RUPERT_WAKE_WORDS", "Hey Computer, jarvis"),
                ("RUPERT_COMMAND_TIMEOUT_MS", "4000"),
            ]),
        );
        assert_eq!(
            config.model.api_key.as_deref(),
            Some("AIzaSyA1234567890abcdefghijklmnopqrstu")
        );
        assert_eq!(config.model.endpoints[0].model, "gemini-1.5-flash");
        assert_eq!(
            config
                .model
                .endpoints
                .iter()
                .filter(|e| e.model == "gemini-1.5-flash")
                .count(),
            1
        );
        assert_eq!(config.wake.phrases, vec!["hey computer", "jarvis"]);
        assert_eq!(config.session.command_timeout_ms, 4000);
    }

    #[test]
    fn test_blank_override_ignored() {
        let mut config = RupertConfig::default();
        apply_overrides(&mut config, env(&[("GEMINI_API_KEY", "  ")]));
        assert!(config.model.api_key.is_none());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let mut config = RupertConfig::default();
        config.dispatch.llm_threshold = 1.5;
        match validate(&config) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("llm_threshold")),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wake_confidence_out_of_range_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::fs::write(file.path(), "wake:\n  fuzzy_confidence: 7.5\n").unwrap();

        let config = ConfigLoader::load_from(file.path()).await.unwrap();
        assert_eq!(config.wake.fuzzy_confidence, 7.5);
        match ConfigLoader::load(Some(file.path())).await {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("wake.fuzzy_confidence")),
            other => panic!("Expected Invalid, got {:?}", other),
        }

        let mut config = RupertConfig::default();
        config.wake.interim_confidence = -0.1;
        assert!(matches!(validate(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = RupertConfig::default();
        config.session.command_timeout_ms = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_api_key_shape() {
        assert!(validate_api_key("AIzaSyA1234567890abcdefghijklmnopqrstu"));
        assert!(validate_api_key("a-very-long-proxy-token-value"));
        assert!(!validate_api_key("short"));
    }
}
