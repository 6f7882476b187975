//! Language-model interpretation of spoken commands.
//!
//! The resolver walks its endpoint list until one returns a usable reply,
//! then falls back to the keyword parser, and finally to an `unknown`
//! intent. It never fails outright.

pub mod client;
pub mod context;
pub mod fallback;
pub mod prompt;
pub mod reply;

pub use client::{GeminiClient, GenerationConfig, ModelClient, ModelEndpoint, ModelError};
pub use context::{BrowserContext, CommandHistory};

use fallback::try_in_order;
use prompt::build_prompt;
use reply::reply_to_intent;
use rupert_common::protocol::{Intent, IntentSource};
use rupert_parser::parse_keywords;
use std::sync::Arc;
use tracing::{info, warn};

/// Replies below this score are turned into a request to rephrase.
pub const DEFAULT_REPHRASE_BELOW: f64 = 0.5;

pub struct IntentResolver {
    client: Arc<dyn ModelClient>,
    endpoints: Vec<ModelEndpoint>,
    rephrase_below: f64,
}

impl IntentResolver {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self {
            client,
            endpoints: client::default_endpoints(),
            rephrase_below: DEFAULT_REPHRASE_BELOW,
        }
    }

    pub fn with_endpoints(mut self, endpoints: Vec<ModelEndpoint>) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_rephrase_below(mut self, threshold: f64) -> Self {
        self.rephrase_below = threshold;
        self
    }

    pub fn endpoints(&self) -> &[ModelEndpoint] {
        &self.endpoints
    }

    pub fn client(&self) -> &Arc<dyn ModelClient> {
        &self.client
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    pub async fn resolve(&self, text: &str, context: &BrowserContext) -> Intent {
        let text = text.trim();
        if text.is_empty() {
            return Intent::unknown("No transcript provided", IntentSource::Llm);
        }

        if self.client.is_configured() {
            let prompt = build_prompt(text, context);
            let threshold = self.rephrase_below;
            let result = try_in_order(self.endpoints.iter().cloned(), |endpoint| {
                let client = Arc::clone(&self.client);
                let prompt = &prompt;
                async move {
                    let reply = client.generate(&endpoint, prompt).await?;
                    Ok::<_, ModelError>(reply_to_intent(&reply, threshold)?)
                }
            })
            .await;

            match result {
                Ok((endpoint, intent)) => {
                    info!(
                        endpoint = %endpoint,
                        action = %intent.action,
                        confidence = intent.confidence,
                        "Model interpreted command"
                    );
                    return intent;
                }
                Err(exhausted) => warn!(
                    attempts = exhausted.attempts(),
                    "All model endpoints failed, using keyword fallback"
                ),
            }
        } else {
            warn!("No API key configured, using keyword fallback");
        }

        let intent = parse_keywords(text);
        if intent.is_unknown() {
            return Intent::unknown(
                "I couldn't understand that command. Please try rephrasing it.",
                IntentSource::ManualFallback,
            );
        }
        intent
    }
}
