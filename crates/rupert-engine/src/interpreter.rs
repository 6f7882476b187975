use crate::resolver::{BrowserContext, IntentResolver};
use rupert_common::protocol::Intent;
use rupert_parser::CommandGrammar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Which strategy turns a transcript into an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpreterMode {
    /// Regex grammar only; no network.
    Grammar,
    /// Language model (with keyword fallback).
    Llm,
    /// Grammar first, language model for anything the grammar doesn't know.
    #[default]
    Hybrid,
}

impl InterpreterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpreterMode::Grammar => "grammar",
            InterpreterMode::Llm => "llm",
            InterpreterMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for InterpreterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpreterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grammar" => Ok(InterpreterMode::Grammar),
            "llm" | "ai" => Ok(InterpreterMode::Llm),
            "hybrid" => Ok(InterpreterMode::Hybrid),
            other => Err(format!(
                "unknown interpreter mode '{}' (expected grammar, llm or hybrid)",
                other
            )),
        }
    }
}

pub struct Interpreter {
    mode: InterpreterMode,
    grammar: CommandGrammar,
    resolver: IntentResolver,
}

impl Interpreter {
    pub fn new(mode: InterpreterMode, grammar: CommandGrammar, resolver: IntentResolver) -> Self {
        Self {
            mode,
            grammar,
            resolver,
        }
    }

    pub fn mode(&self) -> InterpreterMode {
        self.mode
    }

    pub fn grammar(&self) -> &CommandGrammar {
        &self.grammar
    }

    pub fn resolver(&self) -> &IntentResolver {
        &self.resolver
    }

    pub async fn interpret(&self, text: &str, context: &BrowserContext) -> Intent {
        match self.mode {
            InterpreterMode::Grammar => self.grammar.parse(text),
            InterpreterMode::Llm => self.resolver.resolve(text, context).await,
            InterpreterMode::Hybrid => {
                let intent = self.grammar.parse(text);
                if !intent.is_unknown() {
                    return intent;
                }
                debug!("Grammar had no match, asking the model");
                self.resolver.resolve(text, context).await
            }
        }
    }
}
