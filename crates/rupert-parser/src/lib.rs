pub mod fallback;
pub mod grammar;
pub mod normalizer;

pub use fallback::parse_keywords;
pub use grammar::{CommandGrammar, CommandSummary, GrammarRule, Slot};
pub use normalizer::normalize_transcript;

use rupert_common::protocol::Intent;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid pattern for rule '{rule}': {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid site shortcut '{name}': {reason}")]
    InvalidSite { name: String, reason: String },
}

/// Parses a transcript with the built-in command grammar.
pub fn parse<'a>(text: impl Into<Option<&'a str>>) -> Intent {
    CommandGrammar::builtin().parse(text)
}
