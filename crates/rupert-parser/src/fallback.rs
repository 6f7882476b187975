//! Keyword parser used when no language model could interpret a command.
//!
//! Far less expressive than the grammar: it looks for a handful of keywords
//! anywhere in the sentence, so it copes with the chatty phrasing that the
//! anchored grammar rules reject.

use crate::normalizer::normalize_transcript;
use rupert_common::protocol::{ActionKind, Intent, IntentSource, Target};
use rupert_common::sites::SITE_SHORTCUTS;
use rupert_common::text::clean_words;

pub const MANUAL_CONFIDENCE: f64 = 0.7;

/// Interprets `text` by keyword. Returns an `unknown` intent when nothing
/// recognizable is found.
pub fn parse_keywords(text: &str) -> Intent {
    let normalized = normalize_transcript(text);
    let words = clean_words(&normalized);
    if words.is_empty() {
        return Intent::unknown("No transcript provided", IntentSource::ManualFallback);
    }
    let has = |w: &str| words.iter().any(|x| x == w);
    let phrase = words.join(" ");

    if phrase.contains("new tab") {
        return intent(ActionKind::NewTab, "Opening a new tab");
    }
    if phrase.contains("close tab") || phrase.contains("close this tab") {
        return intent(ActionKind::CloseTab, "Closing the current tab");
    }

    if let Some(query) = search_terms(&words) {
        return intent(ActionKind::Search, format!("Searching for \"{}\"", query))
            .with_target(Target::Text(query));
    }

    let opens = ["open", "go", "visit", "navigate", "show", "launch"]
        .iter()
        .any(|v| has(v));
    if let Some((site, url)) = SITE_SHORTCUTS
        .iter()
        .find(|(site, _)| has(site) || phrase.contains(&format!("{}.com", site)))
    {
        if opens || words.len() == 1 {
            return intent(ActionKind::Navigate, format!("Opening {}", site))
                .with_target(Target::text(*site))
                .with_url(*url);
        }
    }

    if has("scroll") || phrase.contains("page down") || phrase.contains("page up") {
        let direction = ["up", "down", "top", "bottom"]
            .into_iter()
            .find(|d| has(d))
            .unwrap_or("down");
        return intent(ActionKind::Scroll, format!("Scrolling {}", direction))
            .with_target(Target::text(direction));
    }

    if has("back") || has("previous") {
        return intent(ActionKind::Back, "Going back");
    }
    if has("forward") {
        return intent(ActionKind::Forward, "Going forward");
    }
    if has("refresh") || has("reload") {
        return intent(ActionKind::Refresh, "Refreshing the page");
    }

    Intent::unknown(
        "I couldn't understand that command",
        IntentSource::ManualFallback,
    )
}

fn intent(action: ActionKind, explanation: impl Into<String>) -> Intent {
    Intent::new(action, MANUAL_CONFIDENCE, explanation, IntentSource::ManualFallback)
}

fn search_terms(words: &[String]) -> Option<String> {
    let start = words.iter().position(|w| w == "search").map(|i| i + 1).or_else(|| {
        words
            .windows(2)
            .position(|pair| pair[0] == "look" && pair[1] == "up")
            .map(|i| i + 2)
    })?;
    let mut rest = &words[start..];
    while let Some(first) = rest.first() {
        if matches!(first.as_str(), "for" | "the" | "web" | "google") {
            rest = &rest[1..];
        } else {
            break;
        }
    }
    if rest.is_empty() {
        return None;
    }
    Some(rest.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_google() {
        let intent = parse_keywords("open google");
        assert_eq!(intent.action, ActionKind::Navigate);
        assert_eq!(intent.url.as_deref(), Some("https://google.com"));
        assert_eq!(intent.source, IntentSource::ManualFallback);
        assert_eq!(intent.confidence, MANUAL_CONFIDENCE);
    }

    #[test]
    fn test_chatty_phrasing() {
        let intent = parse_keywords("um could you maybe scroll the page up a bit");
        assert_eq!(intent.action, ActionKind::Scroll);
        assert_eq!(intent.target, Some(Target::text("up")));

        let intent = parse_keywords("I want to search for cheap flights to Lisbon");
        assert_eq!(intent.action, ActionKind::Search);
        assert_eq!(intent.target_text().as_deref(), Some("cheap flights to lisbon"));
    }

    #[test]
    fn test_site_name_needs_verb_in_sentence() {
        let intent = parse_keywords("I read about amazon yesterday");
        assert!(intent.is_unknown());
    }

    #[test]
    fn test_no_match_is_unknown() {
        let intent = parse_keywords("the quick brown fox");
        assert!(intent.is_unknown());
        assert_eq!(intent.confidence, 0.0);
        assert!(parse_keywords("").is_unknown());
    }
}
