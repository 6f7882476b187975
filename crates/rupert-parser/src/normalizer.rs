use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WAKE_PREFIX: Regex =
        Regex::new(r"^(?:(?:hey|hi|ok|okay)[,\s]+)?(?:rupert|robert|ruppert)\b[,.!:]?\s*").unwrap();
    static ref COURTESY_PREFIX: Regex =
        Regex::new(r"^(?:please|(?:can|could|would|will)\s+you(?:\s+please)?)\s+").unwrap();
    static ref COURTESY_SUFFIX: Regex = Regex::new(r"[,\s]+(?:please|thanks|thank\s+you)$").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Canonical form of a spoken command before grammar matching.
///
/// Lowercases, collapses whitespace, drops trailing punctuation, a leading
/// activation phrase ("hey rupert,") and polite filler ("please", "can you").
/// Applying it twice gives the same result as applying it once.
pub fn normalize_transcript(input: &str) -> String {
    let mut text = collapse(&input.to_lowercase());
    loop {
        let before = text.clone();
        text = strip_trailing_punctuation(&text);
        text = WAKE_PREFIX.replace(&text, "").into_owned();
        text = COURTESY_PREFIX.replace(&text, "").into_owned();
        text = COURTESY_SUFFIX.replace(&text, "").into_owned();
        text = collapse(&text);
        if text == before {
            return text;
        }
    }
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn strip_trailing_punctuation(text: &str) -> String {
    text.trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':') || c.is_whitespace())
        .to_string()
}
