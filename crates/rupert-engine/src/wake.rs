//! Activation phrase detection.
//!
//! Three passes over the tail of each utterance, cheapest first: an exact
//! substring check, a whole-phrase fuzzy comparison and a per-word check
//! against phonetic variants of the assistant's name.

use rupert_common::protocol::{Utterance, WakeDetection, WakeMethod};
use rupert_common::text::{clean_words, similarity, trailing};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeConfig {
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
    #[serde(default = "default_variants")]
    pub variants: Vec<String>,
    #[serde(default = "default_exact_window")]
    pub exact_window: usize,
    #[serde(default = "default_fuzzy_window")]
    pub fuzzy_window: usize,
    #[serde(default = "default_word_window")]
    pub word_window: usize,
    #[serde(default = "default_fuzzy_similarity")]
    pub fuzzy_similarity: f64,
    #[serde(default = "default_fuzzy_confidence")]
    pub fuzzy_confidence: f32,
    #[serde(default = "default_word_similarity")]
    pub word_similarity: f64,
    #[serde(default = "default_word_confidence")]
    pub word_confidence: f32,
    /// Interim (non-final) results are only considered above this score.
    #[serde(default = "default_interim_confidence")]
    pub interim_confidence: f32,
}

fn default_phrases() -> Vec<String> {
    vec!["hey rupert".into(), "rupert".into(), "hey robert".into()]
}

fn default_variants() -> Vec<String> {
    ["rupert", "robert", "ruber", "ruppert", "rupe", "rup"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exact_window() -> usize {
    4
}

fn default_fuzzy_window() -> usize {
    3
}

fn default_word_window() -> usize {
    2
}

fn default_fuzzy_similarity() -> f64 {
    0.8
}

fn default_fuzzy_confidence() -> f32 {
    0.7
}

fn default_word_similarity() -> f64 {
    0.7
}

fn default_word_confidence() -> f32 {
    0.75
}

fn default_interim_confidence() -> f32 {
    0.8
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrases: default_phrases(),
            variants: default_variants(),
            exact_window: default_exact_window(),
            fuzzy_window: default_fuzzy_window(),
            word_window: default_word_window(),
            fuzzy_similarity: default_fuzzy_similarity(),
            fuzzy_confidence: default_fuzzy_confidence(),
            word_similarity: default_word_similarity(),
            word_confidence: default_word_confidence(),
            interim_confidence: default_interim_confidence(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WakeWordMatcher {
    config: WakeConfig,
}

impl WakeWordMatcher {
    pub fn new(config: WakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WakeConfig {
        &self.config
    }

    /// Whether a recognizer result should be evaluated at all.
    pub fn should_consider(&self, utterance: &Utterance) -> bool {
        utterance.is_final || utterance.confidence > self.config.interim_confidence
    }

    pub fn detect(&self, utterance: &Utterance) -> WakeDetection {
        let cfg = &self.config;
        let confidence = utterance.confidence;
        let words = clean_words(&utterance.text);
        if words.is_empty() {
            return WakeDetection::miss(confidence);
        }
        let phrases: Vec<String> = cfg
            .phrases
            .iter()
            .map(|p| clean_words(p).join(" "))
            .filter(|p| !p.is_empty())
            .collect();

        let recent = trailing(&words, cfg.exact_window).join(" ");
        if let Some(phrase) = phrases.iter().find(|p| contains_words(&recent, p)) {
            return WakeDetection::hit(WakeMethod::Exact, phrase.clone(), None, confidence);
        }

        let recent = trailing(&words, cfg.fuzzy_window).join(" ");
        let best = phrases
            .iter()
            .map(|p| (p, similarity(&recent, p)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((phrase, score)) = best {
            if score >= cfg.fuzzy_similarity && confidence > cfg.fuzzy_confidence {
                return WakeDetection::hit(WakeMethod::Fuzzy, phrase.clone(), Some(score), confidence);
            }
        }

        if confidence > cfg.word_confidence {
            for word in trailing(&words, cfg.word_window) {
                let score = cfg
                    .variants
                    .iter()
                    .map(|v| similarity(word, &v.to_lowercase()))
                    .fold(0.0_f64, f64::max);
                if score > cfg.word_similarity {
                    return WakeDetection::hit(
                        WakeMethod::WordMatch,
                        word.clone(),
                        Some(score),
                        confidence,
                    );
                }
            }
        }

        WakeDetection::miss(confidence)
    }
}

/// Word-aligned substring test, so "rupert" does not fire inside "ruperts".
fn contains_words(haystack: &str, needle: &str) -> bool {
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// Evaluates `utterance` against `phrases` with the default thresholds.
pub fn detect(utterance: &Utterance, phrases: &[String]) -> WakeDetection {
    let config = WakeConfig {
        phrases: phrases.to_vec(),
        ..WakeConfig::default()
    };
    WakeWordMatcher::new(config).detect(utterance)
}

/// Words spoken after the last occurrence of `phrase`, if any.
///
/// `"hey rupert open new tab"` with phrase `"rupert"` gives `"open new tab"`.
pub fn command_after_wake(text: &str, phrase: &str) -> Option<String> {
    let words = clean_words(text);
    let needle = clean_words(phrase);
    if needle.is_empty() || words.len() <= needle.len() {
        return None;
    }
    let start = (0..=words.len() - needle.len())
        .rev()
        .find(|&i| words[i..i + needle.len()] == needle[..])?;
    let rest = &words[start + needle.len()..];
    if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    }
}
