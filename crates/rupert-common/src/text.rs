//! Small text helpers shared by the wake matcher and the parsers.

/// Normalized Levenshtein similarity in `[0, 1]`, computed over chars:
/// `(max_len - distance) / max_len`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    (max_len - distance.min(max_len)) as f64 / max_len as f64
}

/// Lowercases, strips punctuation (apostrophes survive) and splits on
/// whitespace.
pub fn clean_words(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// The last `n` words, or all of them when there are fewer.
pub fn trailing(words: &[String], n: usize) -> &[String] {
    let start = words.len().saturating_sub(n);
    &words[start..]
}
