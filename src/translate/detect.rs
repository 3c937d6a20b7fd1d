//! Stop-word language detection.
//! Lowercases, splits on whitespace, and counts hits for the first 20 tokens
//! against a fixed stop-word list per supported language. Cheap and bounded,
//! not a real language identifier.

/// Only this many leading tokens are scored.
pub const MAX_SCORED_TOKENS: usize = 20;

/// Stop-word lists in table order. Ties go to the earliest entry.
const STOP_WORDS: [(&str, &[&str]); 4] = [
    (
        "pt",
        &["o", "a", "de", "que", "e", "do", "da", "em", "um", "para", "é", "com", "não", "uma", "os"],
    ),
    (
        "en",
        &["the", "of", "and", "a", "to", "in", "is", "you", "that", "it", "he", "was", "for", "on", "are"],
    ),
    (
        "es",
        &["el", "la", "de", "que", "y", "a", "en", "un", "es", "se", "no", "te", "lo", "le", "da"],
    ),
    (
        "de",
        &["der", "die", "und", "in", "den", "von", "zu", "das", "mit", "sich", "des", "auf", "für", "ist", "im"],
    ),
];

/// Per-language hit counts, in table order (pt, en, es, de).
pub fn score(text: &str) -> Vec<(&'static str, u32)> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().take(MAX_SCORED_TOKENS).collect();

    STOP_WORDS
        .iter()
        .map(|(code, stop_words)| {
            let hits = words.iter().filter(|w| stop_words.contains(*w)).count() as u32;
            (*code, hits)
        })
        .collect()
}

/// Best-scoring language, or `None` when no stop word matched.
pub fn detect(text: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, u32)> = None;
    for (code, hits) in score(text) {
        // Strictly greater keeps the first language to reach the maximum.
        if hits > best.map_or(0, |(_, b)| b) {
            best = Some((code, hits));
        }
    }
    best.map(|(code, _)| code)
}
