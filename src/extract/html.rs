//! HTML preparation for extraction prompts

use regex::Regex;
use std::sync::OnceLock;

fn noise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<svg\b[^>]*>.*?</svg\s*>|<!--.*?-->",
        )
        .expect("static regex")
    })
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Drop scripts, styles, inline SVG and comments, then collapse whitespace.
///
/// Markup and attributes are kept so the model can still build locators.
pub fn clean_html(html: &str) -> String {
    let stripped = noise_regex().replace_all(html, " ");
    whitespace_regex()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

/// Split `text` into word windows of `chunk_words`, each starting
/// `chunk_words - overlap_words` after the previous one.
pub fn chunk_words(text: &str, chunk_words: usize, overlap_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let size = chunk_words.max(1);
    let stride = size.saturating_sub(overlap_words).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    chunks
}
