use once_cell::sync::Lazy;
use regex::Regex;

static PAREN_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\(Source:.*?\)").expect("valid regex"));
static BRACKET_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\[Source:.*?\]").expect("valid regex"));
static RAW_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

/// Remove `(Source: …)`/`[Source: …]` citations and bare URLs from a model reason.
///
/// Stripping can expose a new citation (`((Source: a)Source: b)`), so passes
/// repeat until the text stops changing. Each changing pass shortens the text,
/// which bounds the loop.
pub fn clean_reason(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let text = PAREN_CITATION.replace_all(text, "");
    let text = BRACKET_CITATION.replace_all(&text, "");
    let text = RAW_URL.replace_all(&text, "");
    text.trim().to_string()
}
