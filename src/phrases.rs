// Turns a raw completion into the list of phrases shown to the user.
//
// The wizard writes the number of phrases it wants into the prompt, either as
// "Generate N completely independent ..." or "Number of phrases to generate: N".
// The model answers with phrases separated by blank lines, often prefixed with
// a "**Phrase N:**" label that is stripped here.

use lazy_static::lazy_static;
use regex::Regex;

pub const DEFAULT_PHRASE_COUNT: usize = 3;

lazy_static! {
    static ref GENERATE_COUNT: Regex =
        Regex::new(r"(?i)Generate\s+(\d+)\s+completely\s+independent").unwrap();
    static ref NUMBER_OF_PHRASES: Regex =
        Regex::new(r"(?i)Number of phrases to generate:\s*(\d+)").unwrap();
    static ref LABELS: [Regex; 3] = [
        Regex::new(r"(?im)^\*\*Phrase\s+\d+:\*\*\s*").unwrap(),
        Regex::new(r"(?im)^\*\*?Phrase\s+\d+\*\*?:\s*").unwrap(),
        Regex::new(r"(?im)^Phrase\s+\d+:\s*").unwrap(),
    ];
}

// How many phrases the prompt asks for. Falls back to 3 when the prompt
// doesn't say, or says zero.
pub fn requested_count(prompt: &str) -> usize {
    let captured = GENERATE_COUNT
        .captures(prompt)
        .or_else(|| NUMBER_OF_PHRASES.captures(prompt))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok());

    match captured {
        Some(n) if n > 0 => n,
        _ => DEFAULT_PHRASE_COUNT,
    }
}

fn strip_labels(chunk: &str) -> String {
    let mut cleaned = chunk.to_string();
    for label in LABELS.iter() {
        cleaned = label.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

// Split on blank lines, drop labels and empties, keep at most `limit`
pub fn extract_phrases(text: &str, limit: usize) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .filter(|chunk| !chunk.trim().is_empty())
        .map(strip_labels)
        .filter(|phrase| !phrase.is_empty())
        .take(limit)
        .collect()
}
