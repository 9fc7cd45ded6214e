use std::sync::LazyLock;

use regex::Regex;

use crate::models::enums::Speaker;
use crate::models::PatientRecord;

/// Canonical phrasings a patient uses to state their own name. Captures
/// are letters-only so "I'm 29" never reads as a name.
static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"my name is ([a-zA-Z]+)",
        r"i'?m ([a-zA-Z]+)",
        r"i am ([a-zA-Z]+)",
        r"call me ([a-zA-Z]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid fallback name pattern"))
    .collect()
});

/// Canonical phrasings for a stated age.
static AGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"i'?m (\d{1,3}) years? old",
        r"i am (\d{1,3}) years? old",
        r"(\d{1,3}) years? old",
        r"i'?m (\d{1,3})\b",
        r"i am (\d{1,3})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid fallback age pattern"))
    .collect()
});

/// Minimal deterministic extraction used when the LLM path fails: name and
/// age only, from patient turns only, first match wins and never
/// overwrites what the record already holds.
pub fn apply_fallback_extraction(record: &mut PatientRecord) {
    for turn in &record.chat_history {
        if turn.speaker != Speaker::Patient {
            continue;
        }
        let text = turn.text.to_lowercase();

        if record.name.is_none() {
            if let Some(name) = first_capture(&NAME_PATTERNS, &text) {
                record.name = Some(title_case(&name));
                tracing::debug!(source = "fallback", "recovered patient name from phrasing");
            }
        }

        if record.age.is_none() {
            if let Some(age) = first_capture(&AGE_PATTERNS, &text)
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|age| super::extraction::is_plausible_age(*age))
            {
                record.age = Some(age);
                tracing::debug!(source = "fallback", age, "recovered patient age from phrasing");
            }
        }

        if record.name.is_some() && record.age.is_some() {
            break;
        }
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    for pattern in patterns {
        if let Some(captures) = pattern.captures(text) {
            if let Some(matched) = captures.get(1) {
                return Some(matched.as_str().to_string());
            }
        }
    }
    None
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
