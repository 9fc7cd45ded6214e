//! Lightweight language detection for patient messages.
//!
//! Detects English vs Spanish using keyword frequency and diacritic
//! scoring. No external dependencies; a heuristic is enough to tag the
//! record with the language the patient writes in.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    pub fn label(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Spanish => "Spanish",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageDetectError {
    #[error("Text too short for language detection")]
    TooShort,

    #[error("No language indicators found")]
    Inconclusive,
}

/// Below this many characters detection is not attempted at all.
const MIN_DETECT_LEN: usize = 12;

/// Common English words and chat phrasings rarely found in Spanish text.
const ENGLISH_INDICATORS: &[&str] = &[
    "the ", "and ", "have ", "has ", "i ", "my ", "is ", "it ", "for ", "with ", "not ", "but ",
    "was ", "are ", "you ", "this ", "that ", "been ", "since ", "i'm ", "name ", "years ",
    "feel", "pain", "hurt", "ache", "days", "weeks", "doctor", "thanks", "thank you", "hello",
    "morning", "night",
];

/// Common Spanish words and chat phrasings rarely found in English text.
const SPANISH_INDICATORS: &[&str] = &[
    "el ", "la ", "los ", "las ", "una ", "de ", "en ", "que ", "y ", "es ", "me ", "mi ",
    "no ", "con ", "por ", "para ", "desde ", "hace ", "muy ", "estoy ", "soy ", "tengo",
    "siento", "duele", "dolor", "cabeza", "fiebre", "gracias", "hola", "doctora", "mareo",
    "náuseas", "años", "días", "semanas",
];

/// Detect the language of one patient message.
///
/// Errors are part of the contract: `TooShort` means "wait for more
/// text", `Inconclusive` means the caller should apply its documented
/// English default. English wins ties when both languages score.
pub fn detect_language(text: &str) -> Result<Language, LanguageDetectError> {
    if text.trim().len() < MIN_DETECT_LEN {
        return Err(LanguageDetectError::TooShort);
    }

    let lower = text.to_lowercase();

    let english_score = count_indicators(&lower, ENGLISH_INDICATORS);
    let spanish_score = count_indicators(&lower, SPANISH_INDICATORS) + count_spanish_marks(&lower);

    if english_score == 0 && spanish_score == 0 {
        return Err(LanguageDetectError::Inconclusive);
    }

    if spanish_score > english_score {
        Ok(Language::Spanish)
    } else {
        Ok(Language::English)
    }
}

/// Count how many indicator patterns appear in the text.
fn count_indicators(lower_text: &str, indicators: &[&str]) -> u32 {
    let mut score = 0u32;
    for &indicator in indicators {
        score += lower_text.matches(indicator).count() as u32;
    }
    score
}

/// Spanish-specific characters are a strong signal on their own.
fn count_spanish_marks(lower_text: &str) -> u32 {
    let mut count = 0u32;
    for ch in lower_text.chars() {
        if matches!(ch, 'ñ' | '¿' | '¡' | 'á' | 'é' | 'í' | 'ó' | 'ú' | 'ü') {
            count += 1;
        }
    }
    count / 2
}
