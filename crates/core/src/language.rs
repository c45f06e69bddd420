//! Heuristic text classifiers for the three supported languages.
//!
//! Nothing here is a real language model: detection and extraction are keyword and
//! character-class driven, and misses on short or mixed input are expected.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::order::{DayPart, DeliveryDay, DeliveryWindow};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    French,
    Arabic,
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::French => "french",
            Self::Arabic => "arabic",
            Self::English => "english",
        }
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "french" | "fr" => Ok(Self::French),
            "arabic" | "ar" => Ok(Self::Arabic),
            "english" | "en" => Ok(Self::English),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported language `{other}` (expected french|arabic|english)"
            ))),
        }
    }
}

const FRENCH_ACCENTS: &str = "éèêëàâäôöùûüçæœ";
const FRENCH_STOP_WORDS: &[&str] = &["je", "tu", "vous", "nous", "le", "la", "les", "bonjour", "merci"];

const FRENCH_NUMBERS: &[(&str, u32)] = &[
    ("un", 1),
    ("deux", 2),
    ("trois", 3),
    ("quatre", 4),
    ("cinq", 5),
    ("six", 6),
    ("sept", 7),
    ("huit", 8),
    ("neuf", 9),
    ("dix", 10),
];
const ARABIC_NUMBERS: &[(&str, u32)] = &[
    ("واحد", 1),
    ("اثنان", 2),
    ("ثلاثة", 3),
    ("أربعة", 4),
    ("خمسة", 5),
    ("ستة", 6),
    ("سبعة", 7),
    ("ثمانية", 8),
    ("تسعة", 9),
    ("عشرة", 10),
];
const ENGLISH_NUMBERS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
];

const AFFIRMATIVE_TOKENS: &[&str] = &["oui", "yes", "نعم", "أجل"];
const CANCELLATION_TOKENS: &[&str] = &["annuler", "annule", "cancel", "stop", "إلغاء", "الغاء"];

const TODAY_KEYWORDS: &[&str] = &["aujourd", "today", "اليوم"];
const MORNING_KEYWORDS: &[&str] = &["matin", "morning", "صباح"];

/// First match wins: Arabic script, then French markers, then English as the
/// low-confidence default.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(is_arabic_script) {
        return Language::Arabic;
    }

    let lowered = text.to_lowercase();
    let has_accent = lowered.chars().any(|character| FRENCH_ACCENTS.contains(character));
    let has_stop_word = words(&lowered).any(|word| FRENCH_STOP_WORDS.contains(&word));
    if has_accent || has_stop_word {
        return Language::French;
    }

    Language::English
}

/// Always at least 1. A digit run anywhere in the text beats spelled-out numbers.
pub fn extract_quantity(text: &str) -> u32 {
    if let Some(value) = first_digit_run(text) {
        return value.max(1);
    }

    for token in text.split_whitespace() {
        let token = trim_token(token).to_lowercase();
        for table in [FRENCH_NUMBERS, ARABIC_NUMBERS, ENGLISH_NUMBERS] {
            if let Some((_, value)) = table.iter().find(|(word, _)| *word == token) {
                return *value;
            }
        }
    }

    1
}

pub fn is_affirmative(text: &str) -> bool {
    contains_token(text, AFFIRMATIVE_TOKENS)
}

pub fn is_cancellation(text: &str) -> bool {
    contains_token(text, CANCELLATION_TOKENS)
}

/// Keyword scan across the three languages. Anything unrecognized falls back to
/// tomorrow evening.
pub fn parse_delivery_window(text: &str) -> DeliveryWindow {
    let lowered = text.to_lowercase();
    let day = if TODAY_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        DeliveryDay::Today
    } else {
        DeliveryDay::Tomorrow
    };
    let part = if MORNING_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        DayPart::Morning
    } else {
        DayPart::Evening
    };
    DeliveryWindow { day, part }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no option number in the message")]
    Missing,
    #[error("option {selected} is outside 1..={available}")]
    OutOfRange { selected: u32, available: usize },
}

/// Reads the first number in `text` as a 1-based index into a list of `available` options
/// and returns the 0-based position.
pub fn parse_selection_index(text: &str, available: usize) -> Result<usize, SelectionError> {
    let selected = first_digit_run(text).ok_or(SelectionError::Missing)?;
    let index = usize::try_from(selected).unwrap_or(usize::MAX);
    if index == 0 || index > available {
        return Err(SelectionError::OutOfRange { selected, available });
    }
    Ok(index - 1)
}

fn is_arabic_script(character: char) -> bool {
    matches!(
        character,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

fn digit_value(character: char) -> Option<u32> {
    match character {
        '0'..='9' => character.to_digit(10),
        '\u{0660}'..='\u{0669}' => Some(character as u32 - 0x0660),
        '\u{06F0}'..='\u{06F9}' => Some(character as u32 - 0x06F0),
        _ => None,
    }
}

fn first_digit_run(text: &str) -> Option<u32> {
    let mut value: Option<u32> = None;
    for character in text.chars() {
        match (digit_value(character), value) {
            (Some(digit), current) => {
                let current = current.unwrap_or(0);
                value = Some(current.saturating_mul(10).saturating_add(digit));
            }
            (None, Some(_)) => break,
            (None, None) => {}
        }
    }
    value
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|character: char| !character.is_alphanumeric())
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|character: char| !character.is_alphanumeric() && character != '\'')
        .flat_map(|chunk| chunk.split('\''))
        .filter(|word| !word.is_empty())
}

fn contains_token(text: &str, tokens: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    let found = words(&lowered).any(|word| tokens.contains(&word));
    found
}
