//! Narrative tokenization shared by every corpus stage.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel emitted in place of masked dates.
pub const DATE_TOKEN: &str = "__date__";

static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}-?[a-z]{3}-?\d{2,4}\b").expect("valid date regex"));

// Two or more word characters, matching the usual vectorizer token pattern.
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

// Decimal digits only; letter-like numerals such as roman numerals stay tokens.
static NUMERIC_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid regex"));

/// Lowercasing word tokenizer with optional date masking and a token cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    mask_dates: bool,
    max_length: Option<usize>,
}

impl Tokenizer {
    pub fn new(mask_dates: bool, max_length: Option<usize>) -> Self {
        Self {
            mask_dates,
            max_length,
        }
    }

    /// Same configuration with the token cap removed.
    pub fn unbounded(self) -> Self {
        Self {
            max_length: None,
            ..self
        }
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Tokenize `text` left to right.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let cleaned = if self.mask_dates {
            DATE_PATTERN.replace_all(&lowered, DATE_TOKEN)
        } else {
            lowered.as_str().into()
        };

        let tokens = TOKEN_PATTERN
            .find_iter(&cleaned)
            .map(|m| m.as_str())
            .filter(|token| !is_numeric(token))
            .map(str::to_string);

        match self.max_length {
            Some(limit) => tokens.take(limit).collect(),
            None => tokens.collect(),
        }
    }

    /// Tokenize and re-join with single spaces.
    pub fn tokenize_joined(&self, text: &str) -> String {
        self.tokenize(text).join(" ")
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(true, Some(2500))
    }
}

fn is_numeric(token: &str) -> bool {
    NUMERIC_PATTERN.is_match(token)
}
