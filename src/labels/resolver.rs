//! Per-label description lookup with a fixed fallback ladder.
//!
//! A label is looked up as-is first. A missing page leads to one retry with
//! the last word trimmed ("Blood amylase increased" -> "Blood amylase"). A
//! disambiguation page leads to one retry with a chosen candidate, preferring
//! medically qualified titles such as "Syncope (medicine)". Anything else
//! falls back to the label text itself.

use std::fmt;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::nlp::sentences::first_sentence;

/// Candidate lists at least this long are too ambiguous for a blind pick.
pub const DISAMBIGUATION_LIMIT: usize = 10;

/// Fresh lookup, trimmed retry, disambiguated retry.
pub const MAX_LOOKUPS: usize = 3;

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]*)\)\s*$").expect("valid parenthetical regex"));

static MEDICAL_QUALIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(medicine|medical|disease|disorder|syndrome|symptom|sign|condition|pathology|anatomy|physiology|biology|biochemistry|pharmacology|drug|medication|infection|injury|enzyme|protein|hormone|vaccine|vaccination|dermatology|neurology|cardiology|psychiatry|psychology|ophthalmology|haematology|hematology|immunology|surgery)\b",
    )
    .expect("valid medical regex")
});

/// Outcome of a single title lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found { title: String, summary: String },
    /// The title is ambiguous; candidates in source order.
    Disambiguation { candidates: Vec<String> },
    NotFound,
}

/// Title-indexed knowledge source such as Wikipedia.
#[allow(async_fn_in_trait)]
pub trait KnowledgeSource {
    async fn lookup(&self, title: &str) -> Result<Lookup>;
}

/// Terminal state of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    Original,
    Disambiguation,
    Trimmed,
    TrimmedDisambiguation,
    Failed,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::Original,
        Resolution::Disambiguation,
        Resolution::Trimmed,
        Resolution::TrimmedDisambiguation,
        Resolution::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Original => "original",
            Resolution::Disambiguation => "disambiguation",
            Resolution::Trimmed => "trimmed",
            Resolution::TrimmedDisambiguation => "trimmed-disambiguation",
            Resolution::Failed => "failed",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved description of one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDescription {
    pub label: String,
    /// First sentence of the summary, or the label on failure.
    pub description: String,
    pub summary: String,
    pub resolution: Resolution,
    /// Lookups issued for this label.
    pub lookups: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fresh,
    Trimmed,
    Disambiguating { trimmed: bool },
}

impl Stage {
    fn resolution(self) -> Resolution {
        match self {
            Stage::Fresh => Resolution::Original,
            Stage::Trimmed => Resolution::Trimmed,
            Stage::Disambiguating { trimmed: false } => Resolution::Disambiguation,
            Stage::Disambiguating { trimmed: true } => Resolution::TrimmedDisambiguation,
        }
    }
}

/// Resolve `label` against `source`. Never fails: exhausted or erroring
/// lookups produce a `Failed` record whose description and summary are the label.
pub async fn resolve<S: KnowledgeSource>(source: &S, label: &str) -> LabelDescription {
    let mut query = label.trim().to_string();
    let mut stage = Stage::Fresh;
    let mut lookups = 0usize;

    while lookups < MAX_LOOKUPS {
        lookups += 1;
        let outcome = match source.lookup(&query).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%label, %query, %err, "lookup failed");
                break;
            }
        };

        match outcome {
            Lookup::Found { title, summary } => match first_sentence(&summary) {
                Some(description) => {
                    debug!(%label, %title, stage = ?stage, "resolved");
                    return LabelDescription {
                        label: label.to_string(),
                        description,
                        summary,
                        resolution: stage.resolution(),
                        lookups,
                    };
                }
                // An empty summary is as good as no page.
                None => match (stage, trim_last_word(&query)) {
                    (Stage::Fresh, Some(trimmed)) => {
                        query = trimmed;
                        stage = Stage::Trimmed;
                    }
                    _ => break,
                },
            },
            Lookup::Disambiguation { candidates } => {
                let trimmed = match stage {
                    Stage::Fresh => false,
                    Stage::Trimmed => true,
                    Stage::Disambiguating { .. } => break,
                };
                match choose_candidate(&candidates) {
                    Some(candidate) => {
                        debug!(%label, %candidate, "following disambiguation");
                        query = candidate.to_string();
                        stage = Stage::Disambiguating { trimmed };
                    }
                    None => {
                        debug!(%label, candidates = candidates.len(), "too ambiguous");
                        break;
                    }
                }
            }
            Lookup::NotFound => match (stage, trim_last_word(&query)) {
                (Stage::Fresh, Some(trimmed)) => {
                    query = trimmed;
                    stage = Stage::Trimmed;
                }
                _ => break,
            },
        }
    }

    LabelDescription {
        label: label.to_string(),
        description: label.to_string(),
        summary: label.to_string(),
        resolution: Resolution::Failed,
        lookups,
    }
}

/// Drop the last whitespace-delimited word; `None` when nothing would remain.
pub fn trim_last_word(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }
    Some(words[..words.len() - 1].join(" "))
}

/// First medically qualified candidate, else the first of a short list.
pub fn choose_candidate(candidates: &[String]) -> Option<&str> {
    let medical = candidates.iter().find(|c| has_medical_qualifier(c));
    if let Some(candidate) = medical {
        return Some(candidate.as_str());
    }
    if candidates.len() < DISAMBIGUATION_LIMIT {
        return candidates.first().map(String::as_str);
    }
    None
}

/// True for titles like `Syncope (medicine)` or `Shock (circulatory disorder)`.
pub fn has_medical_qualifier(title: &str) -> bool {
    PARENTHETICAL
        .captures(title)
        .and_then(|caps| caps.get(1))
        .is_some_and(|qualifier| MEDICAL_QUALIFIER.is_match(qualifier.as_str()))
}
