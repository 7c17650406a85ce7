// src/matching/scorer.rs
// String similarity on a 0-100 scale and best-field extraction over a candidate list.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rapidfuzz::distance::indel;
use thiserror::Error;

use crate::error::ConfigError;
use crate::models::Score;

/// Raised when a query has nothing left to compare after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("query is empty after processing")]
pub struct ScoringUnavailable;

/// Distance metric used by a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScorerKind {
    /// Indel (insert/delete) ratio. Order sensitive; serial and account numbers.
    Ratio,
    /// Ratio over shared and leftover token sets. Ignores order and repeated words.
    TokenSet,
    /// Ratio over alphabetically sorted tokens.
    TokenSort,
}

impl ScorerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScorerKind::Ratio => "ratio",
            ScorerKind::TokenSet => "token_set",
            ScorerKind::TokenSort => "token_sort",
        }
    }

    /// Score two raw strings. Both sides are processed first.
    pub fn score(&self, a: &str, b: &str) -> Score {
        self.score_processed(&process(a), &process(b))
    }

    fn score_processed(&self, a: &str, b: &str) -> Score {
        match self {
            ScorerKind::Ratio => ratio_processed(a, b),
            ScorerKind::TokenSet => token_set_ratio_processed(a, b),
            ScorerKind::TokenSort => token_sort_ratio_processed(a, b),
        }
    }
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScorerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ratio" => Ok(ScorerKind::Ratio),
            "token_set" | "token_set_ratio" => Ok(ScorerKind::TokenSet),
            "token_sort" | "token_sort_ratio" => Ok(ScorerKind::TokenSort),
            other => Err(ConfigError::InvalidValue {
                field: "scorer",
                reason: format!("unknown scorer '{}'", other),
            }),
        }
    }
}

/// Best candidate field for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMatch {
    /// Position in the candidate list passed to [`extract_one`].
    pub field_index: usize,
    pub score: Score,
}

/// Lower-case, turn anything that is not alphanumeric into a space, collapse and trim.
pub fn process(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn ratio(a: &str, b: &str) -> Score {
    ScorerKind::Ratio.score(a, b)
}

pub fn token_set_ratio(a: &str, b: &str) -> Score {
    ScorerKind::TokenSet.score(a, b)
}

pub fn token_sort_ratio(a: &str, b: &str) -> Score {
    ScorerKind::TokenSort.score(a, b)
}

fn to_score(similarity: f64) -> Score {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as Score
}

fn ratio_processed(a: &str, b: &str) -> Score {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }
    // (len_a + len_b - indel distance) / (len_a + len_b)
    to_score(indel::normalized_similarity(a.chars(), b.chars()))
}

fn token_sort_ratio_processed(a: &str, b: &str) -> Score {
    let sort = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    ratio_processed(&sort(a), &sort(b))
}

fn token_set_ratio_processed(a: &str, b: &str) -> Score {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0;
    }

    let sorted_sect = tokens_a
        .intersection(&tokens_b)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    let diff_ab = tokens_a.difference(&tokens_b).copied().collect::<Vec<_>>().join(" ");
    let diff_ba = tokens_b.difference(&tokens_a).copied().collect::<Vec<_>>().join(" ");

    let combined_ab = format!("{} {}", sorted_sect, diff_ab).trim().to_string();
    let combined_ba = format!("{} {}", sorted_sect, diff_ba).trim().to_string();

    [
        ratio_processed(&sorted_sect, &combined_ab),
        ratio_processed(&sorted_sect, &combined_ba),
        ratio_processed(&combined_ab, &combined_ba),
    ]
    .into_iter()
    .max()
    .unwrap_or(0)
}

/// Highest-scoring candidate at or above `cutoff`, skipping missing candidates.
///
/// Ties keep the earliest candidate in list order. `Ok(None)` means nothing cleared the
/// cutoff (or there was nothing to compare against).
pub fn extract_one(
    query: &str,
    choices: &[Option<&str>],
    scorer: ScorerKind,
    cutoff: Score,
) -> Result<Option<FieldMatch>, ScoringUnavailable> {
    let processed_query = process(query);
    if processed_query.is_empty() {
        return Err(ScoringUnavailable);
    }

    let mut best: Option<FieldMatch> = None;
    for (field_index, choice) in choices.iter().enumerate() {
        let Some(choice) = choice else { continue };
        let score = scorer.score_processed(&processed_query, &process(choice));
        if score < cutoff {
            continue;
        }
        if best.map_or(true, |b| score > b.score) {
            best = Some(FieldMatch { field_index, score });
        }
    }
    Ok(best)
}
