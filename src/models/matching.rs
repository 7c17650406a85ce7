// src/models/matching.rs
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Similarity percentage in `0..=100`.
pub type Score = u8;

/// Identifier family used by one matching pass, declared in decreasing order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Serial,
    Account,
    Name,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Serial, Tier::Account, Tier::Name];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Serial => "serial",
            Tier::Account => "account",
            Tier::Name => "name",
        }
    }

    /// Upper-case tag and emoji used in log lines.
    pub fn log_label(&self) -> (&'static str, &'static str) {
        match self {
            Tier::Serial => ("SERIAL", "🔢"),
            Tier::Account => ("ACCOUNT", "🧾"),
            Tier::Name => ("NAME", "👤"),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "serial" => Ok(Tier::Serial),
            "account" => Ok(Tier::Account),
            "name" => Ok(Tier::Name),
            other => Err(ConfigError::InvalidValue {
                field: "tier",
                reason: format!("unknown tier '{}'", other),
            }),
        }
    }
}

/// One accepted comparison: transaction `source_index` against survey `target_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MatchCandidate {
    pub source_index: usize,
    pub target_index: usize,
    pub score: Score,
    pub tier: Tier,
}

/// The `(index, score)` pair reported per tier in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TierMatch {
    pub target_index: usize,
    pub score: Score,
}

impl From<&MatchCandidate> for TierMatch {
    fn from(c: &MatchCandidate) -> Self {
        TierMatch {
            target_index: c.target_index,
            score: c.score,
        }
    }
}

/// A survey/transaction pairing produced by one tier, before conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedRow {
    pub source_index: usize,
    pub target_index: usize,
    pub origin: Tier,
    pub closest_serial: Option<TierMatch>,
    pub closest_account: Option<TierMatch>,
    pub closest_name: Option<TierMatch>,
    pub highest_score: Score,
    pub good_match: bool,
}

impl LinkedRow {
    pub fn tier_match(&self, tier: Tier) -> Option<TierMatch> {
        match tier {
            Tier::Serial => self.closest_serial,
            Tier::Account => self.closest_account,
            Tier::Name => self.closest_name,
        }
    }

    /// Max over whichever tier scores are present.
    pub fn present_max_score(&self) -> Option<Score> {
        Tier::ALL
            .iter()
            .filter_map(|t| self.tier_match(*t))
            .map(|m| m.score)
            .max()
    }
}

/// Resolved linkage for one canonical entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub source_index: usize,
    pub target_index: usize,
    pub winning_tier: Tier,
    pub closest_serial: Option<TierMatch>,
    pub closest_account: Option<TierMatch>,
    pub closest_name: Option<TierMatch>,
    pub highest_score: Score,
    pub good_match: bool,
    pub name_match_score: Score,
    pub serial_list: Vec<String>,
    pub account_list: Vec<String>,
}
