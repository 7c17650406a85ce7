// src/models/stats_models.rs
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

use super::matching::Tier;

/// Per-tier counters collected while a tier runs.
#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub tier: Tier,
    pub sources_considered: usize,
    pub sources_skipped_claimed: usize,
    pub targets_excluded: usize,
    pub matches_accepted: usize,
    pub confident_matches: usize,
    pub no_candidate_in_scope: usize,
    pub scoring_unavailable: usize,
    pub avg_score: f64,
    pub duration_ms: u64,
}

impl TierStats {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            sources_considered: 0,
            sources_skipped_claimed: 0,
            targets_excluded: 0,
            matches_accepted: 0,
            confident_matches: 0,
            no_candidate_in_scope: 0,
            scoring_unavailable: 0,
            avg_score: 0.0,
            duration_ms: 0,
        }
    }
}

/// Counts from input normalization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationStats {
    pub survey_rows: usize,
    pub survey_malformed_identifiers: usize,
    pub transaction_rows_raw: usize,
    pub transaction_rows_dropped_incomplete: usize,
    pub transaction_rows_duplicate: usize,
    pub transaction_rows: usize,
    pub key_corrections_applied: usize,
    pub out_of_universe: usize,
}

/// Counts from conflict resolution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionStats {
    pub linked_rows: usize,
    pub good_matches: usize,
    pub dropped_dominated: usize,
    pub collapsed_variants: usize,
    pub dropped_by_name_score: usize,
    pub dropped_by_entity_score: usize,
    /// Survey rows left linked to more than one transaction entity.
    pub ambiguous_survey_rows: usize,
    /// Transaction entities left linked to more than one survey row.
    pub ambiguous_entities: usize,
    pub results: usize,
}

/// End-of-run diagnostic report.
#[derive(Debug, Clone, Serialize)]
pub struct LinkageSummary {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub normalization: NormalizationStats,
    pub tiers: Vec<TierStats>,
    pub resolution: ResolutionStats,
    pub share_serial_100: f64,
    pub share_serial_90_to_100: f64,
    pub share_highest_at_least_90: f64,
    pub lmcp_shares: BTreeMap<String, f64>,
}
