// src/resolution/summary.rs
// Score-share diagnostics over the final results.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::models::stats_models::{LinkageSummary, NormalizationStats, ResolutionStats, TierStats};
use crate::models::{MatchResult, SurveyTable};

const MISSING_LMCP: &str = "missing";

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Assemble the end-of-run report. Shares are fractions of `results` in `0.0..=1.0`.
pub fn build_summary(
    run_id: &str,
    run_timestamp: NaiveDateTime,
    normalization: NormalizationStats,
    tiers: Vec<TierStats>,
    resolution: ResolutionStats,
    results: &[MatchResult],
    survey: &SurveyTable,
) -> LinkageSummary {
    let total = results.len();
    let serial_score = |r: &MatchResult| r.closest_serial.map(|m| m.score);

    let serial_100 = results.iter().filter(|r| serial_score(r) == Some(100)).count();
    let serial_90s = results
        .iter()
        .filter(|r| matches!(serial_score(r), Some(s) if (90..100).contains(&s)))
        .count();
    let highest_90 = results.iter().filter(|r| r.highest_score >= 90).count();

    let mut lmcp_counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        let lmcp = survey
            .rows
            .get(result.target_index)
            .and_then(|s| s.lmcp.clone())
            .unwrap_or_else(|| MISSING_LMCP.to_string());
        *lmcp_counts.entry(lmcp).or_insert(0) += 1;
    }
    let lmcp_shares = lmcp_counts
        .into_iter()
        .map(|(lmcp, count)| (lmcp, share(count, total)))
        .collect();

    LinkageSummary {
        run_id: run_id.to_string(),
        run_timestamp,
        normalization,
        tiers,
        resolution,
        share_serial_100: share(serial_100, total),
        share_serial_90_to_100: share(serial_90s, total),
        share_highest_at_least_90: share(highest_90, total),
        lmcp_shares,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SurveyRecord, Tier, TierMatch};
    use chrono::Utc;

    fn result(target_index: usize, serial: Option<u8>, highest: u8) -> MatchResult {
        MatchResult {
            source_index: 0,
            target_index,
            winning_tier: Tier::Serial,
            closest_serial: serial.map(|score| TierMatch { target_index, score }),
            closest_account: None,
            closest_name: None,
            highest_score: highest,
            good_match: false,
            name_match_score: 0,
            serial_list: Vec::new(),
            account_list: Vec::new(),
        }
    }

    #[test]
    fn test_shares() {
        let survey = SurveyTable {
            rows: vec![
                SurveyRecord { lmcp: Some("connected".into()), ..Default::default() },
                SurveyRecord::default(),
            ],
        };
        let results = vec![
            result(0, Some(100), 100),
            result(0, Some(95), 95),
            result(1, None, 91),
            result(1, Some(70), 80),
        ];
        let summary = build_summary(
            "run",
            Utc::now().naive_utc(),
            NormalizationStats::default(),
            Vec::new(),
            ResolutionStats::default(),
            &results,
            &survey,
        );
        assert!((summary.share_serial_100 - 0.25).abs() < 1e-9);
        assert!((summary.share_serial_90_to_100 - 0.25).abs() < 1e-9);
        assert!((summary.share_highest_at_least_90 - 0.75).abs() < 1e-9);
        assert!((summary.lmcp_shares["connected"] - 0.5).abs() < 1e-9);
        assert!((summary.lmcp_shares["missing"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_results() {
        let summary = build_summary(
            "run",
            Utc::now().naive_utc(),
            NormalizationStats::default(),
            Vec::new(),
            ResolutionStats::default(),
            &[],
            &SurveyTable::default(),
        );
        assert_eq!(summary.share_serial_100, 0.0);
        assert!(summary.lmcp_shares.is_empty());
    }
}
