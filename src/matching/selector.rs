// src/matching/selector.rs
// Picks the single best survey row for one transaction within its scope.

use crate::matching::scorer::{extract_one, ScoringUnavailable};
use crate::models::{MatchCandidate, SurveyRecord, SurveyTable, Tier, TransactionRecord};
use crate::utils::linkage_config::TierConfig;

/// Why a selection did or did not produce a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Matched(MatchCandidate),
    /// Candidates existed but none cleared the cutoff.
    BelowCutoff,
    NoCandidateInScope,
    ScoringUnavailable,
}

impl SelectOutcome {
    pub fn candidate(&self) -> Option<MatchCandidate> {
        match self {
            SelectOutcome::Matched(c) => Some(*c),
            _ => None,
        }
    }
}

/// Transaction field compared in `tier`.
pub fn query_for(tier: Tier, record: &TransactionRecord) -> &str {
    match tier {
        Tier::Serial => &record.serial_number,
        Tier::Account => &record.account_number,
        Tier::Name => &record.full_name,
    }
}

/// Survey fields compared in `tier`, in tie-break order.
pub fn choices_for(tier: Tier, record: &SurveyRecord) -> Vec<Option<&str>> {
    match tier {
        Tier::Serial | Tier::Account => record.identifier_fields(),
        Tier::Name => record.name_fields(),
    }
}

/// Best survey row among `in_scope` for transaction `source_index`.
///
/// Every in-scope row is scored against its field list; the highest score at or above
/// the cutoff wins, ties going to the lowest survey index.
pub fn select_best(
    source_index: usize,
    source: &TransactionRecord,
    in_scope: &[usize],
    survey: &SurveyTable,
    config: &TierConfig,
) -> SelectOutcome {
    if in_scope.is_empty() {
        return SelectOutcome::NoCandidateInScope;
    }
    let query = query_for(config.tier, source);

    let mut ordered: Vec<usize> = in_scope.to_vec();
    ordered.sort_unstable();

    let mut best: Option<MatchCandidate> = None;
    for target_index in ordered {
        let Some(target) = survey.rows.get(target_index) else {
            continue;
        };
        let choices = choices_for(config.tier, target);
        let field_match = match extract_one(query, &choices, config.scorer, config.cutoff) {
            Ok(m) => m,
            Err(ScoringUnavailable) => return SelectOutcome::ScoringUnavailable,
        };
        if let Some(m) = field_match {
            if best.map_or(true, |b| m.score > b.score) {
                best = Some(MatchCandidate {
                    source_index,
                    target_index,
                    score: m.score,
                    tier: config.tier,
                });
            }
        }
    }

    match best {
        Some(candidate) => SelectOutcome::Matched(candidate),
        None => SelectOutcome::BelowCutoff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scorer::ScorerKind;

    fn survey_row(meter: Option<&str>, account: Option<&str>, names: &[&str]) -> SurveyRecord {
        SurveyRecord {
            county: "kilifi".into(),
            transformer_id: "t1".into(),
            meter_number: meter.map(String::from),
            account_number: account.map(String::from),
            respondent_name: names.first().map(|s| s.to_string()),
            household_member_names: names.iter().skip(1).map(|s| Some(s.to_string())).collect(),
            ..Default::default()
        }
    }

    fn tx(serial: &str, name: &str) -> TransactionRecord {
        TransactionRecord {
            county: "kilifi".into(),
            transformer_id: "t1".into(),
            full_name: name.into(),
            serial_number: serial.into(),
            account_number: "0".into(),
            offered_service: "prepaid".into(),
            ..Default::default()
        }
    }

    fn config(tier: Tier, scorer: ScorerKind, cutoff: u8) -> TierConfig {
        TierConfig {
            tier,
            cutoff,
            scorer,
            confident_threshold: 97,
        }
    }

    #[test]
    fn test_selects_highest_score_across_rows() {
        let survey = SurveyTable {
            rows: vec![
                survey_row(Some("14253999"), None, &[]),
                survey_row(None, Some("14253678"), &[]),
                survey_row(Some("99999999"), None, &[]),
            ],
        };
        let outcome = select_best(
            7,
            &tx("14253678", "x"),
            &[0, 1, 2],
            &survey,
            &config(Tier::Serial, ScorerKind::Ratio, 65),
        );
        let c = outcome.candidate().unwrap();
        assert_eq!(c.source_index, 7);
        assert_eq!(c.target_index, 1);
        assert_eq!(c.score, 100);
        assert_eq!(c.tier, Tier::Serial);
    }

    #[test]
    fn test_tie_goes_to_lowest_target_index() {
        let survey = SurveyTable {
            rows: vec![
                survey_row(Some("5000"), None, &[]),
                survey_row(Some("1234"), None, &[]),
                survey_row(Some("1234"), None, &[]),
            ],
        };
        let outcome = select_best(
            0,
            &tx("1234", "x"),
            &[2, 1],
            &survey,
            &config(Tier::Serial, ScorerKind::Ratio, 65),
        );
        assert_eq!(outcome.candidate().unwrap().target_index, 1);
    }

    #[test]
    fn test_never_returns_below_cutoff() {
        let survey = SurveyTable {
            rows: vec![survey_row(Some("12345678"), None, &[]), survey_row(Some("12349999"), None, &[])],
        };
        for cutoff in [0u8, 50, 65, 80, 90, 100] {
            let outcome = select_best(
                0,
                &tx("12345699", "x"),
                &[0, 1],
                &survey,
                &config(Tier::Serial, ScorerKind::Ratio, cutoff),
            );
            if let Some(c) = outcome.candidate() {
                assert!(c.score >= cutoff);
            } else {
                assert_eq!(outcome, SelectOutcome::BelowCutoff);
            }
        }
    }

    #[test]
    fn test_name_tier_uses_all_household_names() {
        let survey = SurveyTable {
            rows: vec![
                survey_row(None, None, &["peter otieno", "grace achieng"]),
                survey_row(None, None, &["mary wanjiru", "kamau john"]),
            ],
        };
        let outcome = select_best(
            0,
            &tx("1", "john kamau"),
            &[0, 1],
            &survey,
            &config(Tier::Name, ScorerKind::TokenSet, 70),
        );
        let c = outcome.candidate().unwrap();
        assert_eq!(c.target_index, 1);
        assert_eq!(c.score, 100);
    }

    #[test]
    fn test_empty_scope_and_empty_query() {
        let survey = SurveyTable {
            rows: vec![survey_row(Some("1234"), None, &[])],
        };
        let cfg = config(Tier::Serial, ScorerKind::Ratio, 65);
        assert_eq!(
            select_best(0, &tx("1234", "x"), &[], &survey, &cfg),
            SelectOutcome::NoCandidateInScope
        );
        assert_eq!(
            select_best(0, &tx("--", "x"), &[0], &survey, &cfg),
            SelectOutcome::ScoringUnavailable
        );
    }
}
