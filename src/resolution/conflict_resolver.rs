// src/resolution/conflict_resolver.rs
// Merges the tier outputs and reduces them to at most one result per household and entity,
// keeping every row that ties at the top.

use log::{debug, info};
use std::collections::HashMap;
use std::hash::Hash;

use crate::matching::scorer::extract_one;
use crate::matching::tiered::TieredOutput;
use crate::models::stats_models::ResolutionStats;
use crate::models::{
    LinkedRow, MatchResult, Score, SurveyTable, Tier, TierMatch, TransactionTable,
};
use crate::utils::linkage_config::LinkageConfig;

#[derive(Debug, Clone)]
pub struct ResolutionOutput {
    pub results: Vec<MatchResult>,
    pub stats: ResolutionStats,
}

/// A serial score of 100, or a high serial score corroborated by the name tier on the same
/// survey row.
pub fn is_good_match(row: &LinkedRow, config: &LinkageConfig) -> bool {
    let Some(serial) = row.closest_serial else {
        return false;
    };
    if serial.score == 100 {
        return true;
    }
    if serial.score < config.good_match_serial_min {
        return false;
    }
    match row.closest_name {
        Some(name) => {
            name.target_index == serial.target_index && name.score >= config.good_match_name_min
        }
        None => false,
    }
}

/// One linked row per accepted candidate, in tier order then transaction order.
///
/// Account and name rows also carry their transaction's serial-tier outcome, when it had one.
pub fn assemble_linked_rows(tiered: &TieredOutput, config: &LinkageConfig) -> Vec<LinkedRow> {
    let serial_outcomes = tiered.tier(Tier::Serial).map(|t| t.outcomes.as_slice());

    tiered
        .all_candidates()
        .map(|candidate| {
            let own = Some(TierMatch::from(candidate));
            let carried_serial = serial_outcomes
                .and_then(|o| o.get(candidate.source_index).copied().flatten())
                .map(|c| TierMatch::from(&c));
            let mut row = LinkedRow {
                source_index: candidate.source_index,
                target_index: candidate.target_index,
                origin: candidate.tier,
                closest_serial: if candidate.tier == Tier::Serial { own } else { carried_serial },
                closest_account: if candidate.tier == Tier::Account { own } else { None },
                closest_name: if candidate.tier == Tier::Name { own } else { None },
                highest_score: 0,
                good_match: false,
            };
            row.highest_score = row.present_max_score().unwrap_or(candidate.score);
            row.good_match = is_good_match(&row, config);
            row
        })
        .collect()
}

/// Keep items whose score equals the maximum of their group, plus any item `also_keep` accepts.
fn retain_group_max<T, K>(
    items: Vec<T>,
    key: impl Fn(&T) -> K,
    score: impl Fn(&T) -> Score,
    also_keep: impl Fn(&T) -> bool,
) -> Vec<T>
where
    K: Hash + Eq,
{
    let mut best: HashMap<K, Score> = HashMap::new();
    for item in &items {
        let entry = best.entry(key(item)).or_insert(0);
        *entry = (*entry).max(score(item));
    }
    items
        .into_iter()
        .filter(|item| also_keep(item) || best.get(&key(item)).map_or(true, |max| score(item) >= *max))
        .collect()
}

/// Number of groups holding more than one item.
fn count_shared_groups<T, K: Hash + Eq>(items: &[T], key: impl Fn(&T) -> K) -> usize {
    let mut sizes: HashMap<K, usize> = HashMap::new();
    for item in items {
        *sizes.entry(key(item)).or_insert(0) += 1;
    }
    sizes.values().filter(|n| **n > 1).count()
}

/// Pushes `value` unless it is already present.
fn push_distinct(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Best score of the transaction name against the household's names; 0 when nothing compares.
fn household_name_score(
    result: &MatchResult,
    survey: &SurveyTable,
    transactions: &TransactionTable,
    config: &LinkageConfig,
) -> Score {
    let full_name = &transactions.rows[result.source_index].full_name;
    let names = survey.rows[result.target_index].name_fields();
    match extract_one(full_name, &names, config.dedup_scorer, 0) {
        Ok(Some(m)) => m.score,
        _ => 0,
    }
}

/// Resolve competing linked rows into the final results.
///
/// 1. per survey row keep the top-scoring rows and every good match;
/// 2. collapse rows sharing survey row, customer name and service into one result that
///    lists every serial and account number seen;
/// 3. per survey row keep the results whose customer name best matches the household;
/// 4. per customer entity keep the results with the top score.
pub fn resolve_conflicts(
    rows: Vec<LinkedRow>,
    survey: &SurveyTable,
    transactions: &TransactionTable,
    config: &LinkageConfig,
) -> ResolutionOutput {
    let mut stats = ResolutionStats {
        linked_rows: rows.len(),
        good_matches: rows.iter().filter(|r| r.good_match).count(),
        ..Default::default()
    };
    let survey_key = |target_index: usize| &survey.rows[target_index];

    let before = rows.len();
    let rows = retain_group_max(
        rows,
        |r: &LinkedRow| survey_key(r.target_index),
        |r| r.highest_score,
        |r| r.good_match,
    );
    stats.dropped_dominated = before - rows.len();
    debug!("Dominance filter kept {} of {} linked rows", rows.len(), before);

    // Variants collapse onto the first row of each group.
    let mut group_slots: HashMap<(&_, &str, &str), usize> = HashMap::new();
    let mut collapsed: Vec<MatchResult> = Vec::new();
    for row in &rows {
        let tx = &transactions.rows[row.source_index];
        let key = (
            survey_key(row.target_index),
            tx.full_name.as_str(),
            tx.offered_service.as_str(),
        );
        let slot = *group_slots.entry(key).or_insert_with(|| {
            collapsed.push(MatchResult {
                source_index: row.source_index,
                target_index: row.target_index,
                winning_tier: row.origin,
                closest_serial: row.closest_serial,
                closest_account: row.closest_account,
                closest_name: row.closest_name,
                highest_score: row.highest_score,
                good_match: row.good_match,
                name_match_score: 0,
                serial_list: Vec::new(),
                account_list: Vec::new(),
            });
            collapsed.len() - 1
        });
        push_distinct(&mut collapsed[slot].serial_list, &tx.serial_number);
        push_distinct(&mut collapsed[slot].account_list, &tx.account_number);
    }
    stats.collapsed_variants = rows.len() - collapsed.len();

    for result in collapsed.iter_mut() {
        result.name_match_score = household_name_score(result, survey, transactions, config);
    }

    let before = collapsed.len();
    let by_name = retain_group_max(
        collapsed,
        |r: &MatchResult| survey_key(r.target_index),
        |r| r.name_match_score,
        |_| false,
    );
    stats.dropped_by_name_score = before - by_name.len();

    let before = by_name.len();
    let results = retain_group_max(
        by_name,
        |r: &MatchResult| transactions.rows[r.source_index].canonical_key(),
        |r| r.highest_score,
        |_| false,
    );
    stats.dropped_by_entity_score = before - results.len();

    stats.ambiguous_survey_rows =
        count_shared_groups(&results, |r: &MatchResult| survey_key(r.target_index));
    stats.ambiguous_entities = count_shared_groups(&results, |r: &MatchResult| {
        transactions.rows[r.source_index].canonical_key()
    });
    stats.results = results.len();

    info!(
        "🧩 Conflict resolution: {} linked rows → {} results ({} dominated, {} variants collapsed, {} by name score, {} by entity score)",
        stats.linked_rows,
        stats.results,
        stats.dropped_dominated,
        stats.collapsed_variants,
        stats.dropped_by_name_score,
        stats.dropped_by_entity_score
    );

    ResolutionOutput { results, stats }
}
