// src/matching/scope.rs
// Restricts comparisons to survey rows that share the transaction's grouping key.

use std::collections::HashMap;

use crate::models::{GroupKey, SurveyRecord, SurveyTable, TransactionRecord};
use crate::utils::linkage_config::GroupingKeyMode;

fn make_key(county: &str, transformer_id: &str, mode: GroupingKeyMode) -> Option<GroupKey> {
    if transformer_id.is_empty() {
        return None;
    }
    let county = match mode {
        GroupingKeyMode::CountyTransformer => Some(county.to_string()),
        GroupingKeyMode::Transformer => None,
    };
    Some(GroupKey {
        county,
        transformer_id: transformer_id.to_string(),
    })
}

pub fn survey_group_key(record: &SurveyRecord, mode: GroupingKeyMode) -> Option<GroupKey> {
    make_key(&record.county, &record.transformer_id, mode)
}

pub fn transaction_group_key(record: &TransactionRecord, mode: GroupingKeyMode) -> Option<GroupKey> {
    make_key(&record.county, &record.transformer_id, mode)
}

/// Grouping key → survey row indices, ascending.
#[derive(Debug, Clone)]
pub struct ScopeIndex {
    mode: GroupingKeyMode,
    groups: HashMap<GroupKey, Vec<usize>>,
}

impl ScopeIndex {
    pub fn build(survey: &SurveyTable, mode: GroupingKeyMode) -> Self {
        let mut groups: HashMap<GroupKey, Vec<usize>> = HashMap::new();
        for (idx, record) in survey.rows.iter().enumerate() {
            if let Some(key) = survey_group_key(record, mode) {
                groups.entry(key).or_default().push(idx);
            }
        }
        Self { mode, groups }
    }

    /// Survey rows in scope for `record`. Empty when the key is blank or unknown.
    pub fn candidates_for(&self, record: &TransactionRecord) -> &[usize] {
        transaction_group_key(record, self.mode)
            .and_then(|key| self.groups.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn largest_group(&self) -> usize {
        self.groups.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn avg_group_size(&self) -> f64 {
        if self.groups.is_empty() {
            return 0.0;
        }
        self.groups.values().map(Vec::len).sum::<usize>() as f64 / self.groups.len() as f64
    }
}
