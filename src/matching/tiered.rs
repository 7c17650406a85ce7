// src/matching/tiered.rs
// Serial → account → name passes with an explicit claimed-row accumulator between them.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::time::Instant;

use crate::matching::scope::ScopeIndex;
use crate::matching::selector::{select_best, SelectOutcome};
use crate::models::stats_models::TierStats;
use crate::models::{MatchCandidate, SurveyTable, Tier, TransactionTable};
use crate::utils::linkage_config::{LinkageConfig, TierConfig};
use crate::utils::progress_bars::logging::TierLogger;

/// Transaction and survey rows confidently matched by earlier tiers.
///
/// Never mutated in place: each tier receives the set by reference and the next one is
/// produced with [`Claimed::absorb`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claimed {
    sources: BTreeSet<usize>,
    targets: BTreeSet<usize>,
}

impl Claimed {
    pub fn contains_source(&self, source_index: usize) -> bool {
        self.sources.contains(&source_index)
    }

    pub fn contains_target(&self, target_index: usize) -> bool {
        self.targets.contains(&target_index)
    }

    pub fn sources(&self) -> &BTreeSet<usize> {
        &self.sources
    }

    pub fn targets(&self) -> &BTreeSet<usize> {
        &self.targets
    }

    /// New set including every candidate scoring at or above `threshold`.
    pub fn absorb(&self, candidates: &[MatchCandidate], threshold: u8) -> Claimed {
        let mut next = self.clone();
        for c in candidates.iter().filter(|c| c.score >= threshold) {
            next.sources.insert(c.source_index);
            next.targets.insert(c.target_index);
        }
        next
    }
}

/// Everything one tier produced.
#[derive(Debug, Clone)]
pub struct TierOutput {
    pub tier: Tier,
    /// Indexed by transaction row; `None` for skipped or unmatched rows.
    pub outcomes: Vec<Option<MatchCandidate>>,
    /// Accepted candidates in transaction order.
    pub candidates: Vec<MatchCandidate>,
    pub stats: TierStats,
}

/// Output of all three tiers plus the final claimed set.
#[derive(Debug, Clone)]
pub struct TieredOutput {
    pub tiers: Vec<TierOutput>,
    pub claimed: Claimed,
}

impl TieredOutput {
    pub fn tier(&self, tier: Tier) -> Option<&TierOutput> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// All tiers' candidates concatenated in tier order.
    pub fn all_candidates(&self) -> impl Iterator<Item = &MatchCandidate> {
        self.tiers.iter().flat_map(|t| t.candidates.iter())
    }
}

fn tier_progress_bar(multi_progress: Option<&MultiProgress>, tier: Tier, len: usize) -> ProgressBar {
    let Some(mp) = multi_progress else {
        return ProgressBar::hidden();
    };
    let (name, emoji) = tier.log_label();
    let pb = mp.add(ProgressBar::new(len as u64));
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "  {} [{{elapsed_precise}}] {{bar:30.cyan/blue}} {{pos}}/{{len}} {} tier {{msg}}",
            emoji, name
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb
}

/// Run one tier over every transaction not yet claimed.
pub fn run_tier(
    transactions: &TransactionTable,
    survey: &SurveyTable,
    scope: &ScopeIndex,
    config: &TierConfig,
    claimed: &Claimed,
    parallel: bool,
    multi_progress: Option<&MultiProgress>,
) -> TierOutput {
    let logger = TierLogger::new(config.tier);
    let start = Instant::now();
    logger.log_start(config, claimed.sources().len(), claimed.targets().len());

    let pb = tier_progress_bar(multi_progress, config.tier, transactions.len());
    logger.log_phase(
        "Scoring",
        Some(&format!(
            "{} transactions, {}",
            transactions.len(),
            if parallel { "parallel" } else { "sequential" }
        )),
    );

    let select = |source_index: usize| -> Option<SelectOutcome> {
        pb.inc(1);
        if claimed.contains_source(source_index) {
            return None;
        }
        let source = &transactions.rows[source_index];
        let in_scope: Vec<usize> = scope
            .candidates_for(source)
            .iter()
            .copied()
            .filter(|t| !claimed.contains_target(*t))
            .collect();
        Some(select_best(source_index, source, &in_scope, survey, config))
    };

    let selections: Vec<Option<SelectOutcome>> = if parallel {
        (0..transactions.len()).into_par_iter().map(select).collect()
    } else {
        (0..transactions.len()).map(select).collect()
    };

    let mut stats = TierStats::new(config.tier);
    stats.targets_excluded = claimed.targets().len();
    let mut outcomes = Vec::with_capacity(selections.len());
    let mut candidates = Vec::new();
    for selection in selections {
        let candidate = match selection {
            None => {
                stats.sources_skipped_claimed += 1;
                None
            }
            Some(outcome) => {
                stats.sources_considered += 1;
                match outcome {
                    SelectOutcome::NoCandidateInScope => stats.no_candidate_in_scope += 1,
                    SelectOutcome::ScoringUnavailable => stats.scoring_unavailable += 1,
                    SelectOutcome::BelowCutoff | SelectOutcome::Matched(_) => {}
                }
                outcome.candidate()
            }
        };
        if let Some(c) = candidate {
            candidates.push(c);
        }
        outcomes.push(candidate);
    }

    stats.matches_accepted = candidates.len();
    stats.confident_matches = candidates
        .iter()
        .filter(|c| c.score >= config.confident_threshold)
        .count();
    if !candidates.is_empty() {
        stats.avg_score =
            candidates.iter().map(|c| c.score as f64).sum::<f64>() / candidates.len() as f64;
    }
    stats.duration_ms = start.elapsed().as_millis() as u64;
    logger.log_debug(&format!(
        "{} below cutoff",
        stats.sources_considered
            - stats.matches_accepted
            - stats.no_candidate_in_scope
            - stats.scoring_unavailable
    ));

    pb.finish_with_message(format!("{} matches", candidates.len()));
    logger.log_completion(&stats);

    TierOutput {
        tier: config.tier,
        outcomes,
        candidates,
        stats,
    }
}

/// Serial, then account, then name. Each tier sees the claims of all earlier tiers.
pub fn run_tiered_matching(
    transactions: &TransactionTable,
    survey: &SurveyTable,
    scope: &ScopeIndex,
    config: &LinkageConfig,
    multi_progress: Option<&MultiProgress>,
) -> TieredOutput {
    let mut claimed = Claimed::default();
    let mut tiers = Vec::with_capacity(Tier::ALL.len());
    for tier in Tier::ALL {
        let tier_config = config.tier(tier);
        let output = run_tier(
            transactions,
            survey,
            scope,
            tier_config,
            &claimed,
            config.parallel,
            multi_progress,
        );
        claimed = claimed.absorb(&output.candidates, tier_config.confident_threshold);
        tiers.push(output);
    }
    TieredOutput { tiers, claimed }
}
