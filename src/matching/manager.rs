// src/matching/manager.rs - Runs normalize → scope → tiers → resolve → summary for one batch
use chrono::Utc;
use indicatif::{MultiProgress, ProgressBar};
use log::info;
use std::time::Instant;

use crate::error::LinkageError;
use crate::matching::normalize::{normalize_survey, normalize_transactions};
use crate::matching::scope::ScopeIndex;
use crate::matching::tiered::{run_tiered_matching, TieredOutput};
use crate::models::stats_models::{LinkageSummary, NormalizationStats};
use crate::models::{
    MatchResult, RawSurveyRecord, RawTransactionRecord, SurveyTable, TransactionTable,
};
use crate::resolution::{assemble_linked_rows, build_summary, resolve_conflicts, ResolutionOutput};
use crate::utils::get_memory_usage;
use crate::utils::linkage_config::LinkageConfig;
use crate::utils::progress_bars::logging::{
    log_normalization, log_pipeline_completion, log_pipeline_phase, log_pipeline_start,
};

/// Everything a run produced. Indices in `results` point into `survey` and `transactions`.
#[derive(Debug, Clone)]
pub struct LinkageRun {
    pub survey: SurveyTable,
    pub transactions: TransactionTable,
    pub results: Vec<MatchResult>,
    pub summary: LinkageSummary,
}

/// Normalized inputs ready for matching.
#[derive(Debug, Clone)]
pub struct PreparedTables {
    pub survey: SurveyTable,
    pub transactions: TransactionTable,
    pub stats: NormalizationStats,
}

pub fn prepare_tables(
    raw_survey: &[RawSurveyRecord],
    raw_transactions: &[RawTransactionRecord],
    config: &LinkageConfig,
) -> PreparedTables {
    let mut stats = NormalizationStats::default();
    let survey = normalize_survey(raw_survey, &mut stats);
    let transactions =
        normalize_transactions(raw_transactions, &survey, &config.key_corrections, &mut stats);
    PreparedTables {
        survey,
        transactions,
        stats,
    }
}

/// Run the three tiers, on a dedicated pool sized by `config.threads` when parallel.
pub fn match_tables(
    survey: &SurveyTable,
    transactions: &TransactionTable,
    config: &LinkageConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<TieredOutput, LinkageError> {
    let scope = ScopeIndex::build(survey, config.grouping_key);
    info!(
        "🗂️  Scope index: {} groups, avg {:.1} survey rows/group, largest: {}",
        scope.group_count(),
        scope.avg_group_size(),
        scope.largest_group()
    );

    if !config.parallel {
        return Ok(run_tiered_matching(transactions, survey, &scope, config, multi_progress));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()?;
    Ok(pool.install(|| run_tiered_matching(transactions, survey, &scope, config, multi_progress)))
}

/// Tiers plus conflict resolution, without the summary.
pub fn link_tables(
    survey: &SurveyTable,
    transactions: &TransactionTable,
    config: &LinkageConfig,
    multi_progress: Option<&MultiProgress>,
) -> Result<(TieredOutput, ResolutionOutput), LinkageError> {
    let tiered = match_tables(survey, transactions, config, multi_progress)?;
    let rows = assemble_linked_rows(&tiered, config);
    let resolution = resolve_conflicts(rows, survey, transactions, config);
    Ok((tiered, resolution))
}

pub fn run_linkage_pipeline(
    raw_survey: &[RawSurveyRecord],
    raw_transactions: &[RawTransactionRecord],
    config: &LinkageConfig,
    run_id: &str,
    multi_progress: Option<&MultiProgress>,
    show_memory: bool,
) -> Result<LinkageRun, LinkageError> {
    let start = Instant::now();
    config.validate()?;
    log_pipeline_start(run_id, config);

    let phase_pb = multi_progress.map(|mp| mp.add(ProgressBar::new_spinner()));
    let set_phase = |msg: &str| {
        if let Some(pb) = &phase_pb {
            if show_memory {
                pb.set_message(format!("{} (Mem: {} MB)", msg, get_memory_usage()));
            } else {
                pb.set_message(msg.to_string());
            }
            pb.tick();
        }
    };

    log_pipeline_phase("Normalization", Some("canonicalizing survey and transaction fields"));
    set_phase("Normalizing inputs...");
    let prepared = prepare_tables(raw_survey, raw_transactions, config);
    log_normalization(&prepared.stats);

    log_pipeline_phase("Matching", Some("serial → account → name"));
    set_phase("Running matching tiers...");
    let (tiered, resolution) =
        link_tables(&prepared.survey, &prepared.transactions, config, multi_progress)?;

    log_pipeline_phase("Summary", None);
    set_phase("Building summary...");
    let summary = build_summary(
        run_id,
        Utc::now().naive_utc(),
        prepared.stats,
        tiered.tiers.into_iter().map(|t| t.stats).collect(),
        resolution.stats,
        &resolution.results,
        &prepared.survey,
    );

    if let Some(pb) = phase_pb {
        pb.finish_with_message(format!("{} households linked", resolution.results.len()));
    }
    log_pipeline_completion(start.elapsed(), &summary);

    Ok(LinkageRun {
        survey: prepared.survey,
        transactions: prepared.transactions,
        results: resolution.results,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tier;

    fn raw_survey(transno: &str, code: &str, respondent: &str, meter: &str, account: &str) -> RawSurveyRecord {
        RawSurveyRecord {
            county: Some("Kilifi".into()),
            transno: Some(transno.into()),
            transname: Some("Market".into()),
            a1_7: Some(code.into()),
            a3_15: Some(respondent.into()),
            a3_22: None,
            hh_members: Vec::new(),
            l1_1: Some(meter.into()),
            l1_2: Some(account.into()),
            lmcp: Some("connected".into()),
        }
    }

    fn raw_tx(transno: &str, name: &str, serial: &str, account: &str, service: &str) -> RawTransactionRecord {
        RawTransactionRecord {
            county: Some("KILIFI".into()),
            tx_number: Some("TX-1".into()),
            transno: Some(transno.into()),
            full_name: Some(name.into()),
            serial_num: Some(serial.into()),
            account_no: Some(account.into()),
            offered_service: Some(service.into()),
        }
    }

    fn sequential_config() -> LinkageConfig {
        let mut config = LinkageConfig::default();
        config.parallel = false;
        config
    }

    #[test]
    fn test_end_to_end_tiers() {
        let survey = vec![
            raw_survey("41755", "HH_3", "John Kamau", "14253678", ""),
            raw_survey("41755", "HH_40", "Grace Achieng", "n/a", "55512345"),
            raw_survey("41755", "HH_7", "Peter Otieno", "", ""),
            raw_survey("99999", "HH_1", "John Kamau", "14253678", ""),
        ];
        let transactions = vec![
            raw_tx("41755", "JOHN KAMAU", "14253678", "90000001", "PREPAID"),
            raw_tx("41755", "Grace Achieng", "77777777", "55512345", "POSTPAID"),
            raw_tx("41755", "Otieno Peter", "31313131", "42424242", "PREPAID"),
            raw_tx("41755", "Nobody Known", "60606060", "80808080", "PREPAID"),
            // Exact duplicate of the first row.
            raw_tx("41755", "JOHN KAMAU", "14253678", "90000001", "PREPAID"),
        ];
        let run = run_linkage_pipeline(&survey, &transactions, &sequential_config(), "test-run", None, false)
            .unwrap();

        assert_eq!(run.summary.normalization.transaction_rows_duplicate, 1);
        assert_eq!(run.transactions.len(), 4);

        let by_source = |i: usize| run.results.iter().find(|r| r.source_index == i);
        let john = by_source(0).unwrap();
        assert_eq!(john.target_index, 0);
        assert_eq!(john.winning_tier, Tier::Serial);
        assert!(john.good_match);

        let grace = by_source(1).unwrap();
        assert_eq!(grace.target_index, 1);
        assert_eq!(grace.winning_tier, Tier::Account);

        let peter = by_source(2).unwrap();
        assert_eq!(peter.target_index, 2);
        assert_eq!(peter.winning_tier, Tier::Name);

        assert!(by_source(3).is_none());
        // The county/transformer scope keeps the other transformer's identical row out.
        assert!(run.results.iter().all(|r| r.target_index != 3));
    }

    #[test]
    fn test_key_correction_brings_rows_into_scope() {
        let survey = vec![RawSurveyRecord {
            county: Some("Kilifi".into()),
            transno: Some("41755 Kwini Market".into()),
            a3_15: Some("John Kamau".into()),
            l1_1: Some("14253678".into()),
            ..Default::default()
        }];
        let transactions = vec![raw_tx("Kwni Market", "John Kamau", "14253678", "1", "PREPAID")];
        let run = run_linkage_pipeline(&survey, &transactions, &sequential_config(), "test-run", None, false)
            .unwrap();
        assert_eq!(run.summary.normalization.key_corrections_applied, 1);
        assert_eq!(run.summary.normalization.out_of_universe, 0);
        assert_eq!(run.results.len(), 1);
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let survey = vec![
            raw_survey("1", "HH_3", "John Kamau", "14253678", ""),
            raw_survey("1", "HH_4", "Mary Wanjiru", "", "31313131"),
        ];
        let transactions = vec![
            raw_tx("1", "John Kamau", "14253678", "5", "PREPAID"),
            raw_tx("1", "Mary Wanjiru", "222", "31313131", "PREPAID"),
            raw_tx("1", "Wanjiru Mary", "333", "444", "POSTPAID"),
        ];
        let sequential = run_linkage_pipeline(&survey, &transactions, &sequential_config(), "a", None, false)
            .unwrap();
        let mut config = sequential_config();
        config.parallel = true;
        config.threads = 2;
        let parallel = run_linkage_pipeline(&survey, &transactions, &config, "b", None, false).unwrap();
        assert_eq!(sequential.results, parallel.results);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = sequential_config();
        config.name.cutoff = 120;
        let err = run_linkage_pipeline(&[], &[], &config, "bad", None, false).unwrap_err();
        assert!(matches!(err, LinkageError::Config(_)));
    }
}
