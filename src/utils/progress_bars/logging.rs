// src/utils/progress_bars/logging.rs - Logging helpers for matching tiers and the linkage pipeline
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::stats_models::{LinkageSummary, NormalizationStats, TierStats};
use crate::models::Tier;
use crate::utils::linkage_config::{LinkageConfig, TierConfig};

#[derive(Clone)]
pub struct TierLogger {
    tier_name: &'static str,
    tier_emoji: &'static str,
    start_time: Instant,
}

impl TierLogger {
    pub fn new(tier: Tier) -> Self {
        let (tier_name, tier_emoji) = tier.log_label();
        Self {
            tier_name,
            tier_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, config: &TierConfig, claimed_sources: usize, claimed_targets: usize) {
        info!(
            "[{}] {} 🚀 Starting {} matching (scorer: {}, cutoff: {}, confident at: {})",
            self.tier_name,
            self.tier_emoji,
            self.tier_name.to_lowercase(),
            config.scorer,
            config.cutoff,
            config.confident_threshold
        );
        if claimed_sources > 0 {
            info!(
                "[{}] {} ⏭️  {} transactions and {} survey rows already claimed by earlier tiers (will skip)",
                self.tier_name, self.tier_emoji, claimed_sources, claimed_targets
            );
        } else {
            info!(
                "[{}] {} ✨ No earlier claims - every transaction is eligible",
                self.tier_name, self.tier_emoji
            );
        }
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.tier_name, self.tier_emoji, phase, details, elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.tier_name, self.tier_emoji, phase, elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_completion(&self, stats: &TierStats) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED: {} matches accepted ({} confident) in {:.2?}",
            self.tier_name, self.tier_emoji, stats.matches_accepted, stats.confident_matches, duration
        );
        info!(
            "[{}] {} 📊 Results: {} transactions considered, avg score: {:.1}",
            self.tier_name, self.tier_emoji, stats.sources_considered, stats.avg_score
        );
        self.log_data_quality_issue("transactions with no survey row in scope", stats.no_candidate_in_scope);
        self.log_data_quality_issue("transactions with an empty comparison field", stats.scoring_unavailable);
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.tier_name, self.tier_emoji, count, issue_type
            );
        }
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.tier_name, self.tier_emoji, message);
    }
}

// Pipeline-level logging functions
pub fn log_pipeline_start(run_id: &str, config: &LinkageConfig) {
    info!("🚀 ===== METER LINKAGE PIPELINE STARTING =====");
    info!("📅 Pipeline Run ID: {}", run_id);
    info!("⚙️  Configuration:");
    info!("   • Scope key: {:?}", config.grouping_key);
    info!(
        "   • Cutoffs: serial {}, account {}, name {}",
        config.serial.cutoff, config.account.cutoff, config.name.cutoff
    );
    info!(
        "   • Parallel scoring: {}",
        if config.parallel { "enabled" } else { "disabled" }
    );
    info!("🎯 Tiers: Serial 🔢 → Account 🧾 → Name 👤");
    info!("================================================");
}

pub fn log_pipeline_phase(phase: &str, details: Option<&str>) {
    match details {
        Some(details) => info!("🔄 Pipeline Phase: {} - {}", phase, details),
        None => info!("🔄 Pipeline Phase: {}", phase),
    }
}

pub fn log_normalization(stats: &NormalizationStats) {
    info!(
        "🧹 Normalized {} survey rows and {} transactions ({} raw, {} incomplete dropped, {} duplicates removed)",
        stats.survey_rows,
        stats.transaction_rows,
        stats.transaction_rows_raw,
        stats.transaction_rows_dropped_incomplete,
        stats.transaction_rows_duplicate
    );
    if stats.key_corrections_applied > 0 {
        info!("🔧 Applied {} grouping-key corrections", stats.key_corrections_applied);
    }
    if stats.out_of_universe > 0 {
        info!(
            "🌍 {} transactions sit on transformers the survey never visited",
            stats.out_of_universe
        );
    }
}

pub fn log_pipeline_completion(duration: std::time::Duration, summary: &LinkageSummary) {
    info!("🎉 ===== METER LINKAGE PIPELINE COMPLETED =====");
    info!("📅 Pipeline Run ID: {}", summary.run_id);
    info!("⏱️  Total Duration: {:.2?}", duration);
    info!("🎯 Linked households: {}", summary.resolution.results);
    info!("");
    info!("📈 Tier Breakdown:");
    for stats in &summary.tiers {
        let (name, emoji) = stats.tier.log_label();
        info!(
            "  {} {}: {} matches ({} confident), avg score: {:.1}, {} ms",
            emoji, name, stats.matches_accepted, stats.confident_matches, stats.avg_score, stats.duration_ms
        );
    }
    info!("");
    info!("📊 Summary:");
    info!("  • Serial score 100: {:.1}%", summary.share_serial_100 * 100.0);
    info!("  • Serial score 90-99: {:.1}%", summary.share_serial_90_to_100 * 100.0);
    info!("  • Highest score ≥ 90: {:.1}%", summary.share_highest_at_least_90 * 100.0);
    info!(
        "  • Good matches: {} of {} linked rows",
        summary.resolution.good_matches, summary.resolution.linked_rows
    );
    if summary.resolution.ambiguous_survey_rows > 0 || summary.resolution.ambiguous_entities > 0 {
        warn!(
            "  • Ambiguous ties kept: {} households with several customers, {} customers with several households",
            summary.resolution.ambiguous_survey_rows, summary.resolution.ambiguous_entities
        );
    }
    for (lmcp, share) in &summary.lmcp_shares {
        info!("  • LMCP {}: {:.1}%", lmcp, share * 100.0);
    }
    info!("===============================================");
}
