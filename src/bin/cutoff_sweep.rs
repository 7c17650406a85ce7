// src/bin/cutoff_sweep.rs
//
// Re-runs matching and conflict resolution over a range of cutoffs for one tier and reports
// how much each setting links. The other tiers keep their configured cutoffs.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use linkage_lib::io::{read_survey_file, read_transaction_files};
use linkage_lib::matching::manager::{link_tables, prepare_tables};
use linkage_lib::models::{Score, Tier};
use linkage_lib::utils::env::load_env;
use linkage_lib::utils::linkage_config::LinkageConfig;

#[derive(Parser)]
#[command(author, version, about = "Sweep one tier's cutoff and report linkage counts", long_about = None)]
struct SweepArgs {
    #[arg(long)]
    survey: PathBuf,

    #[arg(long)]
    postpaid: PathBuf,

    #[arg(long)]
    prepaid: PathBuf,

    /// Tier to sweep: serial, account or name
    #[arg(long, default_value = "name")]
    tier: Tier,

    #[arg(long, default_value_t = 50)]
    from: Score,

    #[arg(long, default_value_t = 100)]
    to: Score,

    #[arg(long, default_value_t = 5)]
    step: Score,

    /// Write the sweep table as JSON
    #[arg(long)]
    output_json: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct SweepPoint {
    cutoff: Score,
    tier_matches: usize,
    linked_rows: usize,
    good_matches: usize,
    results: usize,
    ambiguous_survey_rows: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = SweepArgs::parse();

    if args.step == 0 || args.from > args.to || args.to > 100 {
        bail!(
            "Invalid sweep range {}..={} step {} (need 0 < step and from <= to <= 100)",
            args.from,
            args.to,
            args.step
        );
    }

    let base = LinkageConfig::from_env();
    base.validate().context("Invalid linkage configuration")?;

    let raw_survey = read_survey_file(&args.survey).context("Failed to read survey")?;
    let raw_transactions = read_transaction_files(&[
        ("postpaid", args.postpaid.as_path()),
        ("prepaid", args.prepaid.as_path()),
    ])
    .context("Failed to read transaction extracts")?;
    let prepared = prepare_tables(&raw_survey, &raw_transactions, &base);

    let cutoffs: Vec<Score> = (args.from..=args.to).step_by(args.step as usize).collect();
    info!(
        "Sweeping {} cutoff over {:?} ({} transactions, {} survey rows)",
        args.tier,
        cutoffs,
        prepared.transactions.len(),
        prepared.survey.len()
    );

    let pb = ProgressBar::new(cutoffs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );

    let mut points = Vec::with_capacity(cutoffs.len());
    for cutoff in cutoffs {
        pb.set_message(format!("cutoff {}", cutoff));
        let mut config = base.clone();
        match args.tier {
            Tier::Serial => config.serial.cutoff = cutoff,
            Tier::Account => config.account.cutoff = cutoff,
            Tier::Name => config.name.cutoff = cutoff,
        }
        let (tiered, resolution) = link_tables(&prepared.survey, &prepared.transactions, &config, None)
            .with_context(|| format!("Linkage failed at cutoff {}", cutoff))?;
        points.push(SweepPoint {
            cutoff,
            tier_matches: tiered
                .tier(args.tier)
                .map(|t| t.stats.matches_accepted)
                .unwrap_or(0),
            linked_rows: resolution.stats.linked_rows,
            good_matches: resolution.stats.good_matches,
            results: resolution.stats.results,
            ambiguous_survey_rows: resolution.stats.ambiguous_survey_rows,
        });
        pb.inc(1);
    }
    pb.finish_with_message("sweep complete");

    println!();
    println!(
        "{:>7} {:>13} {:>12} {:>13} {:>8} {:>10}",
        "cutoff", "tier_matches", "linked_rows", "good_matches", "results", "ambiguous"
    );
    for p in &points {
        println!(
            "{:>7} {:>13} {:>12} {:>13} {:>8} {:>10}",
            p.cutoff, p.tier_matches, p.linked_rows, p.good_matches, p.results, p.ambiguous_survey_rows
        );
    }

    if let Some(path) = &args.output_json {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &points).context("Failed to write sweep JSON")?;
        info!("Wrote sweep table to {}", path.display());
    }
    Ok(())
}
