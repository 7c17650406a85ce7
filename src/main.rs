// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use linkage_lib::io::{read_survey_file, read_transaction_files, write_results_file, write_summary_json};
use linkage_lib::matching::manager::run_linkage_pipeline;
use linkage_lib::utils::env::load_env;
use linkage_lib::utils::get_memory_usage;
use linkage_lib::utils::linkage_config::LinkageConfig;
use linkage_lib::utils::progress_bars::progress_config::{create_main_progress_bar, ProgressConfig};

#[derive(Parser)]
#[command(author, version, about = "Link household survey rows to postpaid/prepaid meter transactions", long_about = None)]
struct Args {
    /// Survey export (comma-separated)
    #[arg(long)]
    survey: PathBuf,

    /// Postpaid transaction extract (`|`-separated)
    #[arg(long)]
    postpaid: PathBuf,

    /// Prepaid transaction extract (`|`-separated)
    #[arg(long)]
    prepaid: PathBuf,

    /// Where to write the linked rows
    #[arg(long)]
    output: PathBuf,

    /// Also write the run summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Score on a single thread
    #[arg(long)]
    sequential: bool,

    /// Override LINKAGE_THREADS
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = Args::parse();
    info!("Starting survey ↔ meter transaction linkage");

    let mut config = LinkageConfig::from_env();
    if args.sequential {
        config.parallel = false;
    }
    if let Some(threads) = args.threads {
        config.threads = threads.max(1);
    }
    config.validate().context("Invalid linkage configuration")?;
    config.log_config();

    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();
    let main_pb = create_main_progress_bar(multi_progress.as_ref(), 3);

    let run_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    // Phase 1: load
    if let Some(pb) = &main_pb {
        pb.set_message("Loading input tables...");
    }
    let raw_survey = read_survey_file(&args.survey)
        .with_context(|| format!("Failed to read survey from {}", args.survey.display()))?;
    let raw_transactions = read_transaction_files(&[
        ("postpaid", args.postpaid.as_path()),
        ("prepaid", args.prepaid.as_path()),
    ])
    .context("Failed to read transaction extracts")?;
    if let Some(pb) = &main_pb {
        pb.inc(1);
    }

    // Phase 2: link
    if let Some(pb) = &main_pb {
        pb.set_message("Linking...");
    }
    let tier_progress = multi_progress
        .as_ref()
        .filter(|_| progress_config.should_show_detailed());
    let run = run_linkage_pipeline(
        &raw_survey,
        &raw_transactions,
        &config,
        &run_id,
        tier_progress,
        progress_config.should_show_memory(),
    )
    .context("Linkage run failed")?;
    if let Some(pb) = &main_pb {
        pb.inc(1);
    }

    // Phase 3: write
    if let Some(pb) = &main_pb {
        pb.set_message("Writing output...");
    }
    write_results_file(&args.output, &run)
        .with_context(|| format!("Failed to write results to {}", args.output.display()))?;
    if let Some(path) = &args.summary_json {
        write_summary_json(path, &run.summary)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }
    if let Some(pb) = &main_pb {
        pb.inc(1);
        pb.finish_with_message(format!("Done: {} linked rows", run.results.len()));
    }

    info!(
        "Linkage run {} finished in {:.2?} (memory: {} MB)",
        run_id,
        start.elapsed(),
        get_memory_usage()
    );
    Ok(())
}
