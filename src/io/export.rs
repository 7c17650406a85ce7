// src/io/export.rs
use csv::{Writer, WriterBuilder};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::LinkageError;
use crate::matching::manager::LinkageRun;
use crate::models::stats_models::LinkageSummary;
use crate::models::{MatchResult, SurveyRecord, TierMatch, TransactionRecord};

const LIST_SEPARATOR: &str = ";";

const HEADERS: [&str; 31] = [
    "survey_index",
    "county",
    "transno",
    "transname",
    "household_code",
    "treatment",
    "respondent_name",
    "head_of_household_name",
    "meter_number",
    "account_number",
    "lmcp",
    "transaction_index",
    "tx_county",
    "tx_number",
    "tx_transno",
    "full_name",
    "serial_num",
    "account_no",
    "offered_service",
    "closest_serial_index",
    "closest_serial_score",
    "closest_account_index",
    "closest_account_score",
    "closest_name_index",
    "closest_name_score",
    "winning_tier",
    "highest_score",
    "good_match",
    "name_match_score",
    "serial_list",
    "account_list",
];

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn tier_cells(m: Option<TierMatch>) -> [String; 2] {
    match m {
        Some(m) => [m.target_index.to_string(), m.score.to_string()],
        None => [String::new(), String::new()],
    }
}

fn write_result<W: Write>(
    w: &mut Writer<W>,
    result: &MatchResult,
    survey: &SurveyRecord,
    tx: &TransactionRecord,
) -> Result<(), LinkageError> {
    let mut row: Vec<String> = Vec::with_capacity(HEADERS.len());
    row.push(result.target_index.to_string());
    row.push(survey.county.clone());
    row.push(survey.transformer_id.clone());
    row.push(opt(&survey.transformer_name));
    row.push(opt(&survey.household_code));
    row.push(survey.treatment.map(|t| t.to_string()).unwrap_or_default());
    row.push(opt(&survey.respondent_name));
    row.push(opt(&survey.head_of_household_name));
    row.push(opt(&survey.meter_number));
    row.push(opt(&survey.account_number));
    row.push(opt(&survey.lmcp));

    row.push(result.source_index.to_string());
    row.push(tx.county.clone());
    row.push(opt(&tx.tx_number));
    row.push(tx.transformer_id.clone());
    row.push(tx.full_name.clone());
    row.push(tx.serial_number.clone());
    row.push(tx.account_number.clone());
    row.push(tx.offered_service.clone());

    row.extend(tier_cells(result.closest_serial));
    row.extend(tier_cells(result.closest_account));
    row.extend(tier_cells(result.closest_name));
    row.push(result.winning_tier.to_string());
    row.push(result.highest_score.to_string());
    row.push(result.good_match.to_string());
    row.push(result.name_match_score.to_string());
    row.push(result.serial_list.join(LIST_SEPARATOR));
    row.push(result.account_list.join(LIST_SEPARATOR));

    w.write_record(&row)?;
    Ok(())
}

/// Write one CSV row per result, survey columns first.
pub fn write_results<W: Write>(writer: W, run: &LinkageRun) -> Result<(), LinkageError> {
    let mut w = WriterBuilder::new().from_writer(writer);
    w.write_record(HEADERS)?;
    for result in &run.results {
        let survey = &run.survey.rows[result.target_index];
        let tx = &run.transactions.rows[result.source_index];
        write_result(&mut w, result, survey, tx)?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_results_file(path: &Path, run: &LinkageRun) -> Result<(), LinkageError> {
    let file = File::create(path)?;
    let buf_writer = BufWriter::with_capacity(512 * 1024, file);
    write_results(buf_writer, run)?;
    info!("💾 Wrote {} linked rows to {}", run.results.len(), path.display());
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &LinkageSummary) -> Result<(), LinkageError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    info!("💾 Wrote run summary to {}", path.display());
    Ok(())
}
