// src/matching/normalize.rs
// Canonical forms for free text, grouping keys and numeric identifiers.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::models::stats_models::NormalizationStats;
use crate::models::{
    RawSurveyRecord, RawTransactionRecord, SurveyRecord, SurveyTable, TransactionRecord,
    TransactionTable, HOUSEHOLD_MEMBER_SLOTS,
};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Households with a code number below this are in the treatment arm.
const TREATMENT_HOUSEHOLD_LIMIT: u32 = 32;

/// Case-fold, collapse whitespace runs to one space, trim.
pub fn normalize_text(input: &str) -> String {
    WHITESPACE_RUN
        .replace_all(&input.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Like [`normalize_text`] but blank input becomes `None`.
pub fn normalize_optional_text(input: Option<&str>) -> Option<String> {
    input.map(normalize_text).filter(|s| !s.is_empty())
}

/// Grouping keys additionally treat commas as separators.
pub fn normalize_grouping_text(input: &str) -> String {
    normalize_text(&input.replace(',', " "))
}

/// Numeric identifier as typed by an enumerator.
///
/// Blank, `0`, punctuation/whitespace-only, and anything containing letters is missing.
/// Otherwise only the digits are kept.
pub fn normalize_identifier(input: Option<&str>) -> Option<String> {
    let trimmed = input?.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return None;
    }
    if trimmed
        .chars()
        .all(|c| c.is_whitespace() || c.is_ascii_punctuation())
    {
        return None;
    }
    if trimmed.chars().any(char::is_alphabetic) {
        return None;
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits == "0" {
        None
    } else {
        Some(digits)
    }
}

/// 1 when the household code number is below the treatment limit, 0 otherwise.
pub fn household_treatment(code: &str) -> Option<u8> {
    let digits: String = DIGIT_RUN.find_iter(code).map(|m| m.as_str()).collect();
    if digits.is_empty() {
        return None;
    }
    // Too many digits for u32 is still a number past the limit.
    let below_limit = digits
        .parse::<u32>()
        .map_or(false, |number| number < TREATMENT_HOUSEHOLD_LIMIT);
    Some(u8::from(below_limit))
}

/// Replace a known-misspelled transformer id with its survey spelling.
pub fn apply_key_correction(key: &str, corrections: &[(String, String)]) -> Option<String> {
    corrections
        .iter()
        .find(|(from, _)| normalize_grouping_text(from) == key)
        .map(|(_, to)| normalize_grouping_text(to))
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub fn normalize_survey_record(raw: &RawSurveyRecord) -> SurveyRecord {
    let mut members: Vec<Option<String>> = raw
        .hh_members
        .iter()
        .take(HOUSEHOLD_MEMBER_SLOTS)
        .map(|m| normalize_optional_text(m.as_deref()))
        .collect();
    members.resize(HOUSEHOLD_MEMBER_SLOTS, None);

    let household_code = normalize_optional_text(raw.a1_7.as_deref());
    let treatment = household_code.as_deref().and_then(household_treatment);

    SurveyRecord {
        county: raw.county.as_deref().map(normalize_text).unwrap_or_default(),
        transformer_id: raw
            .transno
            .as_deref()
            .map(normalize_grouping_text)
            .unwrap_or_default(),
        transformer_name: normalize_optional_text(raw.transname.as_deref()),
        household_code,
        respondent_name: normalize_optional_text(raw.a3_15.as_deref()),
        head_of_household_name: normalize_optional_text(raw.a3_22.as_deref()),
        household_member_names: members,
        meter_number: normalize_identifier(raw.l1_1.as_deref()),
        account_number: normalize_identifier(raw.l1_2.as_deref()),
        lmcp: normalize_optional_text(raw.lmcp.as_deref()),
        treatment,
    }
}

pub fn normalize_survey(raws: &[RawSurveyRecord], stats: &mut NormalizationStats) -> SurveyTable {
    let rows: Vec<SurveyRecord> = raws.iter().map(normalize_survey_record).collect();

    let malformed = raws
        .iter()
        .zip(&rows)
        .map(|(raw, row)| {
            usize::from(!is_blank(raw.l1_1.as_deref()) && row.meter_number.is_none())
                + usize::from(!is_blank(raw.l1_2.as_deref()) && row.account_number.is_none())
        })
        .sum::<usize>();

    stats.survey_rows = rows.len();
    stats.survey_malformed_identifiers = malformed;
    if malformed > 0 {
        warn!(
            "⚠️  Data quality: {} survey identifier values were malformed and treated as missing",
            malformed
        );
    }
    SurveyTable { rows }
}

fn normalize_transaction_record(raw: &RawTransactionRecord) -> Option<TransactionRecord> {
    let full_name = normalize_optional_text(raw.full_name.as_deref())?;
    let serial_number = normalize_optional_text(raw.serial_num.as_deref())?;
    let account_number = normalize_optional_text(raw.account_no.as_deref())?;
    Some(TransactionRecord {
        county: raw.county.as_deref().map(normalize_text).unwrap_or_default(),
        transformer_id: raw
            .transno
            .as_deref()
            .map(normalize_grouping_text)
            .unwrap_or_default(),
        tx_number: normalize_optional_text(raw.tx_number.as_deref()),
        full_name,
        serial_number,
        account_number,
        offered_service: raw
            .offered_service
            .as_deref()
            .map(normalize_text)
            .unwrap_or_default(),
        in_survey_universe: false,
    })
}

/// Drop exact duplicate rows, normalize, drop incomplete rows, correct known key misspellings, and flag
/// rows whose transformer id does not exist in the survey.
pub fn normalize_transactions(
    raws: &[RawTransactionRecord],
    survey: &SurveyTable,
    corrections: &[(String, String)],
    stats: &mut NormalizationStats,
) -> TransactionTable {
    stats.transaction_rows_raw = raws.len();

    let survey_keys: HashSet<&str> = survey
        .rows
        .iter()
        .map(|r| r.transformer_id.as_str())
        .collect();

    let mut seen: HashSet<&RawTransactionRecord> = HashSet::with_capacity(raws.len());
    let mut rows = Vec::with_capacity(raws.len());

    for raw in raws {
        if !seen.insert(raw) {
            stats.transaction_rows_duplicate += 1;
            continue;
        }
        let Some(mut record) = normalize_transaction_record(raw) else {
            stats.transaction_rows_dropped_incomplete += 1;
            continue;
        };
        if let Some(corrected) = apply_key_correction(&record.transformer_id, corrections) {
            debug!(
                "Correcting transformer id '{}' -> '{}'",
                record.transformer_id, corrected
            );
            record.transformer_id = corrected;
            stats.key_corrections_applied += 1;
        }
        record.in_survey_universe = survey_keys.contains(record.transformer_id.as_str());
        if !record.in_survey_universe {
            stats.out_of_universe += 1;
        }
        rows.push(record);
    }

    stats.transaction_rows = rows.len();
    if stats.transaction_rows_dropped_incomplete > 0 {
        warn!(
            "⚠️  Data quality: {} transaction rows missing name, serial or account number were dropped",
            stats.transaction_rows_dropped_incomplete
        );
    }
    if stats.out_of_universe > 0 {
        warn!(
            "⚠️  {} transaction rows have a transformer id that does not exist in the survey",
            stats.out_of_universe
        );
    }
    TransactionTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_tx(transno: &str, name: &str, serial: &str) -> RawTransactionRecord {
        RawTransactionRecord {
            county: Some("Kilifi".into()),
            tx_number: None,
            transno: Some(transno.into()),
            full_name: Some(name.into()),
            serial_num: Some(serial.into()),
            account_no: Some("2001".into()),
            offered_service: Some("PREPAID".into()),
        }
    }

    fn survey_with_key(key: &str) -> SurveyTable {
        SurveyTable {
            rows: vec![SurveyRecord {
                county: "kilifi".into(),
                transformer_id: key.into(),
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  JOHN   Kamau\t"), "john kamau");
        assert_eq!(normalize_grouping_text(" 41755,Kwini  Market "), "41755 kwini market");
    }

    #[test]
    fn test_normalizers_are_idempotent() {
        let inputs = [
            "",
            "   ",
            "  MARY\tWanjiru  ",
            "12,Kwini,,Market",
            "0",
            "00",
            "0.",
            "1234-5678",
            "__--",
            "AB123",
            " 0712 345 ",
            "Ünïcödé  NAME",
        ];
        for input in inputs {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once);
            let once = normalize_grouping_text(input);
            assert_eq!(normalize_grouping_text(&once), once);
            let once = normalize_identifier(Some(input));
            assert_eq!(normalize_identifier(once.as_deref()), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier(None), None);
        assert_eq!(normalize_identifier(Some("")), None);
        assert_eq!(normalize_identifier(Some("0")), None);
        assert_eq!(normalize_identifier(Some(" - _ ")), None);
        assert_eq!(normalize_identifier(Some("n/a")), None);
        assert_eq!(normalize_identifier(Some("14253A")), None);
        assert_eq!(normalize_identifier(Some(" 0123 4567 ")), Some("01234567".into()));
        assert_eq!(normalize_identifier(Some("3710-221")), Some("3710221".into()));
    }

    #[test]
    fn test_household_treatment() {
        assert_eq!(household_treatment("HH_12"), Some(1));
        assert_eq!(household_treatment("hh_31"), Some(1));
        assert_eq!(household_treatment("HH_32"), Some(0));
        assert_eq!(household_treatment("none"), None);
        assert_eq!(household_treatment("HH_99999999999"), Some(0));
        assert_eq!(household_treatment("HH_000000000000000000007"), Some(1));
    }

    #[test]
    fn test_normalize_survey_record() {
        let raw = RawSurveyRecord {
            county: Some("KILIFI".into()),
            transno: Some("41755, Kwini Market".into()),
            a1_7: Some("HH_40".into()),
            a3_15: Some("  Grace  ACHIENG ".into()),
            hh_members: vec![Some("Peter".into()), Some("   ".into())],
            l1_1: Some("14253A".into()),
            l1_2: Some("0712 345".into()),
            ..Default::default()
        };
        let rec = normalize_survey_record(&raw);
        assert_eq!(rec.county, "kilifi");
        assert_eq!(rec.transformer_id, "41755 kwini market");
        assert_eq!(rec.respondent_name.as_deref(), Some("grace achieng"));
        assert_eq!(rec.household_member_names.len(), HOUSEHOLD_MEMBER_SLOTS);
        assert_eq!(rec.household_member_names[0].as_deref(), Some("peter"));
        assert_eq!(rec.household_member_names[1], None);
        assert_eq!(rec.meter_number, None);
        assert_eq!(rec.account_number.as_deref(), Some("0712345"));
        assert_eq!(rec.treatment, Some(0));
    }

    #[test]
    fn test_malformed_identifiers_are_counted() {
        let raws = vec![RawSurveyRecord {
            l1_1: Some("abc".into()),
            l1_2: Some("".into()),
            ..Default::default()
        }];
        let mut stats = NormalizationStats::default();
        let table = normalize_survey(&raws, &mut stats);
        assert_eq!(table.len(), 1);
        assert_eq!(stats.survey_malformed_identifiers, 1);
    }

    #[test]
    fn test_transactions_dedup_drop_and_correction() {
        let survey = survey_with_key("41755 kwini market");
        let mut incomplete = raw_tx("KWNI MARKET", "Ali", "1");
        incomplete.account_no = None;
        let raws = vec![
            raw_tx("KWNI MARKET", "Ali  Hassan", "5501"),
            raw_tx("kwni market", "ali hassan", "5501"),
            raw_tx("KWNI MARKET", "Ali  Hassan", "5501"),
            raw_tx("Mtwapa", "Zawadi", "7788"),
            incomplete,
        ];
        let mut stats = NormalizationStats::default();
        let table = normalize_transactions(
            &raws,
            &survey,
            &[("kwni market".into(), "41755 kwini market".into())],
            &mut stats,
        );
        // Case variants are distinct extract rows; only the exact repeat is dropped.
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0], table.rows[1]);
        assert_eq!(table.rows[0].transformer_id, "41755 kwini market");
        assert!(table.rows[0].in_survey_universe);
        assert!(!table.rows[2].in_survey_universe);
        assert_eq!(stats.transaction_rows_duplicate, 1);
        assert_eq!(stats.transaction_rows_dropped_incomplete, 1);
        assert_eq!(stats.key_corrections_applied, 2);
        assert_eq!(stats.out_of_universe, 1);
    }
}
