// src/io/loader.rs
// Delimited-text readers for the survey export and the postpaid/prepaid extracts.

use csv::{ReaderBuilder, StringRecord};
use log::info;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::LinkageError;
use crate::models::{RawSurveyRecord, RawTransactionRecord, HOUSEHOLD_MEMBER_SLOTS};

const SURVEY_TABLE: &str = "survey";
const TRANSACTION_DELIMITER: u8 = b'|';

/// Case-insensitive header name → column position.
struct HeaderIndex {
    table: &'static str,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    fn new(table: &'static str, headers: &StringRecord) -> Self {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_lowercase(), i))
            .collect();
        Self { table, positions }
    }

    fn required(&self, column: &str) -> Result<usize, LinkageError> {
        self.optional(column).ok_or_else(|| LinkageError::MissingColumn {
            table: self.table,
            column: column.to_string(),
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.positions.get(&column.to_lowercase()).copied()
    }
}

fn value(record: &StringRecord, position: Option<usize>) -> Option<String> {
    position
        .and_then(|i| record.get(i))
        .map(str::to_string)
}

/// Read the survey export (comma-separated, header row required).
pub fn read_survey<R: Read>(reader: R) -> Result<Vec<RawSurveyRecord>, LinkageError> {
    let read_err = |source| LinkageError::Read {
        table: SURVEY_TABLE,
        source,
    };
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().map_err(read_err)?.clone();
    let index = HeaderIndex::new(SURVEY_TABLE, &headers);

    let county = Some(index.required("county")?);
    let transno = Some(index.required("transno")?);
    let l1_1 = Some(index.required("l1_1")?);
    let l1_2 = Some(index.required("l1_2")?);
    let transname = index.optional("transname");
    let a1_7 = index.optional("a1_7");
    let a3_15 = index.optional("a3_15");
    let a3_22 = index.optional("a3_22");
    let lmcp = index.optional("lmcp");
    let members: Vec<Option<usize>> = (1..=HOUSEHOLD_MEMBER_SLOTS)
        .map(|slot| index.optional(&format!("hh_member{}", slot)))
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(read_err)?;
        rows.push(RawSurveyRecord {
            county: value(&record, county),
            transno: value(&record, transno),
            transname: value(&record, transname),
            a1_7: value(&record, a1_7),
            a3_15: value(&record, a3_15),
            a3_22: value(&record, a3_22),
            hh_members: members.iter().map(|m| value(&record, *m)).collect(),
            l1_1: value(&record, l1_1),
            l1_2: value(&record, l1_2),
            lmcp: value(&record, lmcp),
        });
    }
    Ok(rows)
}

/// Read one `|`-separated transaction extract.
pub fn read_transactions<R: Read>(
    reader: R,
    table: &'static str,
) -> Result<Vec<RawTransactionRecord>, LinkageError> {
    let read_err = |source| LinkageError::Read { table, source };
    let mut rdr = ReaderBuilder::new()
        .delimiter(TRANSACTION_DELIMITER)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers().map_err(read_err)?.clone();
    let index = HeaderIndex::new(table, &headers);

    let county = Some(index.required("COUNTY")?);
    let transno = Some(index.required("TRANSNO")?);
    let full_name = Some(index.required("FULL_NAME")?);
    let serial_num = Some(index.required("SERIAL_NUM")?);
    let account_no = Some(index.required("ACCOUNT_NO")?);
    let offered_service = Some(index.required("OFFERED_SERVICE")?);
    let tx_number = index.optional("TXNUMBER");

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(read_err)?;
        rows.push(RawTransactionRecord {
            county: value(&record, county),
            tx_number: value(&record, tx_number),
            transno: value(&record, transno),
            full_name: value(&record, full_name),
            serial_num: value(&record, serial_num),
            account_no: value(&record, account_no),
            offered_service: value(&record, offered_service),
        });
    }
    Ok(rows)
}

pub fn read_survey_file(path: &Path) -> Result<Vec<RawSurveyRecord>, LinkageError> {
    let rows = read_survey(BufReader::new(File::open(path)?))?;
    info!("📊 Loaded {} survey rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read every extract and append them in the order given.
pub fn read_transaction_files(
    paths: &[(&'static str, &Path)],
) -> Result<Vec<RawTransactionRecord>, LinkageError> {
    let mut all = Vec::new();
    for &(table, path) in paths {
        let rows = read_transactions(BufReader::new(File::open(path)?), table)?;
        info!("📊 Loaded {} {} rows from {}", rows.len(), table, path.display());
        all.extend(rows);
    }
    Ok(all)
}
