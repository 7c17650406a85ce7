// src/models/records.rs
// Survey and transaction rows, raw (as loaded) and normalized (as matched).

use serde::Serialize;

pub const HOUSEHOLD_MEMBER_SLOTS: usize = 15;

/// Survey row exactly as read from the survey export. Every field is free text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSurveyRecord {
    pub county: Option<String>,
    pub transno: Option<String>,
    pub transname: Option<String>,
    /// Household code, e.g. `HH_12`.
    pub a1_7: Option<String>,
    /// Respondent name.
    pub a3_15: Option<String>,
    /// Head of household name.
    pub a3_22: Option<String>,
    pub hh_members: Vec<Option<String>>,
    /// Meter number as written down by the enumerator.
    pub l1_1: Option<String>,
    /// Account number as written down by the enumerator.
    pub l1_2: Option<String>,
    pub lmcp: Option<String>,
}

/// Transaction row from either the postpaid or the prepaid extract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawTransactionRecord {
    pub county: Option<String>,
    pub tx_number: Option<String>,
    pub transno: Option<String>,
    pub full_name: Option<String>,
    pub serial_num: Option<String>,
    pub account_no: Option<String>,
    pub offered_service: Option<String>,
}

/// Exact-match scope shared by survey and transaction rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub county: Option<String>,
    pub transformer_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SurveyRecord {
    pub county: String,
    pub transformer_id: String,
    pub transformer_name: Option<String>,
    pub household_code: Option<String>,
    pub respondent_name: Option<String>,
    pub head_of_household_name: Option<String>,
    pub household_member_names: Vec<Option<String>>,
    pub meter_number: Option<String>,
    pub account_number: Option<String>,
    pub lmcp: Option<String>,
    pub treatment: Option<u8>,
}

impl SurveyRecord {
    /// Fields compared against transaction serial and account numbers, in tie-break order.
    pub fn identifier_fields(&self) -> Vec<Option<&str>> {
        vec![self.meter_number.as_deref(), self.account_number.as_deref()]
    }

    /// Respondent, head of household, then each member slot, in tie-break order.
    pub fn name_fields(&self) -> Vec<Option<&str>> {
        let mut names = Vec::with_capacity(2 + self.household_member_names.len());
        names.push(self.respondent_name.as_deref());
        names.push(self.head_of_household_name.as_deref());
        names.extend(self.household_member_names.iter().map(|n| n.as_deref()));
        names
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TransactionRecord {
    pub county: String,
    pub transformer_id: String,
    pub tx_number: Option<String>,
    pub full_name: String,
    pub serial_number: String,
    pub account_number: String,
    pub offered_service: String,
    /// False when the transformer id has no counterpart in the survey.
    pub in_survey_universe: bool,
}

impl TransactionRecord {
    /// Key used to collapse variants of the same real-world customer.
    pub fn canonical_key(&self) -> (&str, &str, &str) {
        (&self.full_name, &self.transformer_id, &self.offered_service)
    }
}

/// Normalized survey rows; a row's position is its target index.
#[derive(Debug, Clone, Default)]
pub struct SurveyTable {
    pub rows: Vec<SurveyRecord>,
}

/// Normalized, deduplicated transaction rows; a row's position is its source index.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    pub rows: Vec<TransactionRecord>,
}

impl SurveyTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TransactionTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
