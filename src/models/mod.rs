pub mod matching;
pub mod records;
pub mod stats_models;

pub use matching::{LinkedRow, MatchCandidate, MatchResult, Score, Tier, TierMatch};
pub use records::{
    GroupKey, RawSurveyRecord, RawTransactionRecord, SurveyRecord, SurveyTable, TransactionRecord,
    TransactionTable, HOUSEHOLD_MEMBER_SLOTS,
};
