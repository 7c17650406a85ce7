pub mod export;
pub mod loader;

pub use export::{write_results, write_results_file, write_summary_json};
pub use loader::{read_survey, read_survey_file, read_transaction_files, read_transactions};
