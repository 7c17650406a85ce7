// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("malformed key correction entry '{0}' (expected 'from=to')")]
    MalformedCorrection(String),
}

#[derive(Debug, Error)]
pub enum LinkageError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("missing required column '{column}' in {table}")]
    MissingColumn { table: &'static str, column: String },
    #[error("failed to read {table} table: {source}")]
    Read {
        table: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("failed to write output: {0}")]
    Write(#[from] csv::Error),
    #[error("failed to start the scoring thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to write summary: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
