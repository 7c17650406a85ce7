// src/utils/env.rs

use log::{debug, info};

/// Loads a `.env` file from the working directory (or a parent) if one exists.
///
/// Variables already present in the process environment win over the file.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment overrides from {}", path.display()),
        Err(e) => debug!("No .env file loaded ({}); using process environment only", e),
    }
}

