use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CityWatchError {
    #[error("Search error: {0}")]
    Search(String),

    #[error("Geocoding error: {0}")]
    Geocoding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{stage} timed out after {secs}s", secs = .after.as_secs())]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
