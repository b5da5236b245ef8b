use thiserror::Error;

use crate::browser::BrowserError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Google API error: {0}")]
    GoogleApi(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
