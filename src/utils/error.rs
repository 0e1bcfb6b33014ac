use thiserror::Error;

use crate::models::Site;

/// Failure of a single source adapter. Always recovered by the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("{site}: fetch failed: {message}")]
    Fetch { site: Site, message: String },

    #[error("{site}: unexpected page: {message}")]
    Render { site: Site, message: String },

    #[error("{site}: timed out after {after_ms}ms")]
    Timeout { site: Site, after_ms: u64 },
}

impl SourceError {
    pub fn fetch(site: Site, message: impl Into<String>) -> Self {
        SourceError::Fetch { site, message: message.into() }
    }

    pub fn render(site: Site, message: impl Into<String>) -> Self {
        SourceError::Render { site, message: message.into() }
    }

    pub fn site(&self) -> Site {
        match self {
            SourceError::Fetch { site, .. }
            | SourceError::Render { site, .. }
            | SourceError::Timeout { site, .. } => *site,
        }
    }

    /// Network failures are worth another attempt; a blocked page or a
    /// deadline is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Fetch { .. })
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("All sources failed for '{keyword}'")]
    AggregateFetchFailure { keyword: String },

    #[error("Search timed out after {after_ms}ms")]
    SearchTimeout { after_ms: u64 },

    #[error("Notifier error: {method}: {message}")]
    Dispatch { method: String, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
