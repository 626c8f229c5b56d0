use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No conversation found to summarize")]
    EmptyConversation,

    #[error("Provider error (HTTP {status}): {body}")]
    Provider { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a provider failure that carried no usable body.
    pub fn empty_response(status: u16, provider: &str) -> Self {
        AppError::Provider {
            status,
            body: format!("{} returned empty response", provider),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
