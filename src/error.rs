use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrendError>;

#[derive(Error, Debug)]
pub enum TrendError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Other: {0}")]
    Other(String),
}

impl TrendError {
    pub fn config(msg: impl Into<String>) -> Self {
        TrendError::Config(msg.into())
    }
}
