use thiserror::Error;

use crate::protocol::CommandError;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CommandError),

    #[error("Macro error: {0}")]
    Macro(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;
