use std::io;
use thiserror::Error;

/// Errors that abort the processing of a single document (or, for `Config`, the whole run).
#[derive(Debug, Error)]
pub enum AdornError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unable to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("no word with id {0}")]
    MissingWord(String),

    #[error("word id out of range: {0}")]
    IdRange(String),
}

impl AdornError {
    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }

    /// Fatal errors must stop a batch before any further document is processed
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Toml(_))
    }
}
