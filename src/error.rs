use std::io;

/// Custom error type for build_notifier operations
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Event decoding failed: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("GitHub request failed: {0}")]
    Github(String),

    #[error("Slack delivery failed: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Helper type for Results that use RelayError
pub type Result<T> = std::result::Result<T, RelayError>;
