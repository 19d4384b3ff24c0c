/// Core error type for the relay bot.
///
/// Adapter crates should map their specific errors into this type so the core
/// can handle failures consistently (operator-facing message vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule '{0}' already exists")]
    DuplicateRule(String),

    #[error("rule '{0}' not found")]
    RuleNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
