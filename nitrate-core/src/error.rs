use thiserror::Error;

/// Domain-wide error type for the scan/resolve/link pipeline.
///
/// Every component that can fail funnels its failure into one of these
/// variants; the HTTP layer (`nitrate-server::errors::AppError`) maps them
/// onto status codes, and the worker loop maps them onto the `FAILED`
/// terminal state.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("media file {0} not found")]
    NotFound(i64),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("llm parse error: {0}")]
    LlmParse(String),

    #[error("llm transport error: {0}")]
    LlmTransport(String),

    #[error("metadata provider error: {0}")]
    Provider(String),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("config key {0} is not editable")]
    ConfigBlacklisted(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
