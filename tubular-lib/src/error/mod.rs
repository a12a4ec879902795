//! Error types

mod api;
mod auth;
mod config;
mod storage;

pub use api::*;
pub use auth::*;
pub use config::*;
pub use storage::*;

/// Top-level error returned by fallible library operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport or HTTP failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Authentication failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Misconfiguration of a grid, form or row.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Local state store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CSV export failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for configuration errors, which are never recoverable.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
