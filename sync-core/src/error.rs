//! Error types for the reconciliation engine

use thiserror::Error;

/// Result type for sync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sync-core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Snapshot violates the table shape (missing primary key, ragged rows, duplicate keys)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Two tables being diffed have incompatible key or header sets
    #[error("Schema mismatch: base [{}], other [{}]", .base_headers.join(","), .other_headers.join(","))]
    SchemaMismatch {
        /// Headers of the base (ledger) table
        base_headers: Vec<String>,
        /// Headers of the comparative (source) table
        other_headers: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key material or signing failure
    #[error("Signing error: {0}")]
    Signing(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(format!("Failed to parse settings: {}", err))
    }
}
