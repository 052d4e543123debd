//! Error types for the sync service

use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sync service errors
#[derive(Error, Debug)]
pub enum Error {
    /// Reconciliation engine error (schema, signing, config)
    #[error(transparent)]
    Core(#[from] sync_core::Error),

    /// Relational fetch failure
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Ledger does not expose the configured table
    #[error("Table [{table}] not exist in target [{address}]")]
    UnknownTable {
        /// Configured ledger table
        table: String,
        /// Ledger address
        address: String,
    },

    /// Ledger transport failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Ledger returned an error envelope for a read
    #[error("RPC error [{code}]: {message}")]
    Rpc {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Ledger rejected a transaction
    #[error("error when deploy transaction: [{code}]{message}")]
    Transaction {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::DataAccess(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Connection(err.to_string())
    }
}
