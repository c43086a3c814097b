//! Error types for the statement mailer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for processing operations
pub type Result<T> = std::result::Result<T, ProcessError>;

/// Field-level failures raised while parsing a single record.
///
/// These never escape ingestion: the offending line is logged and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid transaction ID")]
    InvalidId,

    #[error("invalid transaction date")]
    InvalidDate,

    #[error("invalid transaction amount")]
    InvalidAmount,
}

/// Errors that can occur while ingesting and processing a transaction file.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Failed to open or read the input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error that prevents reading the source at all
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Header row missing or not matching the expected columns
    #[error("invalid file format: expected header {expected:?}, found {found:?}")]
    InvalidFormat {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Source-level failure tied to a specific file
    #[error("processing file {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<ProcessError>,
    },

    /// Accepted amounts add up to more than a `Decimal` can hold
    #[error("transaction amounts overflow the supported range")]
    AmountOverflow,

    /// No transaction survived ingestion
    #[error("no transactions found in file {}", path.display())]
    EmptyFile { path: PathBuf },

    /// The summary could not be delivered
    #[error("sending summary to {recipient}: {source}")]
    EmailDeliveryFailed {
        recipient: String,
        #[source]
        source: EmailError,
    },

    /// The directory watcher could not be started
    #[error("watching directory {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Work was abandoned because cancellation was requested
    #[error("operation cancelled")]
    Cancelled,
}

impl ProcessError {
    /// Returns `true` if this error is (or wraps) a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ProcessError::Cancelled => true,
            ProcessError::File { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Errors raised by a [`DataStore`](crate::store::DataStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transaction {tx_id} already stored for account {account_id}")]
    Duplicate { tx_id: i64, account_id: String },

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors raised by an [`EmailService`](crate::email::EmailService).
#[derive(Error, Debug)]
pub enum EmailError {
    #[error("rendering summary: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("email delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Invalid or incomplete configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration errors: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
