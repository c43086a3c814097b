//! # Statement Mailer
//!
//! Turns delimited transaction files into monthly account summaries and
//! mails them to a recipient.
//!
//! ## Design Principles
//!
//! - **Exact arithmetic**: amounts are `rust_decimal` values, never floats
//! - **Validated records**: a [`Transaction`] only exists after parsing succeeds
//! - **Tolerant ingestion**: bad rows are logged and skipped, bad files are not
//! - **Delivery first**: storage failures are logged, delivery failures are errors
//!
//! ## Example
//!
//! ```no_run
//! use statement_mailer::{CancelToken, CsvIngestor, OutboxMailer, Processor};
//! use std::path::Path;
//!
//! let processor = Processor::new(
//!     CsvIngestor::new(),
//!     Box::new(OutboxMailer::new("outbox", "noreply@example.com")),
//! );
//! processor
//!     .process_one(Path::new("txns.csv"), "user@example.com", &CancelToken::new())
//!     .unwrap();
//! ```

pub mod cancel;
pub mod config;
pub mod email;
pub mod error;
pub mod ingest;
pub mod money;
pub mod processor;
pub mod store;
pub mod summary;
pub mod transaction;
pub mod watcher;

pub use cancel::CancelToken;
pub use config::{Config, SmtpConfig};
pub use email::{render_summary, EmailService, OutboxMailer, SmtpMailer};
pub use error::{ConfigError, EmailError, ParseError, ProcessError, Result, StoreError};
pub use ingest::{CsvIngestor, EXPECTED_HEADER};
pub use money::Money;
pub use processor::{ProcessReport, Processor};
pub use store::{DataStore, JsonFileStore, MemoryStore, DEFAULT_ACCOUNT_EMAIL};
pub use summary::{MonthKey, Summary};
pub use transaction::{Transaction, TxKind};
pub use watcher::{PollingWatcher, Watcher};
