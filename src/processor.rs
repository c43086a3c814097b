//! Orchestration of a processing run.
//!
//! A run ingests one file, aggregates it, persists the accepted rows on a
//! best-effort basis, and mails the rendered summary. Delivery is the part
//! that must succeed; storage problems are only logged.

use crate::cancel::CancelToken;
use crate::email::EmailService;
use crate::error::{ProcessError, Result};
use crate::ingest::CsvIngestor;
use crate::store::DataStore;
use crate::summary::Summary;
use crate::transaction::Transaction;
use crate::watcher::Watcher;
use log::{debug, error, info, warn};
use std::path::Path;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Outcome of a successful [`Processor::process_one`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    /// Transactions that survived ingestion.
    pub accepted: usize,

    /// Whether the batch reached the data store.
    pub persisted: bool,

    pub summary: Summary,
}

/// Runs files through ingestion, aggregation, storage and delivery.
pub struct Processor {
    ingestor: CsvIngestor,
    email: Box<dyn EmailService>,
    store: Option<Box<dyn DataStore>>,
}

impl Processor {
    /// Creates a processor without persistence.
    pub fn new(ingestor: CsvIngestor, email: Box<dyn EmailService>) -> Self {
        Processor {
            ingestor,
            email,
            store: None,
        }
    }

    /// Persists accepted transactions to `store` on every run.
    pub fn with_store(mut self, store: Box<dyn DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Processes a single file and mails its summary to `recipient`.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::File`] if the file cannot be read, has a bad header,
    ///   or its amounts overflow when summed
    /// - [`ProcessError::EmptyFile`] if no row was accepted; nothing is sent
    /// - [`ProcessError::EmailDeliveryFailed`] if rendering or sending fails
    /// - [`ProcessError::Cancelled`] if `cancel` fires during ingestion
    pub fn process_one(
        &self,
        path: &Path,
        recipient: &str,
        cancel: &CancelToken,
    ) -> Result<ProcessReport> {
        info!("Processing {} for {}", path.display(), recipient);

        let transactions = self
            .ingestor
            .ingest_path(path, cancel)
            .map_err(|e| match e {
                ProcessError::Cancelled => ProcessError::Cancelled,
                other => ProcessError::File {
                    path: path.to_path_buf(),
                    source: Box::new(other),
                },
            })?;

        if transactions.is_empty() {
            warn!("No transactions accepted from {}", path.display());
            return Err(ProcessError::EmptyFile {
                path: path.to_path_buf(),
            });
        }

        let summary = Summary::aggregate(&transactions).map_err(|e| ProcessError::File {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        debug!(
            "Summary for {}: balance {}, {} months",
            path.display(),
            summary.total_balance(),
            summary.monthly_transactions().len()
        );

        let persisted = self.persist(&transactions);

        let body = self
            .email
            .render(&summary)
            .and_then(|body| self.email.send(recipient, &body).map(|_| body))
            .map_err(|source| {
                error!("Failed to deliver summary to {}: {}", recipient, source);
                ProcessError::EmailDeliveryFailed {
                    recipient: recipient.to_string(),
                    source,
                }
            })?;
        debug!("Delivered {} byte summary", body.len());

        info!(
            "Processed {}: {} transactions, persisted: {}",
            path.display(),
            transactions.len(),
            persisted
        );

        Ok(ProcessReport {
            accepted: transactions.len(),
            persisted,
            summary,
        })
    }

    /// Saves the batch if a store is configured. Failures are logged and
    /// reported as `false`, never propagated.
    fn persist(&self, transactions: &[Transaction]) -> bool {
        let store = match &self.store {
            Some(store) => store,
            None => {
                debug!("No data store configured, skipping persistence");
                return false;
            }
        };

        match store.save_transactions(transactions) {
            Ok(()) => {
                info!("Saved {} transactions", transactions.len());
                true
            }
            Err(e) => {
                error!("Failed to save transactions, continuing: {}", e);
                false
            }
        }
    }

    /// Processes every file `watcher` reports under `dir` until cancelled.
    ///
    /// Each file is fully processed before the next is taken. On a
    /// multi-threaded runtime the file is processed via
    /// [`tokio::task::block_in_place`] so the blocking I/O does not stall
    /// other tasks. Per-file failures are logged and never end the loop. Returns
    /// [`ProcessError::Cancelled`] when `cancel` fires, or `Ok(())` if the
    /// watcher stops on its own.
    pub async fn watch_and_process(
        &self,
        watcher: &dyn Watcher,
        dir: &Path,
        recipient: &str,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut files = watcher.watch(dir, cancel.clone())?;
        info!("Watching {} for transaction files", dir.display());

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Stopping watch of {}", dir.display());
                    return Err(ProcessError::Cancelled);
                }
                next = files.recv() => {
                    let path = match next {
                        Some(path) => path,
                        None if cancel.is_cancelled() => return Err(ProcessError::Cancelled),
                        None => {
                            info!("Watcher for {} finished", dir.display());
                            return Ok(());
                        }
                    };

                    info!("New file detected: {}", path.display());
                    match run_blocking(|| self.process_one(&path, recipient, cancel)) {
                        Ok(report) => debug!("{} done: {:?}", path.display(), report.accepted),
                        Err(e) if e.is_cancelled() => {
                            info!("Abandoned {} on cancellation", path.display());
                            return Err(ProcessError::Cancelled);
                        }
                        Err(e) => error!("Failed to process {}: {}", path.display(), e),
                    }
                }
            }
        }
    }
}

/// Runs `f` in place, moving other tasks off this worker when the runtime
/// allows it. Current-thread runtimes cannot do that and just run `f`.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
