//! CSV ingestion of transaction files.
//!
//! Records are read one at a time. Rows that cannot be parsed are logged at
//! warn level and skipped; only whole-source problems (unreadable input, bad
//! header) or cancellation end ingestion early.

use crate::cancel::CancelToken;
use crate::error::{ProcessError, Result};
use crate::transaction::Transaction;
use chrono::{Datelike, Local};
use csv::{ErrorKind, ReaderBuilder, StringRecord, Trim};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Column labels every transaction file must start with.
pub const EXPECTED_HEADER: [&str; 3] = ["Id", "Date", "Transaction"];

/// Reads transaction files into validated [`Transaction`]s.
#[derive(Debug, Clone)]
pub struct CsvIngestor {
    /// Year assumed for dates written without one.
    default_year: i32,
}

impl CsvIngestor {
    /// Creates an ingestor that fills missing years with the current year.
    pub fn new() -> Self {
        CsvIngestor {
            default_year: Local::now().year(),
        }
    }

    /// Overrides the year assumed for `M/D` dates.
    pub fn with_default_year(mut self, year: i32) -> Self {
        self.default_year = year;
        self
    }

    pub fn default_year(&self) -> i32 {
        self.default_year
    }

    /// Opens and ingests the file at `path`.
    pub fn ingest_path(&self, path: &Path, cancel: &CancelToken) -> Result<Vec<Transaction>> {
        debug!("Opening {} for ingestion", path.display());
        let file = File::open(path)?;
        self.ingest_reader(BufReader::new(file), cancel)
    }

    /// Ingests transactions from any reader.
    ///
    /// The first record must be exactly [`EXPECTED_HEADER`]. Line numbers in
    /// diagnostics are the 1-based physical lines of the source.
    pub fn ingest_reader<R: Read>(
        &self,
        reader: R,
        cancel: &CancelToken,
    ) -> Result<Vec<Transaction>> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut records = csv_reader.records();

        let header = match records.next() {
            Some(result) => result?,
            None => StringRecord::new(),
        };
        validate_header(&header)?;
        debug!("Header accepted: {:?}", header);

        let mut transactions = Vec::new();
        let mut skipped = 0usize;

        for (row_idx, result) in records.enumerate() {
            if cancel.is_cancelled() {
                debug!("Ingestion cancelled after {} accepted rows", transactions.len());
                return Err(ProcessError::Cancelled);
            }

            let line = line_of(&result, row_idx as u64 + 2);

            let record = match result {
                Ok(record) => record,
                Err(e) if matches!(e.kind(), ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => {
                    warn!("Line {}: skipping unreadable record: {}", line, e);
                    skipped += 1;
                    continue;
                }
            };

            if record.len() != EXPECTED_HEADER.len() {
                warn!(
                    "Line {}: skipping record with {} fields, expected {}",
                    line,
                    record.len(),
                    EXPECTED_HEADER.len()
                );
                skipped += 1;
                continue;
            }

            match Transaction::parse_in_year(&record[0], &record[1], &record[2], self.default_year)
            {
                Ok(tx) => transactions.push(tx),
                Err(e) => {
                    warn!("Line {}: skipping {:?}: {}", line, record, e);
                    skipped += 1;
                }
            }
        }

        info!(
            "Ingestion complete: {} transactions accepted, {} records skipped",
            transactions.len(),
            skipped
        );

        Ok(transactions)
    }
}

impl Default for CsvIngestor {
    fn default() -> Self {
        Self::new()
    }
}

/// Source line a record (or the error reading it) started on, or `fallback`
/// when the reader does not know.
fn line_of(result: &csv::Result<StringRecord>, fallback: u64) -> u64 {
    let position = match result {
        Ok(record) => record.position(),
        Err(e) => e.position(),
    };
    position.map(|p| p.line()).unwrap_or(fallback)
}

fn validate_header(header: &StringRecord) -> Result<()> {
    if header.iter().eq(EXPECTED_HEADER.iter().copied()) {
        return Ok(());
    }

    Err(ProcessError::InvalidFormat {
        expected: EXPECTED_HEADER.iter().map(|s| s.to_string()).collect(),
        found: header.iter().map(str::to_string).collect(),
    })
}
