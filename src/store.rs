//! Persistence of accepted transactions.
//!
//! Every batch is attributed to a single default account, created on first
//! use. Both stores save a batch as one unit: either every row is stored or
//! none is.

use crate::error::StoreError;
use crate::money::Money;
use crate::transaction::{Transaction, TxKind};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Account that receives every saved batch.
pub const DEFAULT_ACCOUNT_EMAIL: &str = "default@statement-mailer.local";

const TMP_SUFFIX: &str = "tmp";

/// Storage backend for processed transactions.
pub trait DataStore: Send + Sync {
    /// Saves the whole batch atomically.
    fn save_transactions(&self, batch: &[Transaction]) -> Result<(), StoreError>;

    /// Signed sum of stored rows for the account; zero for unknown accounts.
    fn account_balance(&self, account_id: &str) -> Result<Money, StoreError>;

    /// Returns the id of the account for `email`, creating it if needed.
    fn save_account(&self, email: &str) -> Result<String, StoreError>;
}

/// A persisted transaction row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: i64,
    pub date: NaiveDate,
    /// Credits positive, debits negative.
    pub amount: Money,
    pub kind: String,
}

impl From<&Transaction> for StoredRow {
    fn from(tx: &Transaction) -> Self {
        StoredRow {
            id: tx.id(),
            date: tx.date(),
            amount: tx.signed_amount(),
            kind: tx.kind().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreState {
    /// Account email → account id.
    accounts: BTreeMap<String, String>,
    /// Account id → rows.
    rows: BTreeMap<String, Vec<StoredRow>>,
}

impl StoreState {
    fn ensure_account(&mut self, email: &str) -> String {
        let next_id = format!("acct-{}", self.accounts.len() + 1);
        self.accounts
            .entry(email.to_string())
            .or_insert(next_id)
            .clone()
    }

    /// Appends `batch` to `account_id`, or leaves the state untouched if any
    /// row would duplicate an id already stored (or repeated in the batch).
    fn append_batch(&mut self, account_id: &str, batch: &[Transaction]) -> Result<(), StoreError> {
        let existing = self.rows.entry(account_id.to_string()).or_default();
        let mut seen: HashSet<i64> = existing.iter().map(|r| r.id).collect();

        for tx in batch {
            if !seen.insert(tx.id()) {
                return Err(StoreError::Duplicate {
                    tx_id: tx.id(),
                    account_id: account_id.to_string(),
                });
            }
        }

        existing.extend(batch.iter().map(StoredRow::from));
        Ok(())
    }

    fn balance(&self, account_id: &str) -> Money {
        self.rows
            .get(account_id)
            .map(|rows| rows.iter().map(|r| r.amount).sum())
            .unwrap_or(Money::ZERO)
    }
}

/// In-process store, mainly useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows stored for `account_id`, in insertion order.
    pub fn rows(&self, account_id: &str) -> Vec<StoredRow> {
        self.state
            .lock()
            .map(|s| s.rows.get(account_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

impl DataStore for MemoryStore {
    fn save_transactions(&self, batch: &[Transaction]) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let account_id = state.ensure_account(DEFAULT_ACCOUNT_EMAIL);

        // Work on a copy so a rejected batch leaves nothing behind.
        let mut next = state.clone();
        next.append_batch(&account_id, batch)?;
        *state = next;

        debug!("Stored {} transactions for account {}", batch.len(), account_id);
        Ok(())
    }

    fn account_balance(&self, account_id: &str) -> Result<Money, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.balance(account_id))
    }

    fn save_account(&self, email: &str) -> Result<String, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(state.ensure_account(email))
    }
}

/// Store backed by a single pretty-printed JSON document.
///
/// Each save writes the full document to a sibling temp file and renames it
/// over the previous file, so readers see either the old or the new state.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens (or prepares to create) the store at `path`, validating any
    /// existing content.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let store = JsonFileStore {
            path,
            lock: Mutex::new(()),
        };
        store.read_state()?;
        info!("Using JSON store at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> Result<StoreState, StoreError> {
        if !self.path.exists() {
            return Ok(StoreState::default());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn write_state(&self, state: &StoreState) -> Result<(), StoreError> {
        let data = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension(TMP_SUFFIX);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(data.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DataStore for JsonFileStore {
    fn save_transactions(&self, batch: &[Transaction]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut state = self.read_state()?;
        let account_id = state.ensure_account(DEFAULT_ACCOUNT_EMAIL);
        state.append_batch(&account_id, batch)?;
        self.write_state(&state)?;

        debug!(
            "Stored {} transactions for account {} in {}",
            batch.len(),
            account_id,
            self.path.display()
        );
        Ok(())
    }

    fn account_balance(&self, account_id: &str) -> Result<Money, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read_state()?.balance(account_id))
    }

    fn save_account(&self, email: &str) -> Result<String, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut state = self.read_state()?;
        let before = state.accounts.len();
        let id = state.ensure_account(email);
        if state.accounts.len() != before {
            self.write_state(&state)?;
        }
        Ok(id)
    }
}
