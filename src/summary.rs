//! Per-month aggregation of transactions.
//!
//! A [`Summary`] is a pure fold over a list of transactions. Only sums and
//! counts are accumulated, so input order never changes the result.

use crate::error::{ProcessError, Result};
use crate::money::Money;
use crate::transaction::{Transaction, TxKind};
use chrono::{Datelike, Month};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Calendar month used as the grouping key.
///
/// Ordered chronologically; displays as `"July 2024"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn of(tx: &Transaction) -> Self {
        let date = tx.date();
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Calendar month, `1..=12`.
    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let month = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or(fmt::Error)?;
        write!(f, "{} {:04}", month.name(), self.year)
    }
}

impl Serialize for MonthKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Aggregate statistics for one processed file.
///
/// # Invariants
///
/// - `total_balance == sum(credits) - sum(debits)`, exactly
/// - averages are zero when their side has no transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    total_balance: Money,
    monthly_transactions: BTreeMap<MonthKey, usize>,
    monthly_credits: BTreeMap<MonthKey, Money>,
    monthly_debits: BTreeMap<MonthKey, Money>,
    average_credit: Money,
    average_debit: Money,
}

impl Summary {
    /// Folds `transactions` into a summary in a single pass.
    ///
    /// # Errors
    ///
    /// [`ProcessError::AmountOverflow`] if any running sum leaves the range a
    /// `Decimal` can represent.
    pub fn aggregate<'a, I>(transactions: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut total_balance = Money::ZERO;
        let mut monthly_transactions = BTreeMap::new();
        let mut monthly_credits = BTreeMap::new();
        let mut monthly_debits = BTreeMap::new();

        let (mut credit_sum, mut credit_count) = (Money::ZERO, 0usize);
        let (mut debit_sum, mut debit_count) = (Money::ZERO, 0usize);

        for tx in transactions {
            let key = MonthKey::of(tx);
            let amount = tx.amount();

            *monthly_transactions.entry(key).or_insert(0) += 1;

            match tx.kind() {
                TxKind::Credit => {
                    total_balance = checked(total_balance.checked_add(amount))?;
                    accumulate(monthly_credits.entry(key).or_insert(Money::ZERO), amount)?;
                    accumulate(&mut credit_sum, amount)?;
                    credit_count += 1;
                }
                TxKind::Debit => {
                    total_balance = checked(total_balance.checked_sub(amount))?;
                    accumulate(monthly_debits.entry(key).or_insert(Money::ZERO), amount)?;
                    accumulate(&mut debit_sum, amount)?;
                    debit_count += 1;
                }
            }
        }

        Ok(Summary {
            total_balance,
            monthly_transactions,
            monthly_credits,
            monthly_debits,
            average_credit: credit_sum.div_count(credit_count),
            average_debit: debit_sum.div_count(debit_count),
        })
    }

    pub fn total_balance(&self) -> Money {
        self.total_balance
    }

    pub fn average_credit(&self) -> Money {
        self.average_credit
    }

    pub fn average_debit(&self) -> Money {
        self.average_debit
    }

    /// Transaction counts per month, in calendar order.
    pub fn monthly_transactions(&self) -> &BTreeMap<MonthKey, usize> {
        &self.monthly_transactions
    }

    /// Credited magnitude per month. Months without credits are absent.
    pub fn monthly_credits(&self) -> &BTreeMap<MonthKey, Money> {
        &self.monthly_credits
    }

    /// Debited magnitude per month. Months without debits are absent.
    pub fn monthly_debits(&self) -> &BTreeMap<MonthKey, Money> {
        &self.monthly_debits
    }

    /// Number of transactions in the month labelled `label`, e.g. `"July 2024"`.
    pub fn count_for(&self, label: &str) -> usize {
        lookup(&self.monthly_transactions, label).unwrap_or(0)
    }

    pub fn credits_for(&self, label: &str) -> Money {
        lookup(&self.monthly_credits, label).unwrap_or(Money::ZERO)
    }

    pub fn debits_for(&self, label: &str) -> Money {
        lookup(&self.monthly_debits, label).unwrap_or(Money::ZERO)
    }

    pub fn transaction_count(&self) -> usize {
        self.monthly_transactions.values().sum()
    }

    pub fn has_transactions(&self) -> bool {
        self.transaction_count() > 0
    }
}

fn checked(sum: Option<Money>) -> Result<Money> {
    sum.ok_or(ProcessError::AmountOverflow)
}

fn accumulate(slot: &mut Money, amount: Money) -> Result<()> {
    *slot = checked(slot.checked_add(amount))?;
    Ok(())
}

fn lookup<V: Copy>(map: &BTreeMap<MonthKey, V>, label: &str) -> Option<V> {
    map.iter()
        .find(|(key, _)| key.to_string() == label)
        .map(|(_, value)| *value)
}
