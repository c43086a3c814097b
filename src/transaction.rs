//! Transaction model and record parsing.
//!
//! A [`Transaction`] can only be produced by [`Transaction::parse`] (or its
//! explicit-year variant), so every live value has already been validated.

use crate::error::ParseError;
use crate::money::Money;
use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Direction of a monetary movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// Inbound funds.
    Credit,

    /// Outbound funds.
    Debit,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Credit => f.write_str("credit"),
            TxKind::Debit => f.write_str("debit"),
        }
    }
}

/// A validated transaction.
///
/// # Invariants
///
/// - `amount` is never negative; the direction lives only in `kind`
/// - ids are not required to be unique
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    id: i64,
    date: NaiveDate,
    amount: Money,
    kind: TxKind,
}

impl Transaction {
    /// Parses the three raw fields of a record, substituting the current
    /// local year for dates that omit one.
    pub fn parse(id: &str, date: &str, amount: &str) -> Result<Self, ParseError> {
        Self::parse_in_year(id, date, amount, Local::now().year())
    }

    /// Parses the three raw fields of a record, substituting `year` for
    /// dates that omit one.
    pub fn parse_in_year(
        id: &str,
        date: &str,
        amount: &str,
        year: i32,
    ) -> Result<Self, ParseError> {
        let id = i64::from_str(id).map_err(|_| ParseError::InvalidId)?;
        let date = parse_date(date, year)?;
        let (amount, kind) = parse_amount(amount)?;

        Ok(Transaction {
            id,
            date,
            amount,
            kind,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Non-negative magnitude.
    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn is_credit(&self) -> bool {
        self.kind == TxKind::Credit
    }

    pub fn is_debit(&self) -> bool {
        self.kind == TxKind::Debit
    }

    /// Amount with the direction applied: credits positive, debits negative.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TxKind::Credit => self.amount,
            TxKind::Debit => -self.amount,
        }
    }

    /// Month grouping label, e.g. `"July 2024"`.
    pub fn month_label(&self) -> String {
        self.date.format("%B %Y").to_string()
    }
}

/// Tries each accepted date layout in turn; the first successful parse wins.
///
/// The order matters for short inputs: `7/2/24` must be read as a two-digit
/// year before the four-digit layout gets a chance to call it year 24.
fn parse_date(text: &str, year: i32) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(&format!("{year}/{text}"), "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%y"))
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| ParseError::InvalidDate)
}

/// Splits a signed amount such as `+60.5` into its magnitude and direction.
fn parse_amount(text: &str) -> Result<(Money, TxKind), ParseError> {
    let text = text.trim();

    let (kind, rest) = if let Some(rest) = text.strip_prefix('+') {
        (TxKind::Credit, rest)
    } else if let Some(rest) = text.strip_prefix('-') {
        (TxKind::Debit, rest)
    } else {
        return Err(ParseError::InvalidAmount);
    };

    let amount = Money::parse_exact(rest).ok_or(ParseError::InvalidAmount)?;
    Ok((amount, kind))
}
