//! Exact monetary amounts.
//!
//! Wraps `rust_decimal` so that balances and averages never pick up the
//! penny-level drift floating point would introduce.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// An exact decimal amount of money.
///
/// Unlike a fixed-scale type, `Money` keeps whatever scale an operation
/// produces, so `85.75 / 3` stays exactly what `rust_decimal` computes.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use statement_mailer::Money;
///
/// let amount = Money::from_str("60.5").unwrap();
/// assert_eq!(amount.to_fixed(2), "60.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// Zero value.
    pub const ZERO: Self = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Money(value)
    }

    /// Returns the underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_sign_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Parses a plain unsigned decimal literal (`digits[.digits]`) without
    /// rounding. Separators, exponents, signs and literals with more digits
    /// than a `Decimal` can hold exactly are all rejected.
    pub fn parse_exact(text: &str) -> Option<Self> {
        let (int, frac) = match text.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (text, None),
        };
        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int) || !frac.map_or(true, all_digits) {
            return None;
        }
        Decimal::from_str_exact(text).ok().map(Money)
    }

    /// Returns `None` instead of panicking when the sum does not fit.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Rounds to `places` decimal places, half away from zero.
    pub fn round_dp(&self, places: u32) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Divides by an item count, yielding zero for an empty set.
    pub fn div_count(&self, count: usize) -> Self {
        if count == 0 {
            return Money::ZERO;
        }
        self.0
            .checked_div(Decimal::from(count as u64))
            .map(Money)
            .unwrap_or(Money::ZERO)
    }

    /// Renders with exactly `places` decimal places, rounding half away from zero.
    pub fn to_fixed(&self, places: u32) -> String {
        format!("{:.*}", places as usize, self.round_dp(places).0)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// The operators below panic on overflow like `Decimal`'s own; folds over
// untrusted input use `checked_add`/`checked_sub`.

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_str(&s).map_err(serde::de::Error::custom)
    }
}
