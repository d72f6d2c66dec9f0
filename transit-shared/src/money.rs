use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of minor units in one major unit (cents per currency unit).
pub const MINOR_UNITS: i64 = 100;

/// An amount in the lowest denomination. Balances, prices and ledger entries
/// are always carried as `Money`; floats only exist at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Convert a client-supplied major-unit float (e.g. `12.5`) to minor units,
    /// rounding half away from zero.
    pub fn from_major(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        if value < 0.0 {
            return Err(MoneyError::Negative);
        }
        let scaled = (value * MINOR_UNITS as f64).round();
        if scaled > i64::MAX as f64 {
            return Err(MoneyError::Overflow);
        }
        Ok(Money(scaled as i64))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MINOR_UNITS as u64;
        write!(f, "{}{}.{:02}", sign, abs / unit, abs % unit)
    }
}

/// Exact decimal parsing, e.g. `"12.50"` or `"7"`. At most two fractional digits.
impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(MoneyError::Negative);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(MoneyError::Malformed(s.to_string()));
        }
        if frac.len() > 2 {
            return Err(MoneyError::TooPrecise(s.to_string()));
        }
        let digits_only = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if !digits_only(whole) || !digits_only(frac) {
            return Err(MoneyError::Malformed(s.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyError::Overflow)?
        };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| MoneyError::Malformed(s.to_string()))? * 10,
            _ => frac.parse().map_err(|_| MoneyError::Malformed(s.to_string()))?,
        };

        whole
            .checked_mul(MINOR_UNITS)
            .and_then(|w| w.checked_add(frac))
            .map(Money)
            .ok_or(MoneyError::Overflow)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MoneyError {
    #[error("Amount is not a finite number")]
    NotFinite,

    #[error("Amount must not be negative")]
    Negative,

    #[error("Amount overflows the ledger range")]
    Overflow,

    #[error("Amount has more than two decimal places: {0}")]
    TooPrecise(String),

    #[error("Malformed amount: {0}")]
    Malformed(String),
}
