use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Denominator for rates expressed in basis points (1 bp = 0.01%).
pub const BPS_DENOMINATOR: u32 = 10_000;

const MINOR_PER_MAJOR: u64 = 100;

/// A non-negative monetary amount in minor currency units (cents).
///
/// All ledger balances use this type; conversion to a display currency only
/// happens at the boundary (`Display`, `FromStr`).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole currency units, e.g. `from_major(50)` is 50.00.
    pub fn from_major(major: u64) -> Option<Self> {
        major.checked_mul(MINOR_PER_MAJOR).map(Self)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Multiply by a rate in basis points, rounding half to even.
    ///
    /// The product is computed in `u128` so only the final division rounds.
    /// Returns `None` if the result does not fit.
    pub fn apply_rate_bps(self, rate_bps: u32) -> Option<Money> {
        let denominator = u128::from(BPS_DENOMINATOR);
        let product = u128::from(self.0) * u128::from(rate_bps);
        let mut quotient = product / denominator;
        let twice_remainder = (product % denominator) * 2;

        if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 == 1) {
            quotient += 1;
        }

        u64::try_from(quotient).ok().map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_PER_MAJOR,
            self.0 % MINOR_PER_MAJOR
        )
    }
}

impl FromStr for Money {
    type Err = ParseError;

    /// Parse a display amount such as `20`, `49.9` or `49.99`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidAmount(s.to_string());
        let trimmed = s.trim();

        let (major, fraction) = match trimmed.split_once('.') {
            Some((major, fraction)) => (major, fraction),
            None => (trimmed, ""),
        };

        if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if trimmed.ends_with('.') {
            return Err(invalid());
        }

        let major: u64 = major.parse().map_err(|_| invalid())?;
        let minor: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .map(Money)
            .ok_or_else(invalid)
    }
}
