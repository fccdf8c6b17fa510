//! Precision-safe amount types.
//!
//! Uses `rust_decimal` for exact arithmetic. Token amounts are integral
//! base units (wei-like); fiat values keep whatever precision the user typed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Token amount in integral base units.
///
/// Wraps `Decimal` so token amounts cannot be mixed with fiat values.
/// The market-priced sentinel is `TokenAmount::ZERO`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(pub Decimal);

impl TokenAmount {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Build from a raw base-unit value, rejecting fractions and negatives.
    pub fn from_base_units(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() {
            return Err(CoreError::InvalidAmount(format!("negative amount {value}")));
        }
        if value.fract() != Decimal::ZERO {
            return Err(CoreError::InvalidAmount(format!(
                "{value} is not a whole number of base units"
            )));
        }
        Ok(Self(value.normalize()))
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Truncate toward zero to whole base units.
    #[inline]
    pub fn floor(value: Decimal) -> Self {
        Self(value.trunc().normalize())
    }

    /// Canonical base-10 string (no exponent, no trailing zeros).
    pub fn to_base_unit_string(&self) -> String {
        self.0.normalize().to_string()
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for TokenAmount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base_units(s.trim().parse()?)
    }
}

impl From<u64> for TokenAmount {
    fn from(v: u64) -> Self {
        Self(Decimal::from(v))
    }
}

impl Add for TokenAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TokenAmount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TokenAmount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for TokenAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

/// Fiat value with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FiatValue(pub Decimal);

impl FiatValue {
    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for FiatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FiatValue {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for FiatValue {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Sub for FiatValue {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_token_amount_rejects_fraction() {
        assert!(TokenAmount::from_base_units(dec!(1.5)).is_err());
        assert!(TokenAmount::from_base_units(dec!(-1)).is_err());
        assert_eq!(
            TokenAmount::from_base_units(dec!(1000)).unwrap(),
            TokenAmount::from(1000)
        );
    }

    #[test]
    fn test_token_amount_parse_large_value() {
        let amount: TokenAmount = "1500000000000000000000".parse().unwrap();
        assert_eq!(amount.to_base_unit_string(), "1500000000000000000000");
    }

    #[test]
    fn test_floor_truncates() {
        assert_eq!(TokenAmount::floor(dec!(99.99)), TokenAmount::from(99));
    }

    #[test]
    fn test_sum_is_exact() {
        let parts = [
            TokenAmount::from(1_000_000_000_000_000_001),
            TokenAmount::from(2),
            TokenAmount::from(3),
        ];
        let total: TokenAmount = parts.iter().copied().sum();
        assert_eq!(total, TokenAmount::from(1_000_000_000_000_000_006));
    }
}
