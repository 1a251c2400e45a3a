//! Arbitrary-precision amounts as they travel between chains, the ledger and the storage layer.

use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
    str::FromStr,
};

use bigdecimal::{num_bigint::BigInt, BigDecimal, ParseBigDecimalError, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::MAX_AMOUNT_DIGITS;

/// A non-lossy decimal amount.
///
/// On-chain amounts are integers in the token's smallest unit, but fee and price computations need
/// fractional values, so the ledger keeps everything as a [`BigDecimal`]. Amounts are rendered as
/// plain base-10 strings (never in exponent notation) when they cross the storage boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigDecimal);

impl Amount {
    /// Creates a new [`Amount`] from a [`BigDecimal`].
    pub const fn new(value: BigDecimal) -> Self {
        Self(value)
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(BigDecimal::zero())
    }

    /// The largest value the storage layer can represent: sixty-four nines.
    pub fn storage_max() -> Self {
        let max = BigInt::from(10u8).pow(MAX_AMOUNT_DIGITS as u32) - BigInt::from(1u8);

        Self(BigDecimal::from(max))
    }

    /// Returns the inner decimal value.
    pub const fn inner(&self) -> &BigDecimal {
        &self.0
    }

    /// Whether this amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Renders the amount as a plain decimal string.
    pub fn to_plain_string(&self) -> String {
        self.0.to_plain_string()
    }

    /// Whether the decimal representation of this amount is wider than a storage column.
    pub fn exceeds_storage_width(&self) -> bool {
        self.to_plain_string().len() > MAX_AMOUNT_DIGITS
    }

    /// Returns this amount saturated to [`Amount::storage_max`] if it does not fit in a storage
    /// column, and an unchanged copy otherwise.
    pub fn clamped(&self) -> Self {
        if self.exceeds_storage_width() {
            Self::storage_max()
        } else {
            self.clone()
        }
    }

    /// The string that is actually written to storage.
    pub fn to_storage_string(&self) -> String {
        self.clamped().to_plain_string()
    }

    /// Converts an amount in the smallest on-chain unit into whole-token units.
    ///
    /// This only shifts the decimal exponent, so it never loses precision.
    pub fn in_whole_units(&self, precision: u64) -> BigDecimal {
        let (digits, scale) = self.0.as_bigint_and_exponent();

        BigDecimal::new(digits, scale + precision as i64)
    }
}

impl From<BigDecimal> for Amount {
    fn from(value: BigDecimal) -> Self {
        Self(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigDecimal::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(BigDecimal::from(value))
    }
}

impl FromStr for Amount {
    type Err = ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BigDecimal::from_str(s.trim()).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_plain_string())
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Amount> for Amount {
    type Output = Amount;

    fn add(self, rhs: &'a Amount) -> Self::Output {
        Self(self.0 + &rhs.0)
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        self.0 += &rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, v| acc + v)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_plain_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        Amount::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_amounts_saturate_to_sixty_four_nines() {
        let wide = Amount::from_str(&"1".repeat(MAX_AMOUNT_DIGITS + 1)).unwrap();
        assert!(wide.exceeds_storage_width());
        assert_eq!(wide.to_storage_string(), "9".repeat(MAX_AMOUNT_DIGITS));

        let fits = Amount::from_str(&"1".repeat(MAX_AMOUNT_DIGITS)).unwrap();
        assert!(!fits.exceeds_storage_width());
        assert_eq!(fits.to_storage_string(), "1".repeat(MAX_AMOUNT_DIGITS));
    }

    #[test]
    fn test_large_round_numbers_render_without_exponent() {
        let amount = Amount::from_str("100000000000000000000000000000").unwrap();

        assert_eq!(amount.to_plain_string(), "100000000000000000000000000000");
    }

    #[test]
    fn test_whole_units_is_exact() {
        let amount = Amount::from(5_000_000_000_000_000_001u128);
        let whole = amount.in_whole_units(18);

        assert_eq!(whole, BigDecimal::from_str("5.000000000000000001").unwrap());
    }

    #[test]
    fn test_sum_keeps_precision() {
        let amounts = [
            Amount::from_str("0.1").unwrap(),
            Amount::from_str("0.2").unwrap(),
        ];
        let total: Amount = amounts.iter().sum();

        assert_eq!(total, Amount::from_str("0.3").unwrap());
    }

    #[test]
    fn test_serde_as_string() {
        let amount = Amount::from(42u64);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"42\"");

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
