//! Human-readable decimal amounts backed by rust_decimal.
//!
//! Only used at the edge: parsing amounts typed by a person ("0.5 WETH") and
//! scaling them exactly into integer mantissas. Nothing submitted to the ledger
//! is ever computed in decimal.

use super::quantity::{unit_scale, ValueError};
use primitive_types::U256;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal amount as entered by a user.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format without exponent notation and without trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    /// Scale into an integer mantissa with `decimals` fractional digits.
    ///
    /// Fails with `InvalidAmount` for negative values and for values carrying
    /// more fractional digits than `decimals`; rounding here would create or
    /// destroy value.
    pub fn to_mantissa(&self, decimals: u8) -> Result<U256, ValueError> {
        if self.is_negative() {
            return Err(ValueError::InvalidAmount(format!(
                "negative amount {}",
                self.to_canonical_string()
            )));
        }
        let normalized = self.0.normalize();
        let scale = normalized.scale();
        if scale > u32::from(decimals) {
            return Err(ValueError::InvalidAmount(format!(
                "{} has more than {} fractional digits",
                self.to_canonical_string(),
                decimals
            )));
        }
        let mantissa = U256::from(normalized.mantissa().unsigned_abs());
        let factor = unit_scale(u32::from(decimals) - scale)?;
        mantissa
            .checked_mul(factor)
            .ok_or(ValueError::Overflow)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_roundtrip() {
        for s in ["123.456", "0.0001", "1000000", "0", "999999999.999999999"] {
            let decimal = Decimal::from_str_canonical(s).expect("parse failed");
            let reparsed =
                Decimal::from_str_canonical(&decimal.to_canonical_string()).expect("reparse");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_to_mantissa_scales_exactly() {
        let half = Decimal::from_str_canonical("0.5").unwrap();
        assert_eq!(
            half.to_mantissa(18).unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );

        let whole = Decimal::from(2u64);
        assert_eq!(whole.to_mantissa(6).unwrap(), U256::from(2_000_000u64));

        // Trailing zeros beyond the precision are fine once normalized.
        let padded = Decimal::from_str_canonical("1.2300").unwrap();
        assert_eq!(padded.to_mantissa(2).unwrap(), U256::from(123u64));
    }

    #[test]
    fn test_to_mantissa_rejects_excess_precision() {
        let d = Decimal::from_str_canonical("0.001").unwrap();
        assert!(matches!(d.to_mantissa(2), Err(ValueError::InvalidAmount(_))));
    }

    #[test]
    fn test_to_mantissa_rejects_negative() {
        let d = Decimal::from_str_canonical("-1").unwrap();
        assert!(matches!(d.to_mantissa(18), Err(ValueError::InvalidAmount(_))));
    }

    #[test]
    fn test_to_mantissa_oversized_decimals_overflow() {
        let d = Decimal::from(1u64);
        assert_eq!(d.to_mantissa(80), Err(ValueError::Overflow));
        assert!(d.to_mantissa(77).is_ok());
    }

    #[test]
    fn test_decimal_json_is_string() {
        let decimal = Decimal::from_str_canonical("123.456").unwrap();
        let json = serde_json::to_value(decimal).unwrap();
        assert_eq!(json, serde_json::json!("123.456"));
    }
}
