//! Exact token quantities.
//!
//! A `Quantity` is an integer mantissa in the token's smallest unit. All
//! arithmetic stays in integers; comparisons between different tokens are
//! refused instead of silently comparing mantissas.

use super::decimal::Decimal;
use super::token::Token;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Digits rendered by `to_fixed` when no precision is requested.
pub const DEFAULT_DISPLAY_PRECISION: u8 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("incompatible token: expected {expected}, got {actual}")]
    IncompatibleToken { expected: String, actual: String },
    #[error("incomparable quantities: {left} vs {right}")]
    IncomparableQuantities { left: String, right: String },
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    pub token: Token,
    pub quantity: U256,
}

/// `10^decimals`, or `Overflow` past 77 digits where it no longer fits a
/// ledger word.
pub fn unit_scale(decimals: u32) -> Result<U256, ValueError> {
    U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .ok_or(ValueError::Overflow)
}

/// Quantity from a raw mantissa in the token's smallest unit.
pub fn create_quantity(token: Token, quantity: impl Into<U256>) -> Quantity {
    Quantity {
        token,
        quantity: quantity.into(),
    }
}

impl Quantity {
    /// Quantity from a human-readable amount ("0.5"), scaled by the token's
    /// decimals. Excess fractional digits are rejected.
    pub fn from_decimal(token: Token, amount: Decimal) -> Result<Self, ValueError> {
        let quantity = amount.to_mantissa(token.decimals)?;
        Ok(Quantity { token, quantity })
    }

    pub fn parse(token: Token, amount: &str) -> Result<Self, ValueError> {
        let decimal = Decimal::from_str_canonical(amount)
            .map_err(|e| ValueError::InvalidAmount(format!("{}: {}", amount, e)))?;
        Self::from_decimal(token, decimal)
    }

    pub fn zero(token: Token) -> Self {
        create_quantity(token, U256::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Ordering within one token; mixed tokens fail.
    pub fn compare(&self, other: &Quantity) -> Result<Ordering, ValueError> {
        if !self.token.same_as(&other.token) {
            return Err(ValueError::IncomparableQuantities {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        Ok(self.quantity.cmp(&other.quantity))
    }

    pub fn checked_add(&self, other: &Quantity) -> Result<Quantity, ValueError> {
        self.ensure_same_token(other)?;
        let quantity = self
            .quantity
            .checked_add(other.quantity)
            .ok_or(ValueError::Overflow)?;
        Ok(create_quantity(self.token.clone(), quantity))
    }

    pub fn checked_sub(&self, other: &Quantity) -> Result<Quantity, ValueError> {
        self.ensure_same_token(other)?;
        let quantity = self
            .quantity
            .checked_sub(other.quantity)
            .ok_or(ValueError::Overflow)?;
        Ok(create_quantity(self.token.clone(), quantity))
    }

    /// Multiply the mantissa by a plain integer factor (e.g. a gas amount).
    pub fn checked_mul_scalar(&self, factor: impl Into<U256>) -> Result<Quantity, ValueError> {
        let quantity = self
            .quantity
            .checked_mul(factor.into())
            .ok_or(ValueError::Overflow)?;
        Ok(create_quantity(self.token.clone(), quantity))
    }

    /// Render with `precision` fractional digits (capped at the token's
    /// decimals), truncating toward zero.
    pub fn to_fixed_with(&self, precision: u8) -> String {
        render_fixed(self.quantity, self.token.decimals, precision)
    }

    pub fn to_fixed(&self) -> String {
        self.to_fixed_with(DEFAULT_DISPLAY_PRECISION)
    }

    fn ensure_same_token(&self, other: &Quantity) -> Result<(), ValueError> {
        if self.token.same_as(&other.token) {
            Ok(())
        } else {
            Err(ValueError::IncompatibleToken {
                expected: self.token.symbol.clone(),
                actual: other.token.symbol.clone(),
            })
        }
    }
}

pub fn greater_than(a: &Quantity, b: &Quantity) -> Result<bool, ValueError> {
    Ok(a.compare(b)? == Ordering::Greater)
}

pub fn is_equal(a: &Quantity, b: &Quantity) -> Result<bool, ValueError> {
    Ok(a.compare(b)? == Ordering::Equal)
}

pub fn to_fixed(quantity: &Quantity) -> String {
    quantity.to_fixed()
}

pub(crate) fn render_fixed(mantissa: U256, decimals: u8, precision: u8) -> String {
    let digits = precision.min(decimals);
    // Any mantissa is below an unrepresentable unit, so it is all fraction.
    let (integer, remainder) = match unit_scale(u32::from(decimals)) {
        Ok(unit) => (mantissa / unit, mantissa % unit),
        Err(_) => (U256::zero(), mantissa),
    };
    if digits == 0 {
        return integer.to_string();
    }
    let fraction = format!(
        "{:0>width$}",
        remainder.to_string(),
        width = decimals as usize
    );
    format!("{}.{}", integer, &fraction[..digits as usize])
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_fixed(), self.token.symbol)
    }
}
