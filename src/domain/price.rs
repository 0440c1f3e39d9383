//! Price ratios between two tokens.

use super::quantity::{create_quantity, render_fixed, unit_scale, Quantity, ValueError};
use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `quote` per `base`. The base mantissa is the unit scale of the ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub base: Quantity,
    pub quote: Quantity,
}

pub fn create_price(base: Quantity, quote: Quantity) -> Price {
    Price { base, quote }
}

/// Convert `quantity` (denominated in `price.base`'s token) into the quote
/// token: `floor(quantity * quote / base)`.
///
/// The product is computed in 512 bits so it cannot overflow before the
/// division; only a result that does not fit the ledger word fails.
pub fn value_in(price: &Price, quantity: &Quantity) -> Result<Quantity, ValueError> {
    if !quantity.token.same_as(&price.base.token) {
        return Err(ValueError::IncompatibleToken {
            expected: price.base.token.symbol.clone(),
            actual: quantity.token.symbol.clone(),
        });
    }
    if price.base.quantity.is_zero() {
        return Err(ValueError::DivisionByZero);
    }
    let product = U512::from(quantity.quantity) * U512::from(price.quote.quantity);
    let result = product / U512::from(price.base.quantity);
    let result = U256::try_from(result).map_err(|_| ValueError::Overflow)?;
    Ok(create_quantity(price.quote.token.clone(), result))
}

impl Price {
    /// The reciprocal ratio (base per quote).
    pub fn invert(&self) -> Price {
        create_price(self.quote.clone(), self.base.clone())
    }

    /// Quote amount for exactly one whole unit of the base token.
    pub fn per_whole_unit(&self) -> Result<Quantity, ValueError> {
        let one = create_quantity(
            self.base.token.clone(),
            unit_scale(u32::from(self.base.token.decimals))?,
        );
        value_in(self, &one)
    }

    /// Render the quote per whole base unit, e.g. `"2.500000"`.
    pub fn to_fixed_with(&self, precision: u8) -> String {
        match self.per_whole_unit() {
            Ok(q) => q.to_fixed_with(precision),
            Err(_) => render_fixed(U256::zero(), self.quote.token.decimals, precision),
        }
    }

    pub fn to_fixed(&self) -> String {
        self.to_fixed_with(super::quantity::DEFAULT_DISPLAY_PRECISION)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.to_fixed(),
            self.quote.token.symbol,
            self.base.token.symbol
        )
    }
}
