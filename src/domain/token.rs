use super::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token descriptor: symbol, ledger address and decimal precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    pub fn new(symbol: impl Into<String>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            address,
            decimals,
        }
    }

    /// Identity used by the value model. The symbol is informational only; two
    /// descriptors with the same address and precision denote the same token.
    pub fn same_as(&self, other: &Token) -> bool {
        self.address == other.address && self.decimals == other.decimals
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_as_ignores_symbol() {
        let addr = Address::from_bytes([7u8; 20]);
        let a = Token::new("WETH", addr, 18);
        let b = Token::new("ETH-T", addr, 18);
        let c = Token::new("WETH", addr, 6);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }
}
