//! Domain types and the exact-precision value model.
//!
//! This module provides:
//! - Ledger primitives: Address (checksummed), TxHash, Track, ContractKind
//! - Token descriptors and integer-mantissa Quantities
//! - Price ratios with floor-rounded `value_in` conversion
//! - Decimal parsing of human-entered amounts
//! - Receipts of included transactions

pub mod decimal;
pub mod price;
pub mod primitives;
pub mod quantity;
pub mod receipt;
pub mod token;

pub use decimal::Decimal;
pub use price::{create_price, value_in, Price};
pub use primitives::{
    is_address, keccak256, Address, AddressParseError, ContractKind, Track, TxHash,
};
pub use quantity::{
    create_quantity, greater_than, is_equal, to_fixed, unit_scale, Quantity, ValueError,
    DEFAULT_DISPLAY_PRECISION,
};
pub use receipt::{LogEntry, Receipt};
pub use token::Token;

pub use primitive_types::U256;
