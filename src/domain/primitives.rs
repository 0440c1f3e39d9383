//! Domain primitives: Address, TxHash, Track, ContractKind.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Keccak-256 digest as used by the ledger for hashing and selectors.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must be 20 bytes (40 hex characters), got {0} characters")]
    InvalidLength(usize),
    #[error("address contains non-hex characters: {0}")]
    InvalidHex(String),
    #[error("address checksum mismatch: {0}")]
    InvalidChecksum(String),
}

/// Ledger account or contract address.
///
/// Stored as raw bytes; rendered in mixed-case checksum form. Parsing accepts
/// all-lowercase and all-uppercase input as-is and validates the checksum of
/// mixed-case input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressParseError> {
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len() * 2))?;
        Ok(Address(array))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Parse a `0x`-prefixed (or bare) hex address.
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let hex_part = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if hex_part.len() != 40 {
            return Err(AddressParseError::InvalidLength(hex_part.len()));
        }
        let bytes =
            hex::decode(hex_part).map_err(|_| AddressParseError::InvalidHex(s.to_string()))?;
        let address = Address::from_slice(&bytes)?;

        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *hex_part {
            return Err(AddressParseError::InvalidChecksum(s.to_string()));
        }
        Ok(address)
    }

    /// Mixed-case checksum rendering (EIP-55).
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Case-insensitive comparison against an externally sourced string.
    pub fn matches(&self, other: &str) -> bool {
        let hex_part = other.strip_prefix("0x").unwrap_or(other);
        hex_part.eq_ignore_ascii_case(&hex::encode(self.0))
    }
}

/// True when `s` is a well-formed address with a valid checksum (if mixed-case).
pub fn is_address(s: &str) -> bool {
    Address::parse(s).is_ok()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Transaction identifier (Keccak-256 of the signed payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))
            .map_err(|e| format!("invalid transaction hash {}: {}", s, e))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| format!("transaction hash must be 32 bytes: {}", s))?;
        Ok(TxHash(array))
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Network/configuration variant a deployment registry is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Track {
    Testing,
    Demo,
    KyberPrice,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Testing => "testing",
            Track::Demo => "demo",
            Track::KyberPrice => "kyberPrice",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testing" => Ok(Track::Testing),
            "demo" => Ok(Track::Demo),
            "kyberPrice" => Ok(Track::KyberPrice),
            other => Err(format!("must be testing, demo, or kyberPrice, got {}", other)),
        }
    }
}

/// Kind of protocol contract an operation targets. Singleton kinds double as
/// deployment registry roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContractKind {
    Engine,
    PriceSource,
    Registry,
    Version,
    #[serde(rename = "ranking")]
    FundRanking,
    Hub,
    Accounting,
    Participation,
    PolicyManager,
    Shares,
    Trading,
    Vault,
    StandardToken,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::Engine => "Engine",
            ContractKind::PriceSource => "PriceSource",
            ContractKind::Registry => "Registry",
            ContractKind::Version => "Version",
            ContractKind::FundRanking => "FundRanking",
            ContractKind::Hub => "Hub",
            ContractKind::Accounting => "Accounting",
            ContractKind::Participation => "Participation",
            ContractKind::PolicyManager => "PolicyManager",
            ContractKind::Shares => "Shares",
            ContractKind::Trading => "Trading",
            ContractKind::Vault => "Vault",
            ContractKind::StandardToken => "StandardToken",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for s in CHECKSUMMED {
            let addr = Address::parse(s).unwrap();
            assert_eq!(addr.to_checksum(), s);
            assert!(is_address(s));
        }
    }

    #[test]
    fn test_lowercase_accepted_and_normalized() {
        let lower = CHECKSUMMED[0].to_lowercase();
        let addr = Address::parse(&lower).unwrap();
        assert_eq!(addr.to_string(), CHECKSUMMED[0]);
        assert!(addr.matches(&lower));
        assert!(addr.matches(CHECKSUMMED[0]));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        // Flip the case of one letter.
        let bad = "0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert!(matches!(
            Address::parse(bad),
            Err(AddressParseError::InvalidChecksum(_))
        ));
        assert!(!is_address(bad));
    }

    #[test]
    fn test_invalid_length_and_hex() {
        assert!(matches!(
            Address::parse("0x1234"),
            Err(AddressParseError::InvalidLength(4))
        ));
        assert!(matches!(
            Address::parse("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_address_serde() {
        let addr = Address::parse(CHECKSUMMED[1]).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[1]));
        let back: Address = serde_json::from_str(&json.to_lowercase()).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_track_parse() {
        assert_eq!("kyberPrice".parse::<Track>().unwrap(), Track::KyberPrice);
        assert!("mainnet".parse::<Track>().is_err());
    }

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
