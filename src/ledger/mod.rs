//! Ledger node abstraction: the JSON-RPC surface the pipelines talk to.

use crate::domain::{Address, Receipt, TxHash, U256};
use crate::signer::RawTransaction;
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;

pub use http::HttpLedger;
pub use mock::{MockLedger, SubmittedTransaction};

/// Message call or estimation request. `to == None` means contract creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub value: U256,
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self {
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Connection to a ledger node.
///
/// Implementations retry transient read failures themselves. Broadcasting a
/// signed transaction is never retried: a repeated broadcast of the same
/// payload is either a duplicate or a nonce error, and the caller decides.
#[async_trait]
pub trait Ledger: Send + Sync + fmt::Debug {
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    async fn block_number(&self) -> Result<u64, LedgerError>;

    async fn balance(&self, address: Address) -> Result<U256, LedgerError>;

    /// Execute a read-only call against the latest block and return the raw
    /// return data.
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, LedgerError>;

    /// Next nonce for `address`, counting pending transactions.
    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError>;

    async fn send_raw_transaction(&self, raw: &RawTransaction) -> Result<TxHash, LedgerError>;

    /// `None` while the transaction is not yet included.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, LedgerError>;

    /// Advance the node clock (development chains only).
    async fn increase_time(&self, seconds: u64) -> Result<(), LedgerError>;

    /// Mine one block (development chains only).
    async fn mine_block(&self) -> Result<(), LedgerError>;
}

/// Error type for ledger node operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Network error (e.g., connection refused, timeout)
    NetworkError(String),
    /// HTTP error from the node's transport
    HttpError { status: u16, message: String },
    /// JSON-RPC error object returned by the node (reverts land here)
    Rpc { code: i64, message: String },
    /// Parsing error (invalid JSON or malformed result)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// Other error
    Other(String),
}

impl LedgerError {
    pub fn is_revert(&self) -> bool {
        match self {
            LedgerError::Rpc { code, message } => {
                *code == 3 || message.to_ascii_lowercase().contains("revert")
            }
            _ => false,
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            LedgerError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            LedgerError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            LedgerError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            LedgerError::RateLimited => write!(f, "Rate limited"),
            LedgerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::NetworkError("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = LedgerError::HttpError {
            status: 502,
            message: "Bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 502: Bad gateway");

        let err = LedgerError::Rpc {
            code: -32000,
            message: "nonce too low".to_string(),
        };
        assert_eq!(err.to_string(), "RPC error -32000: nonce too low");
        assert!(!err.is_revert());

        let err = LedgerError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
        };
        assert!(err.is_revert());
    }

    #[test]
    fn test_call_request_builder() {
        let to = Address::from_bytes([1; 20]);
        let from = Address::from_bytes([2; 20]);
        let request = CallRequest::new(to, vec![0xde, 0xad])
            .from(from)
            .value(U256::from(5u64));
        assert_eq!(request.to, Some(to));
        assert_eq!(request.from, Some(from));
        assert_eq!(request.value, U256::from(5u64));
    }
}
