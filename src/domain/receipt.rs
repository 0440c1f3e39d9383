use super::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

/// Log entry emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

/// Outcome of an included transaction. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub status: bool,
    pub gas_used: u64,
    pub block_number: u64,
    pub block_hash: Option<TxHash>,
    pub contract_address: Option<Address>,
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status
    }
}
