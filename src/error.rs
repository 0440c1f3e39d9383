use crate::domain::{Address, TxHash, ValueError};
use crate::ledger::LedgerError;
use std::time::Duration;
use thiserror::Error;

/// Every way a read or write pipeline can end without a result.
///
/// Variants up to `EstimationFailed` are raised before anything is signed and
/// cost nothing. `SubmissionFailure` means the transaction never reached the
/// network. `ExecutionReverted` means it was included and rejected (gas was
/// spent). `ConfirmationTimeout` says nothing about the outcome; re-query the
/// hash instead of resubmitting.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("guard violation: {message}")]
    GuardViolation {
        message: String,
        context: Option<String>,
    },
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("call {method} on {contract} failed: {source}")]
    CallFailed {
        method: String,
        contract: Address,
        #[source]
        source: LedgerError,
    },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("deployment error: {0}")]
    Deployment(String),
    #[error("environment has no signing identity")]
    MissingSigner,
    #[error("gas estimation for {method} failed: {source}")]
    EstimationFailed {
        method: String,
        #[source]
        source: LedgerError,
    },
    #[error("gas limit: {limit} is below estimated gas {estimate}")]
    GasLimitExceeded { limit: u64, estimate: u64 },
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("submission failed: {source}")]
    SubmissionFailure {
        #[source]
        source: LedgerError,
    },
    #[error("transaction {tx_hash} reverted in block {block_number} (gas used {gas_used})")]
    ExecutionReverted {
        tx_hash: TxHash,
        block_number: u64,
        gas_used: u64,
    },
    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: TxHash, waited: Duration },
    #[error("keystore error: {0}")]
    Keystore(String),
    /// Node request outside any contract call (chain id, clock control).
    #[error("ledger node error: {0}")]
    Node(#[source] LedgerError),
}

impl PipelineError {
    pub fn guard(message: impl Into<String>, context: Option<String>) -> Self {
        PipelineError::GuardViolation {
            message: message.into(),
            context,
        }
    }

    /// A revert after a passing guard usually means ledger state moved between
    /// observation and inclusion. Callers re-run the whole pipeline (guard
    /// included) rather than resubmitting the same payload.
    pub fn is_retryable_after_reevaluation(&self) -> bool {
        matches!(self, PipelineError::ExecutionReverted { .. })
    }

    /// Hash to re-query when the outcome of a submission is unknown or failed.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            PipelineError::ExecutionReverted { tx_hash, .. }
            | PipelineError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }

    /// True when nothing reached the network. The transaction may have been
    /// signed, but no nonce was consumed.
    pub fn is_pre_submission(&self) -> bool {
        !matches!(
            self,
            PipelineError::ExecutionReverted { .. } | PipelineError::ConfirmationTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let reverted = PipelineError::ExecutionReverted {
            tx_hash: TxHash([1; 32]),
            block_number: 7,
            gas_used: 21000,
        };
        assert!(reverted.is_retryable_after_reevaluation());
        assert!(!reverted.is_pre_submission());
        assert_eq!(reverted.tx_hash(), Some(TxHash([1; 32])));

        let guard = PipelineError::guard("No frozen ether to thaw", None);
        assert!(!guard.is_retryable_after_reevaluation());
        assert!(guard.is_pre_submission());
        assert_eq!(guard.tx_hash(), None);

        let dropped = PipelineError::SubmissionFailure {
            source: LedgerError::NetworkError("connection reset".to_string()),
        };
        assert!(dropped.is_pre_submission());
        assert!(!dropped.is_retryable_after_reevaluation());
        assert_eq!(dropped.tx_hash(), None);
    }

    #[test]
    fn test_gas_limit_message() {
        let err = PipelineError::GasLimitExceeded {
            limit: 1000,
            estimate: 52000,
        };
        assert!(err.to_string().contains("gas limit:"));
    }
}
