//! Mock ledger node for testing without network calls.
//!
//! Behaves like a strict development node: broadcasts are decoded, the sender
//! is recovered from the signature and the nonce must equal the sender's next
//! pending nonce. Every method yields to the scheduler once so concurrent
//! callers interleave the way they would against a real node.

use super::{CallRequest, Ledger, LedgerError};
use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{keccak256, Address, Receipt, TxHash, U256};
use crate::signer::{decode_raw_transaction, DecodedTransaction, RawTransaction};
use async_trait::async_trait;
use parking_lot::Mutex;
use rlp::RlpStream;
use std::collections::{HashMap, HashSet};

/// A broadcast accepted by the mock, with its sender recovered.
pub type SubmittedTransaction = DecodedTransaction;

const DEFAULT_CHAIN_ID: u64 = 1337;
const DEFAULT_ESTIMATE: u64 = 100_000;
const GAS_USED: u64 = 21_000;

#[derive(Debug, Default)]
struct MockState {
    call_responses: HashMap<(Address, [u8; 4]), Result<Vec<u8>, LedgerError>>,
    calls: Vec<CallRequest>,
    estimates: HashMap<[u8; 4], u64>,
    default_estimate: Option<u64>,
    estimate_failures: HashSet<[u8; 4]>,
    estimate_requests: Vec<CallRequest>,
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    submissions: Vec<SubmittedTransaction>,
    receipts: HashMap<TxHash, Receipt>,
    unmined: Vec<SubmittedTransaction>,
    revert_selectors: HashSet<[u8; 4]>,
    hold_receipts: bool,
    failing_broadcasts: usize,
    block_number: u64,
    time_increases: Vec<u64>,
    mined_blocks: u64,
}

/// Scriptable in-memory ledger.
#[derive(Debug)]
pub struct MockLedger {
    chain_id: u64,
    state: Mutex<MockState>,
}

impl MockLedger {
    /// Create a mock with no scripted responses on the default development chain id.
    pub fn new() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Raw return data for `method` called on `contract`.
    pub fn with_call_response(mut self, contract: Address, method: MethodSignature, output: Vec<u8>) -> Self {
        self.state
            .get_mut()
            .call_responses
            .insert((contract, method.selector()), Ok(output));
        self
    }

    /// ABI-encoded return values for `method` called on `contract`.
    ///
    /// Panics if `values` do not match `returns`; mocks are test-only.
    pub fn with_call_values(
        self,
        contract: Address,
        method: MethodSignature,
        returns: &str,
        values: Vec<AbiValue>,
    ) -> Self {
        self.set_call_values(contract, method, returns, values);
        self
    }

    /// `method` on `contract` reverts when called or estimated.
    pub fn with_call_revert(mut self, contract: Address, method: MethodSignature) -> Self {
        self.state.get_mut().call_responses.insert(
            (contract, method.selector()),
            Err(LedgerError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            }),
        );
        self
    }

    /// Gas estimate returned for calls to `method`.
    pub fn with_estimate(mut self, method: MethodSignature, gas: u64) -> Self {
        self.state.get_mut().estimates.insert(method.selector(), gas);
        self
    }

    /// Gas estimate for anything without a per-method estimate.
    pub fn with_default_estimate(mut self, gas: u64) -> Self {
        self.state.get_mut().default_estimate = Some(gas);
        self
    }

    /// Estimation of `method` fails as the node would for a reverting call.
    pub fn with_estimate_failure(mut self, method: MethodSignature) -> Self {
        self.state
            .get_mut()
            .estimate_failures
            .insert(method.selector());
        self
    }

    /// Transactions calling `method` are included with a failed status.
    pub fn with_revert_on_execution(mut self, method: MethodSignature) -> Self {
        self.state
            .get_mut()
            .revert_selectors
            .insert(method.selector());
        self
    }

    /// Accepted transactions stay pending until [`MockLedger::mine_pending`].
    pub fn with_held_receipts(mut self) -> Self {
        self.state.get_mut().hold_receipts = true;
        self
    }

    /// The next `count` broadcasts fail with a network error before reaching the pool.
    pub fn with_failing_broadcasts(mut self, count: usize) -> Self {
        self.state.get_mut().failing_broadcasts = count;
        self
    }

    pub fn with_balance(mut self, address: Address, balance: U256) -> Self {
        self.state.get_mut().balances.insert(address, balance);
        self
    }

    /// Replace the scripted return values of `method` on `contract`.
    pub fn set_call_values(
        &self,
        contract: Address,
        method: MethodSignature,
        returns: &str,
        values: Vec<AbiValue>,
    ) {
        let output = abi::parse_types(returns)
            .and_then(|types| abi::encode(&types, &values))
            .unwrap_or_else(|e| panic!("mock output for {} does not encode: {}", method, e));
        self.state
            .lock()
            .call_responses
            .insert((contract, method.selector()), Ok(output));
    }

    pub fn set_failing_broadcasts(&self, count: usize) {
        self.state.lock().failing_broadcasts = count;
    }

    /// Include every held transaction, producing receipts.
    pub fn mine_pending(&self) {
        let mut state = self.state.lock();
        let pending = std::mem::take(&mut state.unmined);
        for tx in pending {
            include(&mut state, tx);
        }
    }

    pub fn submissions(&self) -> Vec<SubmittedTransaction> {
        self.state.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions.len()
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.state.lock().calls.clone()
    }

    pub fn estimate_requests(&self) -> Vec<CallRequest> {
        self.state.lock().estimate_requests.clone()
    }

    pub fn time_increases(&self) -> Vec<u64> {
        self.state.lock().time_increases.clone()
    }

    pub fn mined_blocks(&self) -> u64 {
        self.state.lock().mined_blocks
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn selector_of(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4).and_then(|s| s.try_into().ok())
}

fn reverted() -> LedgerError {
    LedgerError::Rpc {
        code: 3,
        message: "execution reverted".to_string(),
    }
}

/// Address of a contract created by `sender` at `nonce`.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&sender.as_bytes().to_vec());
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

fn include(state: &mut MockState, tx: SubmittedTransaction) {
    state.block_number += 1;
    let status = match (tx.unsigned.to, selector_of(&tx.unsigned.data)) {
        (Some(_), Some(selector)) => !state.revert_selectors.contains(&selector),
        _ => true,
    };
    let contract_address = match tx.unsigned.to {
        None => Some(create_address(tx.from, tx.unsigned.nonce)),
        Some(_) => None,
    };
    let mut block_hash = [0u8; 32];
    block_hash[24..].copy_from_slice(&state.block_number.to_be_bytes());
    state.receipts.insert(
        tx.hash,
        Receipt {
            transaction_hash: tx.hash,
            status,
            gas_used: GAS_USED.min(tx.unsigned.gas_limit),
            block_number: state.block_number,
            block_hash: Some(TxHash(block_hash)),
            contract_address,
            logs: Vec::new(),
        },
    );
}

#[async_trait]
impl Ledger for MockLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        tokio::task::yield_now().await;
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().block_number)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        tokio::task::yield_now().await;
        Ok(self
            .state
            .lock()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.calls.push(request.clone());
        let key = match (request.to, selector_of(&request.data)) {
            (Some(to), Some(selector)) => (to, selector),
            _ => return Err(reverted()),
        };
        state.call_responses.get(&key).cloned().unwrap_or_else(|| Err(reverted()))
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, LedgerError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.estimate_requests.push(request.clone());
        let selector = request.to.and(selector_of(&request.data));
        if let (Some(to), Some(selector)) = (request.to, selector) {
            if state.estimate_failures.contains(&selector)
                || matches!(state.call_responses.get(&(to, selector)), Some(Err(_)))
            {
                return Err(reverted());
            }
        }
        Ok(selector
            .and_then(|s| state.estimates.get(&s).copied())
            .or(state.default_estimate)
            .unwrap_or(DEFAULT_ESTIMATE))
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().nonces.get(&address).copied().unwrap_or(0))
    }

    async fn send_raw_transaction(&self, raw: &RawTransaction) -> Result<TxHash, LedgerError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        if state.failing_broadcasts > 0 {
            state.failing_broadcasts -= 1;
            return Err(LedgerError::NetworkError("connection reset by peer".to_string()));
        }

        let tx = decode_raw_transaction(raw).map_err(|e| LedgerError::Rpc {
            code: -32602,
            message: format!("invalid transaction: {}", e),
        })?;
        if tx.unsigned.chain_id != self.chain_id {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: format!(
                    "invalid chain id {} (expected {})",
                    tx.unsigned.chain_id, self.chain_id
                ),
            });
        }
        let expected = state.nonces.get(&tx.from).copied().unwrap_or(0);
        if tx.unsigned.nonce != expected {
            let message = if tx.unsigned.nonce < expected {
                "nonce too low"
            } else {
                "nonce too high"
            };
            return Err(LedgerError::Rpc {
                code: -32000,
                message: format!("{}: got {}, expected {}", message, tx.unsigned.nonce, expected),
            });
        }
        state.nonces.insert(tx.from, expected + 1);
        state.submissions.push(tx.clone());

        let hash = tx.hash;
        if state.hold_receipts {
            state.unmined.push(tx);
        } else {
            include(&mut state, tx);
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, LedgerError> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().receipts.get(&hash).cloned())
    }

    async fn increase_time(&self, seconds: u64) -> Result<(), LedgerError> {
        tokio::task::yield_now().await;
        self.state.lock().time_increases.push(seconds);
        Ok(())
    }

    async fn mine_block(&self) -> Result<(), LedgerError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        state.block_number += 1;
        state.mined_blocks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{LocalSigner, Signer, UnsignedTransaction};

    const BALANCE_OF: MethodSignature = MethodSignature::new("balanceOf(address)");

    fn transfer_tx(nonce: u64) -> UnsignedTransaction {
        UnsignedTransaction {
            nonce,
            gas_price: U256::from(1u64),
            gas_limit: 50_000,
            to: Some(Address::from_bytes([9; 20])),
            value: U256::zero(),
            data: vec![0xa9, 0x05, 0x9c, 0xbb],
            chain_id: DEFAULT_CHAIN_ID,
        }
    }

    #[tokio::test]
    async fn test_scripted_call() {
        let token = Address::from_bytes([1; 20]);
        let ledger = MockLedger::new().with_call_values(
            token,
            BALANCE_OF,
            "uint256",
            vec![AbiValue::Uint(U256::from(42u64))],
        );
        let data = BALANCE_OF.encode_call(&[Address::ZERO.into()]).unwrap();
        let output = ledger.call(&CallRequest::new(token, data.clone())).await.unwrap();
        assert_eq!(output[31], 42);

        let other = Address::from_bytes([2; 20]);
        let err = ledger.call(&CallRequest::new(other, data)).await.unwrap_err();
        assert!(err.is_revert());
        assert_eq!(ledger.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_strict_nonce_checking() {
        let ledger = MockLedger::new();
        let signer = LocalSigner::random();

        let raw = signer.sign_transaction(&transfer_tx(1)).await.unwrap();
        let err = ledger.send_raw_transaction(&raw).await.unwrap_err();
        assert!(err.to_string().contains("nonce too high"));

        let raw = signer.sign_transaction(&transfer_tx(0)).await.unwrap();
        let hash = ledger.send_raw_transaction(&raw).await.unwrap();
        assert_eq!(ledger.transaction_count(signer.address()).await.unwrap(), 1);
        assert!(ledger.transaction_receipt(hash).await.unwrap().unwrap().succeeded());

        let err = ledger.send_raw_transaction(&raw).await.unwrap_err();
        assert!(err.to_string().contains("nonce too low"));
        assert_eq!(ledger.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_held_receipts_and_failures() {
        let ledger = MockLedger::new().with_held_receipts().with_failing_broadcasts(1);
        let signer = LocalSigner::random();
        let raw = signer.sign_transaction(&transfer_tx(0)).await.unwrap();

        assert!(matches!(
            ledger.send_raw_transaction(&raw).await,
            Err(LedgerError::NetworkError(_))
        ));
        let hash = ledger.send_raw_transaction(&raw).await.unwrap();
        assert!(ledger.transaction_receipt(hash).await.unwrap().is_none());

        ledger.mine_pending();
        assert!(ledger.transaction_receipt(hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_contract_creation_address() {
        let ledger = MockLedger::new();
        let signer = LocalSigner::random();
        let tx = UnsignedTransaction {
            to: None,
            data: vec![0x60, 0x80],
            ..transfer_tx(0)
        };
        let hash = ledger
            .send_raw_transaction(&signer.sign_transaction(&tx).await.unwrap())
            .await
            .unwrap();
        let receipt = ledger.transaction_receipt(hash).await.unwrap().unwrap();
        assert_eq!(
            receipt.contract_address,
            Some(create_address(signer.address(), 0))
        );
    }

    #[test]
    fn test_create_address_known_vector() {
        let sender = Address::parse("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
        assert_eq!(
            create_address(sender, 0).to_string().to_lowercase(),
            "0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"
        );
    }
}
