//! Write path.
//!
//! `CREATED → GUARDED → PREPARED → FEE_COMPUTED → ESTIMATED → SIGNED →
//! SUBMITTED → CONFIRMED | REVERTED | FAILED`. Everything up to ESTIMATED is
//! free and leaves no trace on the ledger; dropping the future before
//! SUBMITTED cancels cleanly.

use super::fees::compute_fees;
use super::{no_args, GuardFn, PrepareFn, TxPostProcessFn, TxStage};
use crate::abi::MethodSignature;
use crate::domain::{Address, ContractKind, Receipt, TxHash, U256};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::ledger::CallRequest;
use crate::signer::UnsignedTransaction;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-descriptor execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Overrides the Environment's gas limit for this operation.
    pub gas_limit: Option<u64>,
    /// Native value attached in addition to fees.
    pub value: U256,
    /// Pay the protocol usage fee for this call's gas footprint.
    pub amgu_payable: bool,
    /// Attach the Environment's execution incentive.
    pub incentive: bool,
}

fn receipt_passthrough<'a, A>(
    _env: &'a Environment,
    receipt: Receipt,
    _args: &'a A,
    _contract: Address,
) -> BoxFuture<'a, Result<Receipt, PipelineError>> {
    Box::pin(async move { Ok(receipt) })
}

/// State-mutating ledger operation template.
pub struct TransactionDescriptor<A, R> {
    method: MethodSignature,
    kind: ContractKind,
    guard: Option<GuardFn<A>>,
    prepare: PrepareFn<A>,
    post_process: TxPostProcessFn<A, R>,
    options: TxOptions,
}

impl<A, R> Clone for TransactionDescriptor<A, R> {
    fn clone(&self) -> Self {
        Self {
            method: self.method,
            kind: self.kind,
            guard: self.guard,
            prepare: self.prepare,
            post_process: self.post_process,
            options: self.options.clone(),
        }
    }
}

impl<A: Sync> TransactionDescriptor<A, Receipt> {
    /// Without hooks the transaction takes no arguments and yields its receipt.
    pub fn new(method: MethodSignature, kind: ContractKind) -> Self {
        Self {
            method,
            kind,
            guard: None,
            prepare: no_args::<A>,
            post_process: receipt_passthrough::<A>,
            options: TxOptions::default(),
        }
    }
}

impl<A: Sync, R: Send> TransactionDescriptor<A, R> {
    pub fn guard(mut self, guard: GuardFn<A>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn prepare(mut self, prepare: PrepareFn<A>) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn post_process<S>(
        self,
        post_process: TxPostProcessFn<A, S>,
    ) -> TransactionDescriptor<A, S> {
        TransactionDescriptor {
            method: self.method,
            kind: self.kind,
            guard: self.guard,
            prepare: self.prepare,
            post_process,
            options: self.options,
        }
    }

    pub fn method(&self) -> MethodSignature {
        self.method
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn tx_options(&self) -> &TxOptions {
        &self.options
    }

    pub async fn execute(
        &self,
        env: &Environment,
        contract: Address,
        args: &A,
    ) -> Result<R, PipelineError> {
        let span = info_span!(
            "transaction",
            method = self.method.name(),
            kind = %self.kind,
            contract = %contract,
            session = %env.session()
        );
        async move {
            debug!(stage = %TxStage::Created);
            if let Some(guard) = self.guard {
                guard(env, args, contract).await?;
            }
            debug!(stage = %TxStage::Guarded);

            let values = (self.prepare)(env, args, contract).await?;
            let data = self.method.encode_call(&values)?;
            debug!(stage = %TxStage::Prepared, bytes = data.len());

            let fees = compute_fees(env, contract, self.method, &data, &self.options).await?;
            let value = fees.total(self.options.value)?;
            debug!(
                stage = %TxStage::FeeComputed,
                amgu = %fees.amgu,
                incentive = %fees.incentive,
                value = %value
            );

            let receipt = submit(
                env,
                Some(contract),
                data,
                value,
                self.options.gas_limit,
                self.method.as_str(),
            )
            .await?;
            (self.post_process)(env, receipt, args, contract).await
        }
        .instrument(span)
        .await
    }

    pub async fn execute_registered(&self, env: &Environment, args: &A) -> Result<R, PipelineError> {
        let contract = env.address_of(self.kind)?;
        self.execute(env, contract, args).await
    }
}

/// ESTIMATED through CONFIRMED for a fully-formed payload. `to == None`
/// creates a contract.
pub(crate) async fn submit(
    env: &Environment,
    to: Option<Address>,
    data: Vec<u8>,
    value: U256,
    gas_limit: Option<u64>,
    label: &str,
) -> Result<Receipt, PipelineError> {
    let wallet = env.wallet_address();
    let estimate_request = CallRequest {
        from: wallet,
        to,
        data: data.clone(),
        value,
    };
    let estimate = env
        .ledger()
        .estimate_gas(&estimate_request)
        .await
        .map_err(|source| PipelineError::EstimationFailed {
            method: label.to_string(),
            source,
        })?;

    let limit = gas_limit.or(env.options().gas_limit);
    if let Some(limit) = limit {
        if estimate > limit {
            return Err(PipelineError::GasLimitExceeded { limit, estimate });
        }
    }
    let gas = limit.unwrap_or(estimate);
    debug!(stage = %TxStage::Estimated, estimate, gas);

    let signer = env.require_wallet()?.clone();
    let from = signer.address();

    // Nonce assignment, signing and broadcast are one critical section per
    // signing identity.
    let mut slot = env.nonces().lock(from).await;
    let nonce = match slot.cached() {
        Some(nonce) => nonce,
        None => env
            .ledger()
            .transaction_count(from)
            .await
            .map_err(|source| PipelineError::SubmissionFailure { source })?,
    };

    let unsigned = UnsignedTransaction {
        nonce,
        gas_price: env.options().gas_price,
        gas_limit: gas,
        to,
        value,
        data,
        chain_id: env.options().chain_id,
    };
    let raw = signer
        .sign_transaction(&unsigned)
        .await
        .map_err(|e| PipelineError::Signing(e.to_string()))?;
    debug!(stage = %TxStage::Signed, nonce, from = %from);

    // If this future is dropped mid-broadcast the outcome is unknown; the
    // next holder must re-read the pending count.
    slot.invalidate();
    let hash = match env.ledger().send_raw_transaction(&raw).await {
        Ok(hash) => {
            slot.commit(nonce);
            hash
        }
        Err(source) => {
            warn!(stage = %TxStage::Failed, "Broadcast of {} failed: {}", label, source);
            return Err(PipelineError::SubmissionFailure { source });
        }
    };
    drop(slot);
    info!(stage = %TxStage::Submitted, tx_hash = %hash, nonce, "Submitted {}", label);

    let receipt = wait_for_receipt(env, hash).await?;
    if !receipt.succeeded() {
        warn!(
            stage = %TxStage::Reverted,
            tx_hash = %hash,
            block = receipt.block_number,
            "{} reverted",
            label
        );
        return Err(PipelineError::ExecutionReverted {
            tx_hash: hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        });
    }
    info!(
        stage = %TxStage::Confirmed,
        tx_hash = %hash,
        block = receipt.block_number,
        gas_used = receipt.gas_used
    );
    Ok(receipt)
}

/// Poll for the receipt of `hash` until the Environment's confirmation
/// timeout. Use after `ConfirmationTimeout` to re-query instead of
/// resubmitting. The receipt is returned whatever its status.
pub async fn wait_for_receipt(env: &Environment, hash: TxHash) -> Result<Receipt, PipelineError> {
    let timeout = env.options().confirmation_timeout;
    let interval = env.options().poll_interval.max(Duration::from_millis(1));
    let poll = async {
        loop {
            match env.ledger().transaction_receipt(hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {}
                Err(e) => warn!("Receipt lookup for {} failed: {}", hash, e),
            }
            tokio::time::sleep(interval).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.map_err(|_| {
        warn!(tx_hash = %hash, "No receipt after {:?}", timeout);
        PipelineError::ConfirmationTimeout {
            tx_hash: hash,
            waited: timeout,
        }
    })
}
