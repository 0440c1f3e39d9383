//! Operation descriptors and the read/write pipelines that run them.
//!
//! A descriptor is built once from a method signature, the kind of contract
//! it targets and up to three hooks, then executed many times against
//! different Environments, contracts and arguments. Hooks are plain function
//! pointers returning boxed futures, so descriptors are `Copy`-cheap to clone
//! and carry no state between invocations.

use crate::abi::AbiValue;
use crate::domain::{Address, Receipt};
use crate::environment::Environment;
use crate::error::PipelineError;
use futures::future::BoxFuture;
use std::fmt;

pub mod call;
pub mod deploy;
pub mod fees;
pub mod transaction;

pub use call::CallDescriptor;
pub use deploy::deploy_contract;
pub use fees::{compute_fees, Fees};
pub use transaction::{wait_for_receipt, TransactionDescriptor, TxOptions};

/// Precondition check run before anything is encoded or sent.
pub type GuardFn<A> =
    for<'a> fn(&'a Environment, &'a A, Address) -> BoxFuture<'a, Result<(), PipelineError>>;

/// Turns typed arguments into the ordered ledger arguments. May read state.
pub type PrepareFn<A> = for<'a> fn(
    &'a Environment,
    &'a A,
    Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>>;

/// Maps decoded return values of a read into a domain value.
pub type CallPostProcessFn<A, R> = for<'a> fn(
    &'a Environment,
    Vec<AbiValue>,
    &'a A,
    Address,
) -> BoxFuture<'a, Result<R, PipelineError>>;

/// Derives the result of a confirmed transaction, usually by re-reading state.
pub type TxPostProcessFn<A, R> = for<'a> fn(
    &'a Environment,
    Receipt,
    &'a A,
    Address,
) -> BoxFuture<'a, Result<R, PipelineError>>;

pub(crate) fn no_args<'a, A>(
    _env: &'a Environment,
    _args: &'a A,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async { Ok(Vec::new()) })
}

/// Write path states. Transitions are linear; the last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Created,
    Guarded,
    Prepared,
    FeeComputed,
    Estimated,
    Signed,
    Submitted,
    Confirmed,
    Reverted,
    Failed,
}

impl fmt::Display for TxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxStage::Created => "CREATED",
            TxStage::Guarded => "GUARDED",
            TxStage::Prepared => "PREPARED",
            TxStage::FeeComputed => "FEE_COMPUTED",
            TxStage::Estimated => "ESTIMATED",
            TxStage::Signed => "SIGNED",
            TxStage::Submitted => "SUBMITTED",
            TxStage::Confirmed => "CONFIRMED",
            TxStage::Reverted => "REVERTED",
            TxStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
