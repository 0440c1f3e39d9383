//! Read path: guard, prepare, query, decode, post-process.

use super::{no_args, CallPostProcessFn, GuardFn, PrepareFn};
use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{Address, ContractKind, U256};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::ledger::CallRequest;
use futures::future::BoxFuture;
use tracing::{debug, info_span, Instrument};

fn passthrough<'a, A>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a A,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move { Ok(values) })
}

/// Read-only ledger query template.
pub struct CallDescriptor<A, R> {
    method: MethodSignature,
    kind: ContractKind,
    returns: &'static str,
    guard: Option<GuardFn<A>>,
    prepare: PrepareFn<A>,
    post_process: CallPostProcessFn<A, R>,
}

impl<A, R> Clone for CallDescriptor<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for CallDescriptor<A, R> {}

impl<A: Sync> CallDescriptor<A, Vec<AbiValue>> {
    /// `returns` is the comma-separated list of declared return types,
    /// e.g. `"uint256,uint256"`. Without further hooks the call takes no
    /// arguments and yields the decoded values.
    pub fn new(method: MethodSignature, kind: ContractKind, returns: &'static str) -> Self {
        Self {
            method,
            kind,
            returns,
            guard: None,
            prepare: no_args::<A>,
            post_process: passthrough::<A>,
        }
    }
}

impl<A: Sync, R: Send> CallDescriptor<A, R> {
    pub fn guard(mut self, guard: GuardFn<A>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn prepare(mut self, prepare: PrepareFn<A>) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn post_process<S>(self, post_process: CallPostProcessFn<A, S>) -> CallDescriptor<A, S> {
        CallDescriptor {
            method: self.method,
            kind: self.kind,
            returns: self.returns,
            guard: self.guard,
            prepare: self.prepare,
            post_process,
        }
    }

    pub fn method(&self) -> MethodSignature {
        self.method
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    /// Run the read against `contract`. Nothing is signed or paid.
    pub async fn execute(
        &self,
        env: &Environment,
        contract: Address,
        args: &A,
    ) -> Result<R, PipelineError> {
        let span = info_span!(
            "call",
            method = self.method.name(),
            kind = %self.kind,
            contract = %contract,
            session = %env.session()
        );
        async move {
            if let Some(guard) = self.guard {
                guard(env, args, contract).await?;
            }
            let values = (self.prepare)(env, args, contract).await?;
            let data = self.method.encode_call(&values)?;

            let request = CallRequest {
                from: env.wallet_address(),
                to: Some(contract),
                data,
                value: U256::zero(),
            };
            let output = env
                .ledger()
                .call(&request)
                .await
                .map_err(|source| PipelineError::CallFailed {
                    method: self.method.to_string(),
                    contract,
                    source,
                })?;
            debug!("{} returned {} bytes", self.method, output.len());

            let types = abi::parse_types(self.returns)?;
            let decoded = abi::decode(&types, &output)?;
            (self.post_process)(env, decoded, args, contract).await
        }
        .instrument(span)
        .await
    }

    /// Run against the deployment's registered contract of this kind.
    pub async fn execute_registered(&self, env: &Environment, args: &A) -> Result<R, PipelineError> {
        let contract = env.address_of(self.kind)?;
        self.execute(env, contract, args).await
    }
}
