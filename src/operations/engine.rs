//! Engine: amgu pricing and the frozen/liquid ether pools.

use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{create_quantity, Address, ContractKind, Quantity, Receipt};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::guards::ensure;
use crate::pipeline::{CallDescriptor, TransactionDescriptor};
use futures::future::BoxFuture;

pub const GET_AMGU_PRICE: MethodSignature = MethodSignature::new("getAmguPrice()");
pub const LIQUID_ETHER: MethodSignature = MethodSignature::new("liquidEther()");
pub const FROZEN_ETHER: MethodSignature = MethodSignature::new("frozenEther()");
pub const THAW: MethodSignature = MethodSignature::new("thaw()");

fn to_fee_quantity<'a>(
    env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<Quantity, PipelineError>> {
    Box::pin(async move {
        let amount = abi::output(&values, 0)?.as_uint()?;
        Ok(create_quantity(env.deployment().fee_token()?, amount))
    })
}

fn to_native_quantity<'a>(
    env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<Quantity, PipelineError>> {
    Box::pin(async move {
        let amount = abi::output(&values, 0)?.as_uint()?;
        Ok(create_quantity(env.deployment().native_token()?, amount))
    })
}

/// Fee-token amount charged per unit of gas.
pub fn amgu_price_call() -> CallDescriptor<(), Quantity> {
    CallDescriptor::<(), _>::new(GET_AMGU_PRICE, ContractKind::Engine, "uint256")
        .post_process(to_fee_quantity)
}

pub fn liquid_ether_call() -> CallDescriptor<(), Quantity> {
    CallDescriptor::<(), _>::new(LIQUID_ETHER, ContractKind::Engine, "uint256")
        .post_process(to_native_quantity)
}

pub fn frozen_ether_call() -> CallDescriptor<(), Quantity> {
    CallDescriptor::<(), _>::new(FROZEN_ETHER, ContractKind::Engine, "uint256")
        .post_process(to_native_quantity)
}

pub async fn get_amgu_price(env: &Environment, engine: Address) -> Result<Quantity, PipelineError> {
    amgu_price_call().execute(env, engine, &()).await
}

pub async fn get_liquid_ether(env: &Environment, engine: Address) -> Result<Quantity, PipelineError> {
    liquid_ether_call().execute(env, engine, &()).await
}

pub async fn get_frozen_ether(env: &Environment, engine: Address) -> Result<Quantity, PipelineError> {
    frozen_ether_call().execute(env, engine, &()).await
}

fn ensure_frozen_ether<'a>(
    env: &'a Environment,
    _args: &'a (),
    engine: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move {
        let frozen = get_frozen_ether(env, engine).await?;
        ensure(!frozen.is_zero(), "No frozen ether to thaw")
    })
}

/// Move frozen ether into the liquid pool.
pub fn thaw_transaction() -> TransactionDescriptor<(), Receipt> {
    TransactionDescriptor::<(), _>::new(THAW, ContractKind::Engine).guard(ensure_frozen_ether)
}

pub async fn thaw(env: &Environment, engine: Address) -> Result<Receipt, PipelineError> {
    thaw_transaction().execute(env, engine, &()).await
}
