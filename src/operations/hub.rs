//! Fund hub: resolving a fund's components and its shutdown flag.

use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{Address, ContractKind};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::guards::ensure_with;
use crate::pipeline::CallDescriptor;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub const HUB: MethodSignature = MethodSignature::new("hub()");
pub const ROUTES: MethodSignature = MethodSignature::new("routes()");
pub const IS_SHUT_DOWN: MethodSignature = MethodSignature::new("isShutDown()");

const ROUTES_RETURNS: &str =
    "address,address,address,address,address,address,address,address,address,address,address,address";

/// Component addresses of one fund, as registered on its hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routes {
    pub accounting: Address,
    pub fee_manager: Address,
    pub participation: Address,
    pub policy_manager: Address,
    pub shares: Address,
    pub trading: Address,
    pub vault: Address,
    pub price_source: Address,
    pub registry: Address,
    pub version: Address,
    pub engine: Address,
    pub mln_token: Address,
}

fn first_address<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<Address, PipelineError>> {
    Box::pin(async move { abi::output(&values, 0)?.as_address() })
}

fn first_bool<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<bool, PipelineError>> {
    Box::pin(async move { abi::output(&values, 0)?.as_bool() })
}

fn to_routes<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<Routes, PipelineError>> {
    Box::pin(async move {
        let at = |i: usize| abi::output(&values, i).and_then(AbiValue::as_address);
        Ok(Routes {
            accounting: at(0)?,
            fee_manager: at(1)?,
            participation: at(2)?,
            policy_manager: at(3)?,
            shares: at(4)?,
            trading: at(5)?,
            vault: at(6)?,
            price_source: at(7)?,
            registry: at(8)?,
            version: at(9)?,
            engine: at(10)?,
            mln_token: at(11)?,
        })
    })
}

/// Hub of the fund any component (participation, accounting, ...) belongs to.
pub fn hub_call() -> CallDescriptor<(), Address> {
    CallDescriptor::<(), _>::new(HUB, ContractKind::Participation, "address")
        .post_process(first_address)
}

pub fn routes_call() -> CallDescriptor<(), Routes> {
    CallDescriptor::<(), _>::new(ROUTES, ContractKind::Hub, ROUTES_RETURNS).post_process(to_routes)
}

pub fn is_shut_down_call() -> CallDescriptor<(), bool> {
    CallDescriptor::<(), _>::new(IS_SHUT_DOWN, ContractKind::Hub, "bool").post_process(first_bool)
}

pub async fn get_hub(env: &Environment, component: Address) -> Result<Address, PipelineError> {
    hub_call().execute(env, component, &()).await
}

pub async fn get_routes(env: &Environment, hub: Address) -> Result<Routes, PipelineError> {
    routes_call().execute(env, hub, &()).await
}

pub async fn is_shut_down(env: &Environment, hub: Address) -> Result<bool, PipelineError> {
    is_shut_down_call().execute(env, hub, &()).await
}

/// Guard helper: the fund behind `hub` still accepts operations.
pub async fn ensure_is_not_shut_down(env: &Environment, hub: Address) -> Result<(), PipelineError> {
    let shut_down = is_shut_down(env, hub).await?;
    ensure_with(!shut_down, format!("Fund with hub address {} is shut down", hub), hub)
}
