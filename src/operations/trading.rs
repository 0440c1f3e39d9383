//! Exchanges a fund's trading component is authorised to use.

use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{Address, ContractKind};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::pipeline::CallDescriptor;
use futures::future::BoxFuture;

pub const GET_EXCHANGE_INFO: MethodSignature = MethodSignature::new("getExchangeInfo()");

/// One exchange slot of a trading component, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeInfo {
    pub exchange: Address,
    pub adapter: Address,
    pub takes_custody: bool,
}

fn to_exchange_infos<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<ExchangeInfo>, PipelineError>> {
    Box::pin(async move {
        let exchanges = abi::output(&values, 0)?.as_array()?;
        let adapters = abi::output(&values, 1)?.as_array()?;
        let custody = abi::output(&values, 2)?.as_array()?;
        if adapters.len() != exchanges.len() || custody.len() != exchanges.len() {
            return Err(PipelineError::Decode(
                "exchange info arrays differ in length".to_string(),
            ));
        }

        exchanges
            .iter()
            .zip(adapters)
            .zip(custody)
            .map(|((exchange, adapter), takes_custody)| {
                Ok(ExchangeInfo {
                    exchange: exchange.as_address()?,
                    adapter: adapter.as_address()?,
                    takes_custody: takes_custody.as_bool()?,
                })
            })
            .collect()
    })
}

pub fn exchange_info_call() -> CallDescriptor<(), Vec<ExchangeInfo>> {
    CallDescriptor::<(), _>::new(
        GET_EXCHANGE_INFO,
        ContractKind::Trading,
        "address[],address[],bool[]",
    )
    .post_process(to_exchange_infos)
}

pub async fn get_exchange_info(
    env: &Environment,
    trading: Address,
) -> Result<Vec<ExchangeInfo>, PipelineError> {
    exchange_info_call().execute(env, trading, &()).await
}

/// Position of the named deployment exchange among the fund's authorised
/// exchanges. Matched on the adapter address.
pub async fn get_exchange_index(
    env: &Environment,
    trading: Address,
    exchange: &str,
) -> Result<usize, PipelineError> {
    let adapter = env.deployment().exchange(exchange)?.adapter;
    let infos = get_exchange_info(env, trading).await?;
    infos
        .iter()
        .position(|info| info.adapter == adapter)
        .ok_or_else(|| {
            PipelineError::guard(
                format!(
                    "Fund with trading {} does not authorize exchange with address {}",
                    trading, adapter
                ),
                Some(adapter.to_string()),
            )
        })
}

/// Names of the deployment exchanges the fund may trade on, sorted.
pub async fn get_allowed_exchanges(
    env: &Environment,
    trading: Address,
) -> Result<Vec<String>, PipelineError> {
    let infos = get_exchange_info(env, trading).await?;
    let mut names: Vec<String> = env
        .deployment()
        .exchanges
        .iter()
        .filter(|(_, config)| infos.iter().any(|info| info.adapter == config.adapter))
        .map(|(name, _)| name.clone())
        .collect();
    names.sort();
    Ok(names)
}
