//! Investing in a fund: share pricing, investment requests.

use super::hub::{ensure_is_not_shut_down, get_hub, get_routes};
use super::prices::whole_unit;
use super::token::{ensure_allowance, get_token};
use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{
    create_price, create_quantity, greater_than, is_equal, value_in, Address, ContractKind, Price,
    Quantity, Receipt, Token,
};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::guards::ensure;
use crate::pipeline::{CallDescriptor, TransactionDescriptor, TxOptions};
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;

pub const GET_SHARE_COST_IN_ASSET: MethodSignature =
    MethodSignature::new("getShareCostInAsset(uint256,address)");
pub const REQUESTS: MethodSignature = MethodSignature::new("requests(address)");
pub const REQUEST_INVESTMENT: MethodSignature =
    MethodSignature::new("requestInvestment(uint256,uint256,address)");

/// Gas cap for investment requests.
pub const REQUEST_INVESTMENT_GAS: u64 = 7_500_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCostArgs {
    pub asset_token: Token,
    pub fund_token: Token,
}

/// Pending investment of one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvestmentRequest {
    pub investment_amount: Quantity,
    pub requested_shares: Quantity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInvestmentArgs {
    pub investment_amount: Quantity,
    pub requested_shares: Quantity,
}

fn share_cost_args<'a>(
    _env: &'a Environment,
    args: &'a ShareCostArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        Ok(vec![
            AbiValue::Uint(whole_unit(&args.fund_token)?),
            AbiValue::Address(args.asset_token.address),
        ])
    })
}

fn to_share_price<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    args: &'a ShareCostArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Price, PipelineError>> {
    Box::pin(async move {
        let cost = abi::output(&values, 0)?.as_uint()?;
        Ok(create_price(
            create_quantity(args.fund_token.clone(), whole_unit(&args.fund_token)?),
            create_quantity(args.asset_token.clone(), cost),
        ))
    })
}

/// Price of one whole fund share in the given asset.
pub fn share_cost_call() -> CallDescriptor<ShareCostArgs, Price> {
    CallDescriptor::<ShareCostArgs, _>::new(
        GET_SHARE_COST_IN_ASSET,
        ContractKind::Accounting,
        "uint256",
    )
    .prepare(share_cost_args)
    .post_process(to_share_price)
}

pub async fn get_share_cost_in_asset(
    env: &Environment,
    accounting: Address,
    args: &ShareCostArgs,
) -> Result<Price, PipelineError> {
    share_cost_call().execute(env, accounting, args).await
}

fn of_arg<'a>(
    _env: &'a Environment,
    of: &'a Address,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move { Ok(vec![AbiValue::Address(*of)]) })
}

fn to_request<'a>(
    env: &'a Environment,
    values: Vec<AbiValue>,
    _of: &'a Address,
    participation: Address,
) -> BoxFuture<'a, Result<Option<InvestmentRequest>, PipelineError>> {
    Box::pin(async move {
        let asset = abi::output(&values, 0)?.as_address()?;
        let amount = abi::output(&values, 1)?.as_uint()?;
        let shares = abi::output(&values, 2)?.as_uint()?;
        let timestamp = abi::output(&values, 3)?.as_u64()?;
        if timestamp == 0 && shares.is_zero() {
            return Ok(None);
        }

        let asset_token = env.deployment().token_by_address(asset)?;
        let hub = get_hub(env, participation).await?;
        let routes = get_routes(env, hub).await?;
        let fund_token = get_token(env, routes.shares).await?;
        let seconds = i64::try_from(timestamp)
            .map_err(|_| PipelineError::Decode(format!("timestamp {} out of range", timestamp)))?;
        let timestamp = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| PipelineError::Decode(format!("invalid timestamp {}", seconds)))?;

        Ok(Some(InvestmentRequest {
            investment_amount: create_quantity(asset_token, amount),
            requested_shares: create_quantity(fund_token, shares),
            timestamp,
        }))
    })
}

/// Pending request of the argument address, `None` if it has none.
pub fn request_call() -> CallDescriptor<Address, Option<InvestmentRequest>> {
    CallDescriptor::<Address, _>::new(
        REQUESTS,
        ContractKind::Participation,
        "address,uint256,uint256,uint256",
    )
    .prepare(of_arg)
    .post_process(to_request)
}

pub async fn get_request(
    env: &Environment,
    participation: Address,
    of: Address,
) -> Result<Option<InvestmentRequest>, PipelineError> {
    request_call().execute(env, participation, &of).await
}

fn investment_guard<'a>(
    env: &'a Environment,
    args: &'a RequestInvestmentArgs,
    participation: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move {
        let hub = get_hub(env, participation).await?;
        ensure_is_not_shut_down(env, hub).await?;
        ensure_allowance(env, &args.investment_amount, participation).await
    })
}

fn investment_args<'a>(
    env: &'a Environment,
    args: &'a RequestInvestmentArgs,
    participation: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        let hub = get_hub(env, participation).await?;
        let routes = get_routes(env, hub).await?;
        let fund_token = get_token(env, routes.shares).await?;
        let share_price = get_share_cost_in_asset(
            env,
            routes.accounting,
            &ShareCostArgs {
                asset_token: args.investment_amount.token.clone(),
                fund_token,
            },
        )
        .await?;

        let price_for_shares = value_in(&share_price, &args.requested_shares)?;
        let enough = greater_than(&args.investment_amount, &price_for_shares)?
            || is_equal(&args.investment_amount, &price_for_shares)?;
        ensure(
            enough,
            format!(
                "Investment asset quantity provided is not enough to purchase {} shares. Share price for {}: {}",
                args.requested_shares.to_fixed(),
                args.investment_amount.token.symbol,
                share_price.to_fixed()
            ),
        )?;

        Ok(vec![
            AbiValue::Uint(args.requested_shares.quantity),
            AbiValue::Uint(args.investment_amount.quantity),
            AbiValue::Address(args.investment_amount.token.address),
        ])
    })
}

fn reread_request<'a>(
    env: &'a Environment,
    _receipt: Receipt,
    _args: &'a RequestInvestmentArgs,
    participation: Address,
) -> BoxFuture<'a, Result<InvestmentRequest, PipelineError>> {
    Box::pin(async move {
        let of = env.require_wallet()?.address();
        get_request(env, participation, of).await?.ok_or_else(|| {
            PipelineError::Decode(format!("no pending request for {} after confirmation", of))
        })
    })
}

/// Ask to buy `requested_shares` for at most `investment_amount`. Pays the
/// amgu fee and the execution incentive.
pub fn request_investment_transaction(
) -> TransactionDescriptor<RequestInvestmentArgs, InvestmentRequest> {
    TransactionDescriptor::<RequestInvestmentArgs, _>::new(
        REQUEST_INVESTMENT,
        ContractKind::Participation,
    )
    .guard(investment_guard)
    .prepare(investment_args)
    .options(TxOptions {
        gas_limit: Some(REQUEST_INVESTMENT_GAS),
        amgu_payable: true,
        incentive: true,
        ..TxOptions::default()
    })
    .post_process(reread_request)
}

pub async fn request_investment(
    env: &Environment,
    participation: Address,
    args: &RequestInvestmentArgs,
) -> Result<InvestmentRequest, PipelineError> {
    request_investment_transaction()
        .execute(env, participation, args)
        .await
}
