//! Fund ranking: every fund of a version with its share price.

use super::prices::whole_unit;
use crate::abi::{self, bytes32_to_utf8, AbiValue, MethodSignature};
use crate::domain::{create_price, create_quantity, Address, ContractKind, Price, Token};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::pipeline::CallDescriptor;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;
use std::cmp::Ordering;

pub const GET_FUND_DETAILS: MethodSignature = MethodSignature::new("getFundDetails(address)");

/// Fund shares always carry 18 decimals.
pub const FUND_SHARE_DECIMALS: u8 = 18;
pub const FUND_SHARE_SYMBOL: &str = "MLNF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundDetails {
    pub address: Address,
    pub name: String,
    pub creation_time: DateTime<Utc>,
    /// Denomination asset per whole share.
    pub share_price: Price,
    /// 1 for the highest share price.
    pub rank: usize,
}

fn version_arg<'a>(
    _env: &'a Environment,
    version: &'a Address,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move { Ok(vec![AbiValue::Address(*version)]) })
}

fn to_ranked_funds<'a>(
    env: &'a Environment,
    values: Vec<AbiValue>,
    _version: &'a Address,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<FundDetails>, PipelineError>> {
    Box::pin(async move {
        let addresses = abi::output(&values, 0)?.as_array()?;
        let share_prices = abi::output(&values, 1)?.as_array()?;
        let creation_times = abi::output(&values, 2)?.as_array()?;
        let names = abi::output(&values, 3)?.as_array()?;
        let denominations = abi::output(&values, 4)?.as_array()?;

        let count = addresses.len();
        if [share_prices.len(), creation_times.len(), names.len(), denominations.len()]
            .iter()
            .any(|len| *len != count)
        {
            return Err(PipelineError::Decode(
                "fund detail arrays differ in length".to_string(),
            ));
        }

        let mut funds = Vec::with_capacity(count);
        for i in 0..count {
            let address = addresses[i].as_address()?;
            let denomination = env
                .deployment()
                .token_by_address(denominations[i].as_address()?)?;
            let fund_token = Token::new(FUND_SHARE_SYMBOL, address, FUND_SHARE_DECIMALS);
            let seconds = i64::try_from(creation_times[i].as_u64()?)
                .map_err(|_| PipelineError::Decode("creation time out of range".to_string()))?;
            let creation_time = Utc
                .timestamp_opt(seconds, 0)
                .single()
                .ok_or_else(|| PipelineError::Decode(format!("invalid timestamp {}", seconds)))?;

            funds.push(FundDetails {
                address,
                name: bytes32_to_utf8(names[i].as_bytes()?)?,
                creation_time,
                share_price: create_price(
                    create_quantity(fund_token.clone(), whole_unit(&fund_token)?),
                    create_quantity(denomination, share_prices[i].as_uint()?),
                ),
                rank: 0,
            });
        }

        rank_by_share_price(&mut funds)?;
        Ok(funds)
    })
}

/// Sort by share price, highest first, and number the ranks from 1. Funds
/// with equal prices keep their ledger order. Prices in different
/// denomination assets cannot be ranked against each other.
pub fn rank_by_share_price(funds: &mut [FundDetails]) -> Result<(), PipelineError> {
    let mut failure = None;
    funds.sort_by(|a, b| match b.share_price.quote.compare(&a.share_price.quote) {
        Ok(ordering) => ordering,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = failure {
        return Err(e.into());
    }
    for (i, fund) in funds.iter_mut().enumerate() {
        fund.rank = i + 1;
    }
    Ok(())
}

pub fn fund_details_call() -> CallDescriptor<Address, Vec<FundDetails>> {
    CallDescriptor::<Address, _>::new(
        GET_FUND_DETAILS,
        ContractKind::FundRanking,
        "address[],uint256[],uint256[],bytes32[],address[]",
    )
    .prepare(version_arg)
    .post_process(to_ranked_funds)
}

/// Funds of the deployment's version, ranked by the deployment's ranking
/// contract.
pub async fn get_fund_details(env: &Environment) -> Result<Vec<FundDetails>, PipelineError> {
    let ranking = env.address_of(ContractKind::FundRanking)?;
    let version = env.address_of(ContractKind::Version)?;
    get_fund_details_at(env, ranking, version).await
}

pub async fn get_fund_details_at(
    env: &Environment,
    ranking: Address,
    version: Address,
) -> Result<Vec<FundDetails>, PipelineError> {
    fund_details_call().execute(env, ranking, &version).await
}
