//! Protocol usage fee ("amgu") and execution incentive.
//!
//! The fee is priced per unit of gas in the fee token and paid in the native
//! token: `value_in(price(fee → native), amgu_price × footprint)`, floor
//! rounded. Both amounts travel as attached value, never deducted elsewhere.

use crate::abi::MethodSignature;
use crate::domain::{value_in, Address, ContractKind, U256, ValueError};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::ledger::CallRequest;
use crate::operations::{engine, prices};
use tracing::debug;

use super::TxOptions;

/// Native-token amounts attached to a transaction on top of its own value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fees {
    pub amgu: U256,
    pub incentive: U256,
}

impl Fees {
    /// `value + amgu + incentive`.
    pub fn total(&self, value: U256) -> Result<U256, PipelineError> {
        value
            .checked_add(self.amgu)
            .and_then(|v| v.checked_add(self.incentive))
            .ok_or(PipelineError::Value(ValueError::Overflow))
    }
}

pub async fn compute_fees(
    env: &Environment,
    contract: Address,
    method: MethodSignature,
    data: &[u8],
    options: &TxOptions,
) -> Result<Fees, PipelineError> {
    let mut fees = Fees::default();

    if options.amgu_payable {
        let footprint_request = CallRequest {
            from: env.wallet_address(),
            to: Some(contract),
            data: data.to_vec(),
            value: U256::zero(),
        };
        let footprint = env
            .ledger()
            .estimate_gas(&footprint_request)
            .await
            .map_err(|source| PipelineError::EstimationFailed {
                method: method.to_string(),
                source,
            })?;

        let engine_address = env.address_of(ContractKind::Engine)?;
        let amgu_price = engine::get_amgu_price(env, engine_address).await?;
        let price_source = env.address_of(ContractKind::PriceSource)?;
        let fee_token = env.deployment().fee_token()?;
        let price = prices::get_price(env, price_source, &fee_token).await?;

        let fee_in_fee_token = amgu_price.checked_mul_scalar(footprint)?;
        fees.amgu = value_in(&price, &fee_in_fee_token)?.quantity;
        debug!(
            "amgu fee: footprint {} x {} = {} ({} native)",
            footprint, amgu_price, fee_in_fee_token, fees.amgu
        );
    }

    if options.incentive {
        fees.incentive = env.options().incentive;
    }

    Ok(fees)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_adds_and_checks_overflow() {
        let fees = Fees {
            amgu: U256::from(5u64),
            incentive: U256::from(7u64),
        };
        assert_eq!(fees.total(U256::from(100u64)).unwrap(), U256::from(112u64));

        let err = fees.total(U256::MAX).unwrap_err();
        assert!(matches!(err, PipelineError::Value(ValueError::Overflow)));
    }
}
