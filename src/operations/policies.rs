//! Policy registration and the trading method signatures policies attach to.

use crate::abi::{AbiValue, MethodSignature};
use crate::domain::{Address, ContractKind, Receipt};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::guards::ensure_with;
use crate::pipeline::TransactionDescriptor;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BATCH_REGISTER: MethodSignature =
    MethodSignature::new("batchRegister(bytes4[],address[])");

/// Fund methods a policy can be registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FunctionSignature {
    MakeOrder,
    TakeOrder,
    CancelOrder,
    WithdrawTokens,
    RequestInvestment,
    ExecuteRequest,
}

impl FunctionSignature {
    pub fn signature(&self) -> MethodSignature {
        match self {
            FunctionSignature::MakeOrder => MethodSignature::new(
                "makeOrder(address,address[6],uint256[8],bytes32,bytes,bytes,bytes)",
            ),
            FunctionSignature::TakeOrder => MethodSignature::new(
                "takeOrder(address,address[6],uint256[8],bytes32,bytes,bytes,bytes)",
            ),
            FunctionSignature::CancelOrder => MethodSignature::new(
                "cancelOrder(address,address[6],uint256[8],bytes32,bytes,bytes,bytes)",
            ),
            FunctionSignature::WithdrawTokens => MethodSignature::new(
                "withdrawTokens(address,address[6],uint256[8],bytes32,bytes,bytes,bytes)",
            ),
            FunctionSignature::RequestInvestment => {
                MethodSignature::new("requestInvestment(uint256,uint256,address)")
            }
            FunctionSignature::ExecuteRequest => MethodSignature::new("executeRequest()"),
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        self.signature().selector()
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// A policy contract checked whenever `method` is called on the fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyRegistration {
    pub method: FunctionSignature,
    pub policy: Address,
}

fn registration_guard<'a>(
    _env: &'a Environment,
    registrations: &'a Vec<PolicyRegistration>,
    _contract: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move {
        for registration in registrations {
            ensure_with(
                !registration.policy.is_zero(),
                format!("Policy for {} is not an address", registration.method),
                registration.policy,
            )?;
        }
        Ok(())
    })
}

/// Two parallel arrays of equal length: selectors and policy addresses.
fn registration_args<'a>(
    _env: &'a Environment,
    registrations: &'a Vec<PolicyRegistration>,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        let (selectors, policies) = registrations
            .iter()
            .map(|r| {
                (
                    AbiValue::FixedBytes(r.method.selector().to_vec()),
                    AbiValue::Address(r.policy),
                )
            })
            .unzip();
        Ok(vec![AbiValue::Array(selectors), AbiValue::Array(policies)])
    })
}

pub fn register_policies_transaction() -> TransactionDescriptor<Vec<PolicyRegistration>, Receipt> {
    TransactionDescriptor::<Vec<PolicyRegistration>, _>::new(
        BATCH_REGISTER,
        ContractKind::PolicyManager,
    )
    .guard(registration_guard)
    .prepare(registration_args)
}

pub async fn register_policies(
    env: &Environment,
    policy_manager: Address,
    registrations: &[PolicyRegistration],
) -> Result<Receipt, PipelineError> {
    register_policies_transaction()
        .execute(env, policy_manager, &registrations.to_vec())
        .await
}
