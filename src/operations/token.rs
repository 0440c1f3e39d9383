//! Standard token reads and approvals.

use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{create_quantity, Address, ContractKind, Quantity, Receipt, Token};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::guards::{ensure, ensure_with};
use crate::pipeline::{CallDescriptor, TransactionDescriptor};
use futures::future::BoxFuture;

pub const SYMBOL: MethodSignature = MethodSignature::new("symbol()");
pub const DECIMALS: MethodSignature = MethodSignature::new("decimals()");
pub const BALANCE_OF: MethodSignature = MethodSignature::new("balanceOf(address)");
pub const ALLOWANCE: MethodSignature = MethodSignature::new("allowance(address,address)");
pub const INCREASE_APPROVAL: MethodSignature =
    MethodSignature::new("increaseApproval(address,uint256)");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceOfArgs {
    pub token: Token,
    pub owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceArgs {
    pub token: Token,
    pub owner: Address,
    pub spender: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncreaseApprovalArgs {
    pub how_much: Quantity,
    pub spender: Address,
}

fn first_string<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<String, PipelineError>> {
    Box::pin(async move { Ok(abi::output(&values, 0)?.as_str()?.to_string()) })
}

fn first_u8<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    _args: &'a (),
    _contract: Address,
) -> BoxFuture<'a, Result<u8, PipelineError>> {
    Box::pin(async move {
        let n = abi::output(&values, 0)?.as_u64()?;
        u8::try_from(n).map_err(|_| PipelineError::Decode(format!("decimals {} out of range", n)))
    })
}

pub fn symbol_call() -> CallDescriptor<(), String> {
    CallDescriptor::<(), _>::new(SYMBOL, ContractKind::StandardToken, "string")
        .post_process(first_string)
}

pub fn decimals_call() -> CallDescriptor<(), u8> {
    CallDescriptor::<(), _>::new(DECIMALS, ContractKind::StandardToken, "uint8")
        .post_process(first_u8)
}

/// Token descriptor read from the token contract itself.
pub async fn get_token(env: &Environment, address: Address) -> Result<Token, PipelineError> {
    let symbol = symbol_call().execute(env, address, &()).await?;
    let decimals = decimals_call().execute(env, address, &()).await?;
    Ok(Token::new(symbol, address, decimals))
}

fn balance_of_args<'a>(
    _env: &'a Environment,
    args: &'a BalanceOfArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move { Ok(vec![AbiValue::Address(args.owner)]) })
}

fn balance_quantity<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    args: &'a BalanceOfArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Quantity, PipelineError>> {
    Box::pin(async move {
        let amount = abi::output(&values, 0)?.as_uint()?;
        Ok(create_quantity(args.token.clone(), amount))
    })
}

pub fn balance_of_call() -> CallDescriptor<BalanceOfArgs, Quantity> {
    CallDescriptor::<BalanceOfArgs, _>::new(BALANCE_OF, ContractKind::StandardToken, "uint256")
        .prepare(balance_of_args)
        .post_process(balance_quantity)
}

pub async fn balance_of(
    env: &Environment,
    token: &Token,
    owner: Address,
) -> Result<Quantity, PipelineError> {
    let args = BalanceOfArgs {
        token: token.clone(),
        owner,
    };
    balance_of_call().execute(env, token.address, &args).await
}

fn allowance_args<'a>(
    _env: &'a Environment,
    args: &'a AllowanceArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        Ok(vec![
            AbiValue::Address(args.owner),
            AbiValue::Address(args.spender),
        ])
    })
}

fn allowance_quantity<'a>(
    _env: &'a Environment,
    values: Vec<AbiValue>,
    args: &'a AllowanceArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Quantity, PipelineError>> {
    Box::pin(async move {
        let amount = abi::output(&values, 0)?.as_uint()?;
        Ok(create_quantity(args.token.clone(), amount))
    })
}

pub fn allowance_call() -> CallDescriptor<AllowanceArgs, Quantity> {
    CallDescriptor::<AllowanceArgs, _>::new(ALLOWANCE, ContractKind::StandardToken, "uint256")
        .prepare(allowance_args)
        .post_process(allowance_quantity)
}

pub async fn allowance(
    env: &Environment,
    token: &Token,
    owner: Address,
    spender: Address,
) -> Result<Quantity, PipelineError> {
    let args = AllowanceArgs {
        token: token.clone(),
        owner,
        spender,
    };
    allowance_call().execute(env, token.address, &args).await
}

/// Guard helper: the Environment's signer has approved at least `how_much`
/// for `spender`.
pub async fn ensure_allowance(
    env: &Environment,
    how_much: &Quantity,
    spender: Address,
) -> Result<(), PipelineError> {
    let owner = env.require_wallet()?.address();
    let approved = allowance(env, &how_much.token, owner, spender).await?;
    ensure_with(
        approved.compare(how_much)?.is_ge(),
        format!(
            "Insufficient allowance for {}: {} approved, {} required",
            spender, approved, how_much
        ),
        spender,
    )
}

fn approval_guard<'a>(
    _env: &'a Environment,
    args: &'a IncreaseApprovalArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move {
        ensure_with(
            !args.spender.is_zero(),
            format!("Spender is not an address. Got: {}", args.spender),
            args.spender,
        )?;
        ensure(
            !args.how_much.token.address.is_zero(),
            format!(
                "Token needs to have an address. Got: {}",
                args.how_much.token.address
            ),
        )
    })
}

fn approval_args<'a>(
    _env: &'a Environment,
    args: &'a IncreaseApprovalArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        Ok(vec![
            AbiValue::Address(args.spender),
            AbiValue::Uint(args.how_much.quantity),
        ])
    })
}

pub fn increase_approval_transaction() -> TransactionDescriptor<IncreaseApprovalArgs, Receipt> {
    TransactionDescriptor::<IncreaseApprovalArgs, _>::new(
        INCREASE_APPROVAL,
        ContractKind::StandardToken,
    )
    .guard(approval_guard)
    .prepare(approval_args)
}

/// Approve `spender` for `how_much` more of its token. The token contract is
/// the quantity's token address.
pub async fn increase_approval(
    env: &Environment,
    args: &IncreaseApprovalArgs,
) -> Result<Receipt, PipelineError> {
    increase_approval_transaction()
        .execute(env, args.how_much.token.address, args)
        .await
}
