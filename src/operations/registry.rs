//! Registry administration: assets and exchange adapters.

use super::policies::FunctionSignature;
use crate::abi::{utf8_to_bytes32, utf8_to_fixed, AbiValue, MethodSignature};
use crate::domain::{Address, ContractKind, Receipt, U256};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::guards::ensure_with;
use crate::pipeline::TransactionDescriptor;
use futures::future::BoxFuture;

pub const REGISTER_ASSET: MethodSignature = MethodSignature::new(
    "registerAsset(address,bytes32,bytes8,string,uint256,uint256[],bytes4[])",
);
pub const UPDATE_EXCHANGE_ADAPTER: MethodSignature =
    MethodSignature::new("updateExchangeAdapter(address,address,bool,bytes4[])");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterAssetArgs {
    pub asset: Address,
    pub name: String,
    /// At most 8 bytes of UTF-8.
    pub symbol: String,
    pub url: String,
    pub reserve_min: U256,
    pub standards: Vec<U256>,
    pub sigs: Vec<FunctionSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeAdapterArgs {
    pub exchange: Address,
    pub adapter: Address,
    pub takes_custody: bool,
    pub sigs: Vec<FunctionSignature>,
}

fn selectors(sigs: &[FunctionSignature]) -> AbiValue {
    AbiValue::Array(
        sigs.iter()
            .map(|sig| AbiValue::FixedBytes(sig.selector().to_vec()))
            .collect(),
    )
}

fn asset_guard<'a>(
    _env: &'a Environment,
    args: &'a RegisterAssetArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move {
        ensure_with(
            !args.asset.is_zero(),
            "Asset to register is not an address",
            args.asset,
        )
    })
}

fn asset_args<'a>(
    _env: &'a Environment,
    args: &'a RegisterAssetArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        Ok(vec![
            AbiValue::Address(args.asset),
            utf8_to_bytes32(&args.name)?,
            utf8_to_fixed(&args.symbol, 8)?,
            AbiValue::String(args.url.clone()),
            AbiValue::Uint(args.reserve_min),
            AbiValue::Array(args.standards.iter().copied().map(AbiValue::Uint).collect()),
            selectors(&args.sigs),
        ])
    })
}

pub fn register_asset_transaction() -> TransactionDescriptor<RegisterAssetArgs, Receipt> {
    TransactionDescriptor::<RegisterAssetArgs, _>::new(REGISTER_ASSET, ContractKind::Registry)
        .guard(asset_guard)
        .prepare(asset_args)
}

pub async fn register_asset(
    env: &Environment,
    registry: Address,
    args: &RegisterAssetArgs,
) -> Result<Receipt, PipelineError> {
    register_asset_transaction().execute(env, registry, args).await
}

fn adapter_guard<'a>(
    _env: &'a Environment,
    args: &'a ExchangeAdapterArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move {
        ensure_with(
            !args.exchange.is_zero(),
            "Exchange is not an address",
            args.exchange,
        )?;
        ensure_with(
            !args.adapter.is_zero(),
            "Adapter is not an address",
            args.adapter,
        )
    })
}

fn adapter_args<'a>(
    _env: &'a Environment,
    args: &'a ExchangeAdapterArgs,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move {
        Ok(vec![
            AbiValue::Address(args.exchange),
            AbiValue::Address(args.adapter),
            AbiValue::Bool(args.takes_custody),
            selectors(&args.sigs),
        ])
    })
}

pub fn update_exchange_adapter_transaction() -> TransactionDescriptor<ExchangeAdapterArgs, Receipt>
{
    TransactionDescriptor::<ExchangeAdapterArgs, _>::new(
        UPDATE_EXCHANGE_ADAPTER,
        ContractKind::Registry,
    )
    .guard(adapter_guard)
    .prepare(adapter_args)
}

pub async fn update_exchange_adapter(
    env: &Environment,
    registry: Address,
    args: &ExchangeAdapterArgs,
) -> Result<Receipt, PipelineError> {
    update_exchange_adapter_transaction()
        .execute(env, registry, args)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{decode, parse_types};

    #[test]
    fn test_register_asset_encodes() {
        let args = RegisterAssetArgs {
            asset: Address::from_bytes([0x11; 20]),
            name: "Melon Token".to_string(),
            symbol: "MLN".to_string(),
            url: "https://melonport.com".to_string(),
            reserve_min: U256::zero(),
            standards: vec![U256::from(20u64)],
            sigs: vec![FunctionSignature::MakeOrder],
        };
        let values = vec![
            AbiValue::Address(args.asset),
            utf8_to_bytes32(&args.name).unwrap(),
            utf8_to_fixed(&args.symbol, 8).unwrap(),
            AbiValue::String(args.url.clone()),
            AbiValue::Uint(args.reserve_min),
            AbiValue::Array(vec![AbiValue::Uint(U256::from(20u64))]),
            selectors(&args.sigs),
        ];
        let data = REGISTER_ASSET.encode_call(&values).unwrap();
        assert_eq!(&data[..4], &REGISTER_ASSET.selector());

        let types = parse_types("address,bytes32,bytes8,string,uint256,uint256[],bytes4[]").unwrap();
        let decoded = decode(&types, &data[4..]).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_symbol_wider_than_bytes8_rejected() {
        assert!(matches!(
            utf8_to_fixed("TOOLONGSYM", 8),
            Err(PipelineError::Encoding(_))
        ));
    }
}
