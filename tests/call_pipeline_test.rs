//! Read path against the mock ledger.

use fundline::abi::{utf8_to_bytes32, AbiValue, MethodSignature};
use fundline::domain::{Address, ContractKind, Token, U256};
use fundline::environment::{Deployment, Environment, ExchangeConfig, Options};
use fundline::ledger::MockLedger;
use fundline::operations::engine::{get_liquid_ether, LIQUID_ETHER};
use fundline::operations::participation::{get_request, REQUESTS};
use fundline::operations::prices::{get_price, GET_PRICE};
use fundline::operations::ranking::{get_fund_details, GET_FUND_DETAILS};
use fundline::operations::token::{balance_of, get_token, BALANCE_OF, DECIMALS, SYMBOL};
use fundline::operations::trading::{get_allowed_exchanges, get_exchange_index, GET_EXCHANGE_INFO};
use fundline::operations::increase_time;
use fundline::pipeline::CallDescriptor;
use fundline::{create_quantity, ensure, PipelineError};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

const ENGINE: u8 = 0xe1;
const PRICE_SOURCE: u8 = 0xe2;
const RANKING: u8 = 0xe3;
const VERSION: u8 = 0xe4;
const MLN: u8 = 0xa1;
const WETH: u8 = 0xa2;
const TRADING: u8 = 0xb6;

const ONE: u64 = 1_000_000_000_000_000_000;

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn weth() -> Token {
    Token::new("WETH", addr(WETH), 18)
}

fn deployment() -> Deployment {
    let mut contracts = HashMap::new();
    contracts.insert(ContractKind::Engine, addr(ENGINE));
    contracts.insert(ContractKind::PriceSource, addr(PRICE_SOURCE));
    contracts.insert(ContractKind::FundRanking, addr(RANKING));
    contracts.insert(ContractKind::Version, addr(VERSION));
    let mut exchanges = HashMap::new();
    exchanges.insert(
        "OasisDex".to_string(),
        ExchangeConfig {
            exchange: addr(0xd1),
            adapter: addr(0xd2),
            takes_custody: true,
        },
    );
    exchanges.insert(
        "ZeroExV2".to_string(),
        ExchangeConfig {
            exchange: addr(0xd3),
            adapter: addr(0xd4),
            takes_custody: false,
        },
    );
    exchanges.insert(
        "KyberNetwork".to_string(),
        ExchangeConfig {
            exchange: addr(0xd5),
            adapter: addr(0xd6),
            takes_custody: false,
        },
    );
    Deployment {
        contracts,
        tokens: vec![Token::new("MLN", addr(MLN), 18), weth()],
        exchanges,
        fee_token: "MLN".to_string(),
        native_token: "WETH".to_string(),
    }
}

fn env_for(ledger: &Arc<MockLedger>) -> Environment {
    Environment::new(ledger.clone(), deployment(), Options::default())
}

#[tokio::test]
async fn test_get_token_reads_symbol_and_decimals() {
    let ledger = Arc::new(
        MockLedger::new()
            .with_call_values(addr(MLN), SYMBOL, "string", vec![AbiValue::String("MLN".to_string())])
            .with_call_values(addr(MLN), DECIMALS, "uint8", vec![AbiValue::Uint(U256::from(18u64))]),
    );
    let env = env_for(&ledger);

    let token = tokio_test::assert_ok!(get_token(&env, addr(MLN)).await);

    assert_eq!(token, Token::new("MLN", addr(MLN), 18));
    assert_eq!(ledger.calls().len(), 2);
}

#[tokio::test]
async fn test_balance_of_keeps_full_precision() {
    // 2^200 + 1 does not survive a round trip through a float
    let raw = (U256::one() << 200) + U256::one();
    let ledger = Arc::new(MockLedger::new().with_call_values(
        addr(WETH),
        BALANCE_OF,
        "uint256",
        vec![AbiValue::Uint(raw)],
    ));
    let env = env_for(&ledger);

    let balance = balance_of(&env, &weth(), addr(0x42)).await.unwrap();

    assert_eq!(balance, create_quantity(weth(), raw));
    let request = &ledger.calls()[0];
    assert_eq!(request.to, Some(addr(WETH)));
    assert_eq!(&request.data[..4], &BALANCE_OF.selector());
    assert_eq!(&request.data[4 + 12..], addr(0x42).as_bytes());
}

#[tokio::test]
async fn test_get_price_is_per_whole_token() {
    let ledger = Arc::new(MockLedger::new().with_call_values(
        addr(PRICE_SOURCE),
        GET_PRICE,
        "uint256,uint256",
        vec![
            AbiValue::Uint(U256::from(ONE / 4)),
            AbiValue::Uint(U256::from(1_540_000_000u64)),
        ],
    ));
    let env = env_for(&ledger);
    let mln = env.deployment().fee_token().unwrap();

    let price = get_price(&env, addr(PRICE_SOURCE), &mln).await.unwrap();

    assert_eq!(price.base, create_quantity(mln, ONE));
    assert_eq!(price.quote, create_quantity(weth(), ONE / 4));
}

#[tokio::test]
async fn test_call_revert_surfaces_as_call_failed() {
    let ledger = Arc::new(MockLedger::new().with_call_revert(addr(ENGINE), LIQUID_ETHER));
    let env = env_for(&ledger);

    let err = get_liquid_ether(&env, addr(ENGINE)).await.unwrap_err();

    match err {
        PipelineError::CallFailed { contract, source, .. } => {
            assert_eq!(contract, addr(ENGINE));
            assert!(source.is_revert());
        }
        other => panic!("expected CallFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_short_output_is_decode_error() {
    let ledger = Arc::new(MockLedger::new().with_call_response(
        addr(ENGINE),
        LIQUID_ETHER,
        vec![0u8; 7],
    ));
    let env = env_for(&ledger);

    let err = tokio_test::assert_err!(get_liquid_ether(&env, addr(ENGINE)).await);

    assert!(matches!(err, PipelineError::Decode(_)));
}

fn reject_zero<'a>(
    _env: &'a Environment,
    owner: &'a Address,
    _contract: Address,
) -> BoxFuture<'a, Result<(), PipelineError>> {
    Box::pin(async move { ensure(!owner.is_zero(), "owner must be set") })
}

#[tokio::test]
async fn test_call_guard_prevents_query() {
    let ledger = Arc::new(MockLedger::new());
    let env = env_for(&ledger);
    let call = CallDescriptor::<Address, _>::new(
        MethodSignature::new("owner()"),
        ContractKind::Engine,
        "address",
    )
    .guard(reject_zero);

    let err = call.execute_registered(&env, &Address::from_bytes([0; 20])).await.unwrap_err();

    assert!(matches!(err, PipelineError::GuardViolation { .. }));
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn test_execute_registered_targets_deployment_address() {
    let ledger = Arc::new(MockLedger::new().with_call_values(
        addr(ENGINE),
        LIQUID_ETHER,
        "uint256",
        vec![AbiValue::Uint(U256::from(9u64))],
    ));
    let env = env_for(&ledger);

    let raw = CallDescriptor::<(), _>::new(LIQUID_ETHER, ContractKind::Engine, "uint256")
        .execute_registered(&env, &())
        .await
        .unwrap();

    assert_eq!(raw, vec![AbiValue::Uint(U256::from(9u64))]);
    assert_eq!(ledger.calls()[0].to, Some(addr(ENGINE)));
}

#[tokio::test]
async fn test_empty_request_is_none() {
    let participation = addr(0xb1);
    let ledger = Arc::new(MockLedger::new().with_call_values(
        participation,
        REQUESTS,
        "address,uint256,uint256,uint256",
        vec![
            AbiValue::Address(Address::from_bytes([0; 20])),
            AbiValue::Uint(U256::zero()),
            AbiValue::Uint(U256::zero()),
            AbiValue::Uint(U256::zero()),
        ],
    ));
    let env = env_for(&ledger);

    let request = get_request(&env, participation, addr(0x42)).await.unwrap();

    assert!(request.is_none());
}

fn fund_details(names: &[&str], prices: &[u64]) -> Vec<AbiValue> {
    let count = names.len();
    vec![
        AbiValue::Array((0..count).map(|i| AbiValue::Address(addr(0x10 + i as u8))).collect()),
        AbiValue::Array(prices.iter().map(|p| AbiValue::Uint(U256::from(*p))).collect()),
        AbiValue::Array(
            (0..count)
                .map(|i| AbiValue::Uint(U256::from(1_540_000_000u64 + i as u64)))
                .collect(),
        ),
        AbiValue::Array(names.iter().map(|n| utf8_to_bytes32(n).unwrap()).collect()),
        AbiValue::Array((0..count).map(|_| AbiValue::Address(addr(WETH))).collect()),
    ]
}

#[tokio::test]
async fn test_fund_details_ranked_by_share_price() {
    let ledger = Arc::new(MockLedger::new().with_call_values(
        addr(RANKING),
        GET_FUND_DETAILS,
        "address[],uint256[],uint256[],bytes32[],address[]",
        fund_details(&["Alpha", "Bravo", "Charlie"], &[ONE, 3 * ONE, 2 * ONE]),
    ));
    let env = env_for(&ledger);

    let funds = get_fund_details(&env).await.unwrap();

    let ranked: Vec<(&str, usize)> = funds.iter().map(|f| (f.name.as_str(), f.rank)).collect();
    assert_eq!(ranked, vec![("Bravo", 1), ("Charlie", 2), ("Alpha", 3)]);
    assert_eq!(funds[0].share_price.quote, create_quantity(weth(), 3 * ONE));
    assert_eq!(funds[0].share_price.base.token.address, addr(0x11));
    assert_eq!(funds[0].creation_time.timestamp(), 1_540_000_001);

    // The version address is the single argument.
    let request = &ledger.calls()[0];
    assert_eq!(&request.data[4 + 12..], addr(VERSION).as_bytes());
}

fn exchange_info(adapters: &[u8]) -> Vec<AbiValue> {
    vec![
        AbiValue::Array(adapters.iter().map(|a| AbiValue::Address(addr(a - 1))).collect()),
        AbiValue::Array(adapters.iter().map(|a| AbiValue::Address(addr(*a))).collect()),
        AbiValue::Array(adapters.iter().map(|_| AbiValue::Bool(false)).collect()),
    ]
}

#[tokio::test]
async fn test_exchange_index_matches_adapter() {
    let ledger = Arc::new(MockLedger::new().with_call_values(
        addr(TRADING),
        GET_EXCHANGE_INFO,
        "address[],address[],bool[]",
        exchange_info(&[0xd4, 0xd2]),
    ));
    let env = env_for(&ledger);

    assert_eq!(get_exchange_index(&env, addr(TRADING), "OasisDex").await.unwrap(), 1);
    assert_eq!(get_exchange_index(&env, addr(TRADING), "ZeroExV2").await.unwrap(), 0);

    let err = get_exchange_index(&env, addr(TRADING), "KyberNetwork")
        .await
        .unwrap_err();
    match err {
        PipelineError::GuardViolation { message, context } => {
            assert!(message.contains("does not authorize exchange"), "{}", message);
            assert_eq!(context, Some(addr(0xd6).to_string()));
        }
        other => panic!("expected guard violation, got {:?}", other),
    }

    let allowed = get_allowed_exchanges(&env, addr(TRADING)).await.unwrap();
    assert_eq!(allowed, vec!["OasisDex".to_string(), "ZeroExV2".to_string()]);
}

#[tokio::test]
async fn test_increase_time_then_mine() {
    let ledger = Arc::new(MockLedger::new());
    let env = env_for(&ledger);

    tokio_test::assert_ok!(increase_time(&env, 86_400).await);
    tokio_test::assert_ok!(increase_time(&env, 60).await);

    assert_eq!(ledger.time_increases(), vec![86_400, 60]);
    assert_eq!(ledger.mined_blocks(), 2);
}
