//! Layering signing identities onto a shared base Environment.

use fundline::abi::AbiValue;
use fundline::domain::{Address, Token, U256};
use fundline::environment::{Deployment, Environment, Options};
use fundline::ledger::MockLedger;
use fundline::operations::engine::{thaw, FROZEN_ETHER};
use fundline::signer::{recover_message_signer, Kdf, Keystore, LocalSigner, Signer};
use fundline::{with_keystore_signer, with_new_account, with_private_key_signer, PipelineError};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const KEY_ADDRESS: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";

fn engine() -> Address {
    Address::from_bytes([0xe1; 20])
}

fn deployment() -> Deployment {
    let weth = Token::new("WETH", Address::from_bytes([0xa2; 20]), 18);
    Deployment {
        tokens: vec![weth],
        fee_token: "WETH".to_string(),
        native_token: "WETH".to_string(),
        ..Deployment::default()
    }
}

fn base(ledger: &Arc<MockLedger>) -> Environment {
    Environment::new(
        ledger.clone(),
        deployment(),
        Options {
            confirmation_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
            ..Options::default()
        },
    )
}

fn thawable() -> Arc<MockLedger> {
    Arc::new(MockLedger::new().with_call_values(
        engine(),
        FROZEN_ETHER,
        "uint256",
        vec![AbiValue::Uint(U256::from(1u64))],
    ))
}

#[test]
fn test_base_environment_is_never_mutated() {
    let ledger = Arc::new(MockLedger::new());
    let base = base(&ledger);

    let signed = with_private_key_signer(&base, KEY).unwrap();

    assert!(base.wallet().is_none());
    assert_eq!(signed.wallet_address().unwrap().to_string(), KEY_ADDRESS);
    assert_eq!(signed.session(), base.session());
}

#[test]
fn test_keystore_file_roundtrip() {
    let ledger = Arc::new(MockLedger::new());
    let base = base(&ledger);
    let signer = LocalSigner::from_private_key_hex(KEY).unwrap();
    let keystore = Keystore::encrypt(&signer, "correct horse", Kdf::Scrypt { log_n: 4, r: 8, p: 1 })
        .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&keystore).unwrap().as_bytes())
        .unwrap();
    let json = std::fs::read_to_string(file.path()).unwrap();
    let loaded = Keystore::from_json(&json).unwrap();

    let env = with_keystore_signer(&base, &loaded, "correct horse").unwrap();
    assert_eq!(env.wallet_address().unwrap().to_string(), KEY_ADDRESS);

    let err = with_keystore_signer(&base, &loaded, "battery staple").unwrap_err();
    assert!(matches!(err, PipelineError::Keystore(_)));
    assert!(base.wallet().is_none());
}

#[tokio::test]
async fn test_signed_message_recovers_to_wallet() {
    let ledger = Arc::new(MockLedger::new());
    let env = with_private_key_signer(&base(&ledger), KEY).unwrap();
    let wallet = env.require_wallet().unwrap();

    let signature = wallet.sign_message(b"fund manager login").await.unwrap();

    let recovered = recover_message_signer(b"fund manager login", &signature).unwrap();
    assert_eq!(recovered, wallet.address());
}

#[tokio::test]
async fn test_same_identity_in_two_environments_shares_nonces() {
    let ledger = thawable();
    let base = base(&ledger);
    let first = with_private_key_signer(&base, KEY).unwrap();
    let second = with_private_key_signer(&base, KEY).unwrap();

    let (a, b) = tokio::join!(thaw(&first, engine()), thaw(&second, engine()));
    a.unwrap();
    b.unwrap();

    let mut nonces: Vec<u64> = ledger.submissions().iter().map(|tx| tx.unsigned.nonce).collect();
    nonces.sort_unstable();
    assert_eq!(nonces, vec![0, 1]);
}

#[tokio::test]
async fn test_participants_run_in_isolation() {
    let ledger = thawable();
    let base = base(&ledger);
    let participants: Vec<Environment> = (0..4).map(|_| with_new_account(&base)).collect();

    let runs = participants.iter().map(|env| thaw(env, engine()));
    let results = futures::future::join_all(runs).await;

    assert!(results.iter().all(|r| r.is_ok()));
    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 4);
    for env in &participants {
        let sent: Vec<_> = submissions
            .iter()
            .filter(|tx| Some(tx.from) == env.wallet_address())
            .collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].unsigned.nonce, 0);
    }
}

#[tokio::test]
async fn test_with_options_keeps_signer() {
    let ledger = thawable();
    let env = with_private_key_signer(&base(&ledger), KEY).unwrap();

    let tuned = env.with_options(Options {
        gas_price: U256::from(1u64),
        ..env.options().clone()
    });
    thaw(&tuned, engine()).await.unwrap();

    assert_eq!(tuned.wallet_address(), env.wallet_address());
    assert_eq!(ledger.submissions()[0].unsigned.gas_price, U256::from(1u64));
}
