pub mod abi;
pub mod config;
pub mod domain;
pub mod environment;
pub mod error;
pub mod guards;
pub mod ledger;
pub mod operations;
pub mod pipeline;
pub mod signer;

pub use config::Config;
pub use domain::{
    create_price, create_quantity, greater_than, is_equal, to_fixed, value_in, Address,
    ContractKind, Decimal, Price, Quantity, Receipt, Token, Track, TxHash, ValueError, U256,
};
pub use environment::{
    with_keystore_signer, with_new_account, with_private_key_signer, Deployment, Environment,
    Options,
};
pub use error::PipelineError;
pub use guards::ensure;
pub use ledger::{HttpLedger, Ledger, LedgerError, MockLedger};
pub use pipeline::{deploy_contract, wait_for_receipt, CallDescriptor, TransactionDescriptor, TxOptions};
pub use signer::{Keystore, LocalSigner, Signer};
