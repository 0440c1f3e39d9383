use super::transaction::submit;
use crate::abi::{self, AbiValue};
use crate::domain::{Address, U256};
use crate::environment::Environment;
use crate::error::PipelineError;
use tracing::{info, info_span, Instrument};

/// Create a contract from `bytecode` followed by the encoded constructor
/// arguments and return its address. `constructor_types` lists the
/// constructor parameter types, e.g. `"string,uint8,string"`.
///
/// Follows the write path from ESTIMATED on, so an explicit gas limit below
/// the estimate fails with `GasLimitExceeded` before anything is signed.
pub async fn deploy_contract(
    env: &Environment,
    bytecode: &[u8],
    constructor_types: &str,
    constructor_args: &[AbiValue],
) -> Result<Address, PipelineError> {
    let span = info_span!("deploy", session = %env.session());
    async move {
        let types = abi::parse_types(constructor_types)?;
        let mut data = bytecode.to_vec();
        data.extend(abi::encode(&types, constructor_args)?);

        let receipt = submit(env, None, data, U256::zero(), None, "constructor").await?;
        let address = receipt.contract_address.ok_or_else(|| {
            PipelineError::Decode(format!(
                "receipt {} carries no contract address",
                receipt.transaction_hash
            ))
        })?;
        info!("Deployed contract at {}", address);
        Ok(address)
    }
    .instrument(span)
    .await
}
