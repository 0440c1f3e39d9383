use crate::abi::{self, AbiValue, MethodSignature};
use crate::domain::{
    create_price, create_quantity, unit_scale, Address, ContractKind, Price, Token, U256,
};
use crate::environment::Environment;
use crate::error::PipelineError;
use crate::pipeline::CallDescriptor;
use futures::future::BoxFuture;

pub const GET_PRICE: MethodSignature = MethodSignature::new("getPrice(address)");

/// One whole unit of `token`, e.g. `10^18` for an 18-decimal token.
pub fn whole_unit(token: &Token) -> Result<U256, PipelineError> {
    Ok(unit_scale(u32::from(token.decimals))?)
}

fn token_arg<'a>(
    _env: &'a Environment,
    token: &'a Token,
    _contract: Address,
) -> BoxFuture<'a, Result<Vec<AbiValue>, PipelineError>> {
    Box::pin(async move { Ok(vec![AbiValue::Address(token.address)]) })
}

fn to_price<'a>(
    env: &'a Environment,
    values: Vec<AbiValue>,
    token: &'a Token,
    _contract: Address,
) -> BoxFuture<'a, Result<Price, PipelineError>> {
    Box::pin(async move {
        let quote = abi::output(&values, 0)?.as_uint()?;
        let native = env.deployment().native_token()?;
        Ok(create_price(
            create_quantity(token.clone(), whole_unit(token)?),
            create_quantity(native, quote),
        ))
    })
}

/// Native-token price of one whole unit of the argument token. The price
/// source also returns the price's timestamp, which is ignored.
pub fn price_call() -> CallDescriptor<Token, Price> {
    CallDescriptor::<Token, _>::new(GET_PRICE, ContractKind::PriceSource, "uint256,uint256")
        .prepare(token_arg)
        .post_process(to_price)
}

pub async fn get_price(
    env: &Environment,
    price_source: Address,
    token: &Token,
) -> Result<Price, PipelineError> {
    price_call().execute(env, price_source, token).await
}
