//! Protocol operations expressed as call and transaction descriptors.
//!
//! Every module exposes the descriptor (`*_call()` / `*_transaction()`) so
//! callers can inspect or re-target it, plus an async helper executing it
//! against a given contract.

pub mod engine;
pub mod evm;
pub mod hub;
pub mod participation;
pub mod policies;
pub mod prices;
pub mod ranking;
pub mod registry;
pub mod token;
pub mod trading;

pub use engine::{get_amgu_price, get_frozen_ether, get_liquid_ether, thaw};
pub use evm::increase_time;
pub use hub::{ensure_is_not_shut_down, get_hub, get_routes, is_shut_down, Routes};
pub use participation::{
    get_request, get_share_cost_in_asset, request_investment, InvestmentRequest,
    RequestInvestmentArgs, ShareCostArgs,
};
pub use policies::{register_policies, FunctionSignature, PolicyRegistration};
pub use prices::get_price;
pub use ranking::{get_fund_details, FundDetails};
pub use registry::{register_asset, update_exchange_adapter, ExchangeAdapterArgs, RegisterAssetArgs};
pub use token::{
    allowance, balance_of, ensure_allowance, get_token, increase_approval, IncreaseApprovalArgs,
};
pub use trading::{get_allowed_exchanges, get_exchange_index, ExchangeInfo};
