//! Validator staking: records and indexes, the stake/unstake lifecycle, the
//! power-set diff sent to consensus and the signing-info ledger.

pub mod abci;
pub mod keeper;
pub mod keys;
pub mod lifecycle;
pub mod params;
pub mod prev_state;
pub mod querier;
pub mod signing;
pub mod types;
pub mod validator;

#[cfg(test)]
pub(crate) mod tests;

pub use keeper::Keeper;
pub use params::Params;
pub use querier::Query;
pub use signing::DOUBLE_SIGN_JAIL_END_TIME;
pub use types::{
    GenesisValidator, MaturedUnstake, Pool, StakeStatus, Validator, ValidatorSigningInfo, ValidatorUpdate,
};

pub const MODULE_NAME: &str = "pos";
