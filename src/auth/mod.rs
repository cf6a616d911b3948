//! Account ledger: spendable coins and the transaction sequence per address.
//!
//! Staking draws from these balances and matured unstakes flow back into
//! them. The sequence is consumed by every accepted transaction, so a signed
//! message cannot be applied twice.

pub mod keeper;

pub use keeper::Keeper;

use serde::{Deserialize, Serialize};

use crate::types::{Address, PublicKey};

pub const MODULE_NAME: &str = "auth";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Learned from the first transaction the account signs.
    pub public_key: Option<PublicKey>,
    pub coins: u64,
    /// Sequence the next transaction from this account must carry.
    pub sequence: u64,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self { address, public_key: None, coins: 0, sequence: 0 }
    }
}

/// Balance credited when the chain starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub coins: u64,
}
