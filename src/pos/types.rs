use serde::{Deserialize, Serialize};

use crate::types::{Address, PublicKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StakeStatus {
    Unstaked,
    Unstaking,
    Staked,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub public_key: PublicKey,
    pub jailed: bool,
    pub status: StakeStatus,
    pub staked_tokens: u64,
    /// Set only while the validator is unstaking.
    pub unstaking_completion_time: Option<u64>,
}

impl Validator {
    pub fn new(public_key: PublicKey, staked_tokens: u64) -> Self {
        Self {
            address: public_key.address(),
            public_key,
            jailed: false,
            status: StakeStatus::Staked,
            staked_tokens,
            unstaking_completion_time: None,
        }
    }

    pub fn is_staked(&self) -> bool {
        self.status == StakeStatus::Staked
    }

    pub fn is_unstaking(&self) -> bool {
        self.status == StakeStatus::Unstaking
    }

    pub fn is_unstaked(&self) -> bool {
        self.status == StakeStatus::Unstaked
    }

    pub fn consensus_power(&self, power_reduction: u64) -> u64 {
        self.staked_tokens / power_reduction.max(1)
    }
}

/// Power change handed to the consensus engine. Zero power removes the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub address: Address,
    pub public_key: PublicKey,
    pub power: u64,
}

/// Liveness and misbehaviour bookkeeping for one validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSigningInfo {
    pub address: Address,
    pub start_height: u64,
    /// Position in the missed-block window, advanced every block.
    pub index_offset: u64,
    pub jailed_until: u64,
    pub tombstoned: bool,
    pub missed_blocks_counter: u64,
}

impl ValidatorSigningInfo {
    pub fn new(address: Address, start_height: u64) -> Self {
        Self {
            address,
            start_height,
            index_offset: 0,
            jailed_until: 0,
            tombstoned: false,
            missed_blocks_counter: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub tokens: u64,
}

/// Released stake for a validator whose unstaking period has elapsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaturedUnstake {
    pub address: Address,
    pub tokens: u64,
}

/// Initial validator set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub public_key: PublicKey,
    pub tokens: u64,
}
