//! Stake / unstake / unjail transitions, the unstaking queue and slashing.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::{prefix_iter, KvStore};
use crate::types::{Address, BlockHeader, PublicKey};

use super::keeper::Keeper;
use super::keys;
use super::types::{MaturedUnstake, StakeStatus, Validator, ValidatorSigningInfo};

impl Keeper {
    /// Creates a validator, reactivates an unstaked one, or tops up a jailed
    /// staked one. Leaves account balances alone; transactions go through
    /// [`Keeper::stake_from_account`].
    pub fn stake(
        &self,
        store: &mut dyn KvStore,
        header: &BlockHeader,
        public_key: PublicKey,
        amount: u64,
    ) -> Result<Validator> {
        if amount == 0 {
            return Err(Error::InvalidArgument("stake amount must be positive".into()));
        }
        let address = public_key.address();

        let signing_info = self.signing_info(store, &address)?;
        if signing_info.as_ref().map_or(false, |info| info.tombstoned) {
            return Err(Error::PermanentlyBarred(address.to_string()));
        }

        let validator = match self.get_validator(store, &address) {
            Err(Error::NotFound(_)) => Validator::new(public_key, amount),
            Err(e) => return Err(e),
            Ok(existing) => match existing.status {
                StakeStatus::Staked if !existing.jailed => {
                    return Err(Error::AlreadyStaked(address.to_string()))
                }
                StakeStatus::Staked => {
                    let staked_tokens = existing.staked_tokens.checked_add(amount).ok_or_else(|| {
                        Error::InvalidArgument(format!("stake of validator {} would overflow", address))
                    })?;
                    self.delete_power(store, &existing)?;
                    Validator { staked_tokens, ..existing }
                }
                StakeStatus::Unstaking => {
                    return Err(Error::InvalidState(format!(
                        "validator {} is unstaking and cannot stake until it matures",
                        address
                    )))
                }
                StakeStatus::Unstaked => {
                    if existing.public_key != public_key {
                        return Err(Error::InvalidState(format!(
                            "public key does not match stored key for validator {}",
                            address
                        )));
                    }
                    Validator {
                        status: StakeStatus::Staked,
                        staked_tokens: amount,
                        unstaking_completion_time: None,
                        ..existing
                    }
                }
            },
        };

        self.set_validator(store, &validator)?;
        self.set_power(store, &validator)?;
        if signing_info.is_none() {
            self.set_signing_info(store, &ValidatorSigningInfo::new(address, header.height))?;
        }

        info!(
            "Validator {} staked {} tokens at height {} (total {})",
            address, amount, header.height, validator.staked_tokens
        );
        Ok(validator)
    }

    /// Stakes `amount` out of the validator's own account balance.
    pub fn stake_from_account(
        &self,
        store: &mut dyn KvStore,
        header: &BlockHeader,
        public_key: PublicKey,
        amount: u64,
    ) -> Result<Validator> {
        let address = public_key.address();
        let available = self.accounts.balance(store, &address)?;
        if available < amount {
            return Err(Error::InsufficientFunds(format!(
                "{} holds {}, cannot stake {}",
                address, available, amount
            )));
        }
        let validator = self.stake(store, header, public_key, amount)?;
        self.accounts.sub_coins(store, &address, amount)?;
        Ok(validator)
    }

    /// Moves a staked validator into the unstaking queue.
    pub fn begin_unstake(&self, store: &mut dyn KvStore, header: &BlockHeader, address: &Address) -> Result<Validator> {
        let validator = self.get_validator(store, address)?;
        if !validator.is_staked() {
            return Err(Error::InvalidState(format!(
                "validator {} is {:?}, only staked validators can unstake",
                address, validator.status
            )));
        }
        let params = self.params(store)?;
        let completion_time = header.time.checked_add(params.unstaking_time.max(1)).ok_or_else(|| {
            Error::InvalidArgument(format!("unstaking completion time overflows for validator {}", address))
        })?;

        self.delete_power(store, &validator)?;
        let validator = Validator {
            status: StakeStatus::Unstaking,
            unstaking_completion_time: Some(completion_time),
            ..validator
        };
        self.set_validator(store, &validator)?;
        store.set(&keys::unstaking_queue_key(completion_time, address), Vec::new());

        info!(
            "Validator {} began unstaking {} tokens, completes at {}",
            address, validator.staked_tokens, completion_time
        );
        Ok(validator)
    }

    /// Unstaking queue entries with completion time at or before `time`, in
    /// chronological order.
    pub fn mature_queue_entries(&self, store: &dyn KvStore, time: u64) -> Result<Vec<(u64, Address)>> {
        let mut due = Vec::new();
        for (key, _) in prefix_iter(store, &keys::unstaking_queue_prefix()) {
            let (completion_time, address) = keys::parse_unstaking_queue_key(&key)?;
            if completion_time > time {
                break;
            }
            due.push((completion_time, address));
        }
        Ok(due)
    }

    /// Every validator still waiting in the queue, in completion order.
    pub fn unstaking_queue(&self, store: &dyn KvStore) -> Result<Vec<(u64, Address)>> {
        self.mature_queue_entries(store, u64::MAX)
    }

    /// Completes unstaking for every validator whose completion time is at or
    /// before the block time, crediting the released stake to each
    /// validator's account. Returns the released stake per validator.
    ///
    /// All entries are checked before anything is written, so a corrupt queue
    /// leaves the store untouched.
    pub fn mature_unstaking(&self, store: &mut dyn KvStore, header: &BlockHeader) -> Result<Vec<MaturedUnstake>> {
        let due = self.mature_queue_entries(store, header.time)?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let mut finished = Vec::new();
        let mut stale = Vec::new();
        for (completion_time, address) in due {
            let validator = match self.get_validator(store, &address) {
                Ok(v) => v,
                Err(Error::NotFound(_)) => {
                    return Err(Error::ConfigurationInvariantViolated(format!(
                        "unstaking queue references missing validator {}",
                        address
                    )))
                }
                Err(e) => return Err(e),
            };
            if validator.is_unstaking() && validator.unstaking_completion_time == Some(completion_time) {
                finished.push((completion_time, validator));
            } else {
                stale.push((completion_time, address));
            }
        }

        for (completion_time, address) in stale {
            warn!("Dropping stale unstaking queue entry for {} at {}", address, completion_time);
            store.delete(&keys::unstaking_queue_key(completion_time, &address));
        }

        let mut released = Vec::with_capacity(finished.len());
        for (completion_time, validator) in finished {
            let tokens = validator.staked_tokens;
            let address = validator.address;
            let validator = Validator {
                status: StakeStatus::Unstaked,
                staked_tokens: 0,
                unstaking_completion_time: None,
                ..validator
            };
            self.set_validator(store, &validator)?;
            store.delete(&keys::unstaking_queue_key(completion_time, &address));
            self.accounts.add_coins(store, &address, tokens)?;
            info!("Validator {} finished unstaking, released {} tokens", address, tokens);
            released.push(MaturedUnstake { address, tokens });
        }
        Ok(released)
    }

    /// Clears the jail flag once the jail period is over.
    pub fn unjail(&self, store: &mut dyn KvStore, header: &BlockHeader, address: &Address) -> Result<Validator> {
        let validator = self.get_validator(store, address)?;
        if !validator.jailed {
            return Err(Error::NotJailed(address.to_string()));
        }
        if validator.is_unstaked() {
            return Err(Error::InvalidState(format!("validator {} is unstaked", address)));
        }
        if let Some(info) = self.signing_info(store, address)? {
            if info.tombstoned {
                return Err(Error::PermanentlyBarred(address.to_string()));
            }
            if header.time < info.jailed_until {
                return Err(Error::InvalidState(format!(
                    "validator {} is jailed until {}",
                    address, info.jailed_until
                )));
            }
        }

        let validator = Validator { jailed: false, ..validator };
        self.set_validator(store, &validator)?;
        info!("Validator {} unjailed at height {}", address, header.height);
        Ok(validator)
    }

    /// Sets the jail flag on a staked or unstaking validator.
    pub fn jail(&self, store: &mut dyn KvStore, address: &Address) -> Result<Validator> {
        let validator = self.get_validator(store, address)?;
        if validator.is_unstaked() {
            return Err(Error::InvalidState(format!("cannot jail unstaked validator {}", address)));
        }
        if validator.jailed {
            return Ok(validator);
        }
        let validator = Validator { jailed: true, ..validator };
        self.set_validator(store, &validator)?;
        warn!("Validator {} jailed", address);
        Ok(validator)
    }

    /// Burns `fraction_bps` basis points of the validator's stake into the DAO
    /// pool. Returns the slashed amount.
    pub fn slash(
        &self,
        store: &mut dyn KvStore,
        address: &Address,
        infraction_height: u64,
        fraction_bps: u64,
    ) -> Result<u64> {
        let validator = self.get_validator(store, address)?;
        if validator.is_unstaked() {
            debug!("Skipping slash of unstaked validator {}", address);
            return Ok(0);
        }
        let amount = (u128::from(validator.staked_tokens) * u128::from(fraction_bps.min(10_000)) / 10_000) as u64;
        if amount == 0 {
            return Ok(0);
        }

        if validator.is_staked() {
            self.delete_power(store, &validator)?;
        }
        let validator = Validator {
            staked_tokens: validator.staked_tokens - amount,
            ..validator
        };
        self.set_validator(store, &validator)?;
        if validator.is_staked() {
            self.set_power(store, &validator)?;
        }
        self.add_to_dao(store, amount)?;

        info!(
            "Slashed validator {} for infraction at height {}. Penalty amount: {}, Remaining stake: {}",
            address, infraction_height, amount, validator.staked_tokens
        );
        Ok(amount)
    }
}
