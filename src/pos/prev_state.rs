//! The validator set last handed to consensus, and the diff against it.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::store::{prefix_iter, KvStore};
use crate::types::Address;

use super::keeper::Keeper;
use super::keys;
use super::types::{Validator, ValidatorUpdate};

impl Keeper {
    /// Power recorded for `address` in the previous state, zero if absent.
    pub fn prev_state_validator_power(&self, store: &dyn KvStore, address: &Address) -> Result<u64> {
        match store.get(&keys::prev_state_power_key(address)) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Ok(0),
        }
    }

    pub fn prev_state_total_power(&self, store: &dyn KvStore) -> Result<u64> {
        match store.get(&keys::prev_state_total_power_key()) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Ok(0),
        }
    }

    /// Visits `(address, power)` pairs of the previous state in address order.
    pub fn iterate_prev_state_powers<F>(&self, store: &dyn KvStore, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Address, u64) -> bool,
    {
        for (key, bytes) in prefix_iter(store, &keys::prev_state_power_prefix()) {
            let address = keys::address_from_prev_state_key(&key)?;
            let power: u64 = self.codec.unmarshal(&bytes)?;
            if visitor(&address, power) {
                break;
            }
        }
        Ok(())
    }

    pub fn prev_state_powers(&self, store: &dyn KvStore) -> Result<BTreeMap<Address, u64>> {
        let mut powers = BTreeMap::new();
        self.iterate_prev_state_powers(store, |address, power| {
            powers.insert(*address, power);
            false
        })?;
        Ok(powers)
    }

    /// Upper bound on the previous state's size: the `max_validators` it was
    /// written under. A later governance change to the parameter does not
    /// shrink the bound until the next reconciliation rewrites the snapshot.
    pub fn prev_state_cap(&self, store: &dyn KvStore) -> Result<u64> {
        match store.get(&keys::prev_state_cap_key()) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Ok(self.params(store)?.max_validators),
        }
    }

    /// Previous-state powers, refusing a snapshot larger than its cap.
    fn checked_prev_state_powers(&self, store: &dyn KvStore) -> Result<BTreeMap<Address, u64>> {
        let cap = self.prev_state_cap(store)?;
        let powers = self.prev_state_powers(store)?;
        if powers.len() as u64 > cap {
            return Err(Error::ConfigurationInvariantViolated(format!(
                "{} validators in previous state, more than max_validators {}",
                powers.len(),
                cap
            )));
        }
        Ok(powers)
    }

    /// Validator records of the previous state.
    pub fn prev_state_validators(&self, store: &dyn KvStore) -> Result<Vec<Validator>> {
        self.checked_prev_state_powers(store)?
            .keys()
            .map(|address| match self.get_validator(store, address) {
                Err(Error::NotFound(_)) => Err(Error::ConfigurationInvariantViolated(format!(
                    "previous state references missing validator {}",
                    address
                ))),
                other => other,
            })
            .collect()
    }

    /// Top `max_validators` staked, unjailed validators with non-zero power,
    /// in descending power order.
    pub fn current_power_set(&self, store: &dyn KvStore) -> Result<Vec<(Validator, u64)>> {
        let params = self.params(store)?;
        let max = params.max_validators as usize;
        let mut set = Vec::new();
        if max == 0 {
            return Ok(set);
        }
        self.iterate_by_power(store, |validator| {
            if validator.jailed {
                return false;
            }
            let power = validator.consensus_power(params.power_reduction);
            if power > 0 {
                set.push((validator.clone(), power));
            }
            set.len() >= max
        })?;
        Ok(set)
    }

    /// Diffs the current power set against the previous state, replaces the
    /// previous state with the current set and returns the updates for the
    /// consensus engine.
    ///
    /// The power index is first brought in line with `power_reduction`. The
    /// diff itself is computed before the first snapshot write, so the stored
    /// snapshot is either the old set or the new one.
    pub fn update_validator_set(&self, store: &mut dyn KvStore) -> Result<Vec<ValidatorUpdate>> {
        self.sync_power_index(store)?;
        let mut previous = self.checked_prev_state_powers(store)?;
        let current = self.current_power_set(store)?;
        let cap = self.params(store)?.max_validators;

        let mut updates = Vec::new();
        let mut total_power = 0u64;
        for (validator, power) in &current {
            total_power = total_power.saturating_add(*power);
            let old = previous.remove(&validator.address);
            if old != Some(*power) {
                updates.push(ValidatorUpdate {
                    address: validator.address,
                    public_key: validator.public_key,
                    power: *power,
                });
            }
        }

        // whatever is left in the previous set dropped out
        for address in previous.keys() {
            let validator = match self.get_validator(store, address) {
                Ok(v) => v,
                Err(Error::NotFound(_)) => {
                    return Err(Error::ConfigurationInvariantViolated(format!(
                        "previous state references missing validator {}",
                        address
                    )))
                }
                Err(e) => return Err(e),
            };
            updates.push(ValidatorUpdate {
                address: *address,
                public_key: validator.public_key,
                power: 0,
            });
        }

        let mut writes: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(current.len() + 2);
        for (validator, power) in &current {
            writes.push((keys::prev_state_power_key(&validator.address), self.codec.marshal(power)?));
        }
        writes.push((keys::prev_state_total_power_key(), self.codec.marshal(&total_power)?));
        writes.push((keys::prev_state_cap_key(), self.codec.marshal(&cap)?));

        let stale: Vec<Vec<u8>> = prefix_iter(store, &keys::prev_state_power_prefix())
            .map(|(k, _)| k)
            .collect();
        for key in stale {
            store.delete(&key);
        }
        for (key, value) in writes {
            store.set(&key, value);
        }

        if updates.is_empty() {
            debug!("Validator set unchanged, total power {}", total_power);
        } else {
            info!(
                "Validator set updated: {} changes, {} validators, total power {}",
                updates.len(),
                current.len(),
                total_power
            );
        }
        Ok(updates)
    }
}
