//! Validator records and the power index.

use log::{debug, info};

use crate::error::{Error, Result};
use crate::store::{prefix_iter, KvStore};
use crate::types::Address;

use super::keeper::Keeper;
use super::keys;
use super::types::Validator;

impl Keeper {
    pub fn get_validator(&self, store: &dyn KvStore, address: &Address) -> Result<Validator> {
        match store.get(&keys::validator_key(address)) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Err(Error::NotFound(format!("validator {}", address))),
        }
    }

    pub fn has_validator(&self, store: &dyn KvStore, address: &Address) -> bool {
        store.has(&keys::validator_key(address))
    }

    /// Writes the record only. Callers keep the indexes in step.
    pub fn set_validator(&self, store: &mut dyn KvStore, validator: &Validator) -> Result<()> {
        let bytes = self.codec.marshal(validator)?;
        store.set(&keys::validator_key(&validator.address), bytes);
        Ok(())
    }

    /// Removes a validator record. Only allowed once it is unstaked, holds no
    /// tokens and is no longer part of the set last sent to consensus.
    pub fn delete_validator(&self, store: &mut dyn KvStore, address: &Address) -> Result<()> {
        let validator = self.get_validator(store, address)?;
        if !validator.is_unstaked() || validator.staked_tokens != 0 {
            return Err(Error::InvalidState(format!(
                "validator {} must be unstaked with zero tokens before deletion",
                address
            )));
        }
        if self.prev_state_validator_power(store, address)? != 0 {
            return Err(Error::InvalidState(format!(
                "validator {} is still in the previous consensus set",
                address
            )));
        }
        store.delete(&keys::validator_key(address));
        debug!("Deleted validator record {}", address);
        Ok(())
    }

    /// Visits every validator in address order until `visitor` returns true.
    pub fn iterate_validators<F>(&self, store: &dyn KvStore, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Validator) -> bool,
    {
        for (_, bytes) in prefix_iter(store, &keys::validators_prefix()) {
            let validator: Validator = self.codec.unmarshal(&bytes)?;
            if visitor(&validator) {
                break;
            }
        }
        Ok(())
    }

    pub fn all_validators(&self, store: &dyn KvStore) -> Result<Vec<Validator>> {
        let mut validators = Vec::new();
        self.iterate_validators(store, |v| {
            validators.push(v.clone());
            false
        })?;
        Ok(validators)
    }

    pub fn validators_with<P>(&self, store: &dyn KvStore, predicate: P) -> Result<Vec<Validator>>
    where
        P: Fn(&Validator) -> bool,
    {
        let mut validators = Vec::new();
        self.iterate_validators(store, |v| {
            if predicate(v) {
                validators.push(v.clone());
            }
            false
        })?;
        Ok(validators)
    }

    /// Power reduction the index keys were computed with. Before the first
    /// entry is written this is the current parameter.
    pub fn index_power_reduction(&self, store: &dyn KvStore) -> Result<u64> {
        match store.get(&keys::power_index_reduction_key()) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Ok(self.params(store)?.power_reduction),
        }
    }

    fn index_power_key(&self, store: &dyn KvStore, validator: &Validator) -> Result<Vec<u8>> {
        let power = validator.consensus_power(self.index_power_reduction(store)?);
        Ok(keys::power_key(power, &validator.address))
    }

    /// Adds the power index entry for a staked validator.
    pub fn set_power(&self, store: &mut dyn KvStore, validator: &Validator) -> Result<()> {
        let reduction_key = keys::power_index_reduction_key();
        if !store.has(&reduction_key) {
            let reduction = self.params(store)?.power_reduction;
            store.set(&reduction_key, self.codec.marshal(&reduction)?);
        }
        let key = self.index_power_key(store, validator)?;
        store.set(&key, validator.address.as_bytes().to_vec());
        Ok(())
    }

    /// Removes the power index entry. `validator` must carry the tokens the
    /// entry was written with, so call this before changing the stake.
    pub fn delete_power(&self, store: &mut dyn KvStore, validator: &Validator) -> Result<()> {
        let key = self.index_power_key(store, validator)?;
        store.delete(&key);
        Ok(())
    }

    pub fn has_power_entry(&self, store: &dyn KvStore, validator: &Validator) -> Result<bool> {
        Ok(store.has(&self.index_power_key(store, validator)?))
    }

    /// Re-keys the power index when `power_reduction` differs from the value
    /// the index was built with. Runs before every reconciliation, so a
    /// governance change takes effect at the next block.
    pub fn sync_power_index(&self, store: &mut dyn KvStore) -> Result<()> {
        let reduction = self.params(store)?.power_reduction;
        let reduction_key = keys::power_index_reduction_key();
        let built_with: Option<u64> = match store.get(&reduction_key) {
            Some(bytes) => Some(self.codec.unmarshal(&bytes)?),
            None => None,
        };
        if let Some(old) = built_with {
            if old == reduction {
                return Ok(());
            }
            let staked = self.validators_with(store, |v| v.is_staked())?;
            let entries: Vec<Vec<u8>> = prefix_iter(store, &keys::power_prefix()).map(|(k, _)| k).collect();
            for key in entries {
                store.delete(&key);
            }
            for validator in &staked {
                let power = validator.consensus_power(reduction);
                store.set(&keys::power_key(power, &validator.address), validator.address.as_bytes().to_vec());
            }
            info!(
                "Re-keyed power index for {} validators, power reduction {} -> {}",
                staked.len(),
                old,
                reduction
            );
        }
        store.set(&reduction_key, self.codec.marshal(&reduction)?);
        Ok(())
    }

    /// Visits staked validators from highest to lowest consensus power, ties
    /// by ascending address.
    ///
    /// An index entry without a matching staked record means the index is
    /// corrupt; that surfaces as a fatal error.
    pub fn iterate_by_power<F>(&self, store: &dyn KvStore, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Validator) -> bool,
    {
        let reduction = self.index_power_reduction(store)?;
        for (key, _) in prefix_iter(store, &keys::power_prefix()) {
            let address = keys::address_from_power_key(&key)?;
            let validator = match self.get_validator(store, &address) {
                Ok(v) => v,
                Err(Error::NotFound(_)) => {
                    return Err(Error::ConfigurationInvariantViolated(format!(
                        "power index references missing validator {}",
                        address
                    )))
                }
                Err(e) => return Err(e),
            };
            if !validator.is_staked() || keys::power_key(validator.consensus_power(reduction), &address) != key {
                return Err(Error::ConfigurationInvariantViolated(format!(
                    "stale power index entry for validator {}",
                    address
                )));
            }
            if visitor(&validator) {
                break;
            }
        }
        Ok(())
    }

    pub fn staked_validators_by_power(&self, store: &dyn KvStore) -> Result<Vec<Validator>> {
        let mut validators = Vec::new();
        self.iterate_by_power(store, |v| {
            validators.push(v.clone());
            false
        })?;
        Ok(validators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::tests::common::{keeper, pubkey};
    use crate::store::MemStore;

    #[test]
    fn missing_validator_is_not_found() {
        let (keeper, store) = (keeper(), MemStore::new());
        let err = keeper.get_validator(&store, &Address([4; 20])).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn power_iteration_orders_by_stake() {
        let (keeper, mut store) = (keeper(), MemStore::new());
        for (seed, tokens) in [(1u8, 10u64), (2, 30), (3, 20)] {
            let v = Validator::new(pubkey(seed), tokens);
            keeper.set_validator(&mut store, &v).unwrap();
            keeper.set_power(&mut store, &v).unwrap();
        }
        let tokens: Vec<u64> = keeper
            .staked_validators_by_power(&store)
            .unwrap()
            .iter()
            .map(|v| v.staked_tokens)
            .collect();
        assert_eq!(tokens, vec![30, 20, 10]);
    }

    #[test]
    fn visitor_can_stop_early() {
        let (keeper, mut store) = (keeper(), MemStore::new());
        for seed in 1..=5u8 {
            keeper.set_validator(&mut store, &Validator::new(pubkey(seed), 1)).unwrap();
        }
        let mut seen = 0;
        keeper
            .iterate_validators(&store, |_| {
                seen += 1;
                seen == 2
            })
            .unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn dangling_power_entry_is_fatal() {
        let (keeper, mut store) = (keeper(), MemStore::new());
        let v = Validator::new(pubkey(1), 10);
        keeper.set_power(&mut store, &v).unwrap();
        let err = keeper.staked_validators_by_power(&store).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn delete_requires_unstaked_and_empty() {
        let (keeper, mut store) = (keeper(), MemStore::new());
        let mut v = Validator::new(pubkey(1), 10);
        keeper.set_validator(&mut store, &v).unwrap();
        assert!(matches!(keeper.delete_validator(&mut store, &v.address), Err(Error::InvalidState(_))));

        v.status = crate::pos::StakeStatus::Unstaked;
        v.staked_tokens = 0;
        keeper.set_validator(&mut store, &v).unwrap();
        keeper.delete_validator(&mut store, &v.address).unwrap();
        assert!(!keeper.has_validator(&store, &v.address));
    }
}
