use crate::codec::Codec;
use crate::params::ParamRegistry;
use crate::pos::{Keeper, Params, StakeStatus};
use crate::store::{KvStore, MemStore};
use crate::types::{BlockHeader, PublicKey};

pub fn pubkey(seed: u8) -> PublicKey {
    PublicKey([seed; 32])
}

pub fn header(height: u64, time: u64) -> BlockHeader {
    BlockHeader::new(height, time)
}

pub fn registry() -> ParamRegistry {
    ParamRegistry::new().with(Params::subspace())
}

pub fn keeper() -> Keeper {
    Keeper::new(Codec::new(), &registry()).unwrap()
}

pub fn keeper_with(store: &mut MemStore, params: Params) -> Keeper {
    let k = keeper();
    k.set_params(store, &params).unwrap();
    k
}

/// A power index entry exists exactly for the staked validators.
pub fn assert_power_index_consistent(keeper: &Keeper, store: &dyn KvStore) {
    for validator in keeper.all_validators(store).unwrap() {
        assert_eq!(
            keeper.has_power_entry(store, &validator).unwrap(),
            validator.status == StakeStatus::Staked,
            "power index out of step for {:?}",
            validator
        );
    }
    let staked = keeper.staked_validators_by_power(store).unwrap();
    assert!(staked.iter().all(|v| v.is_staked()));
}
