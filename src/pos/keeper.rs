use log::info;

use crate::auth;
use crate::codec::Codec;
use crate::error::Result;
use crate::params::{ParamRegistry, Subspace};
use crate::store::KvStore;
use crate::types::BlockHeader;

use super::keys;
use super::params::Params;
use super::types::{GenesisValidator, Pool, ValidatorUpdate};
use super::MODULE_NAME;

/// Entry point to the staking state. Holds no state of its own: every call
/// reads and writes through the store handed in by the block executor.
#[derive(Clone)]
pub struct Keeper {
    pub(crate) codec: Codec,
    pub(crate) subspace: Subspace,
    pub(crate) accounts: auth::Keeper,
}

impl Keeper {
    pub fn new(codec: Codec, registry: &ParamRegistry) -> Result<Self> {
        let subspace = registry.subspace(MODULE_NAME)?.clone();
        Ok(Self { codec, subspace, accounts: auth::Keeper::new(codec) })
    }

    /// Ledger stake is drawn from and matured unstakes are paid into.
    pub fn accounts(&self) -> &auth::Keeper {
        &self.accounts
    }

    pub fn params(&self, store: &dyn KvStore) -> Result<Params> {
        Params::load(&self.subspace, store)
    }

    /// Stores parameters and re-keys the power index if `power_reduction`
    /// changed.
    pub fn set_params(&self, store: &mut dyn KvStore, params: &Params) -> Result<()> {
        params.store(&self.subspace, store)?;
        self.sync_power_index(store)
    }

    /// Writes parameters, stakes the genesis validators (their tokens are
    /// minted, not drawn from accounts) and returns the
    /// initial validator set for the consensus engine.
    pub fn init_genesis(
        &self,
        store: &mut dyn KvStore,
        header: &BlockHeader,
        params: &Params,
        validators: &[GenesisValidator],
    ) -> Result<Vec<ValidatorUpdate>> {
        self.set_params(store, params)?;
        for genesis in validators {
            self.stake(store, header, genesis.public_key, genesis.tokens)?;
        }
        let updates = self.update_validator_set(store)?;
        info!("Initialized staking genesis with {} validators", validators.len());
        Ok(updates)
    }

    /// Tokens held by staked and unstaking validators.
    pub fn staked_pool(&self, store: &dyn KvStore) -> Result<Pool> {
        let mut tokens = 0u64;
        self.iterate_validators(store, |validator| {
            if !validator.is_unstaked() {
                tokens = tokens.saturating_add(validator.staked_tokens);
            }
            false
        })?;
        Ok(Pool { tokens })
    }

    /// Tokens removed from validators by slashing.
    pub fn dao_pool(&self, store: &dyn KvStore) -> Result<Pool> {
        match store.get(&keys::dao_pool_key()) {
            Some(bytes) => self.codec.unmarshal(&bytes),
            None => Ok(Pool::default()),
        }
    }

    pub(crate) fn add_to_dao(&self, store: &mut dyn KvStore, amount: u64) -> Result<()> {
        let mut pool = self.dao_pool(store)?;
        pool.tokens = pool.tokens.saturating_add(amount);
        store.set(&keys::dao_pool_key(), self.codec.marshal(&pool)?);
        Ok(())
    }
}
