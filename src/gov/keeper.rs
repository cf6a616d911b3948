use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::module::AppModule;
use crate::params::{ParamRegistry, Subspace};
use crate::store::KvStore;
use crate::types::Address;

use super::params::{Params, KEY_DAO_OWNER, KEY_UPGRADE};
use super::MODULE_NAME;

/// What a `modify_param` call changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamChange {
    Value(Value),
    TransferOwnership(Address),
}

#[derive(Clone)]
pub struct Keeper {
    pub(crate) subspace: Subspace,
    pub(crate) registry: ParamRegistry,
}

impl Keeper {
    pub fn new(registry: &ParamRegistry) -> Result<Self> {
        let subspace = registry.subspace(MODULE_NAME)?.clone();
        Ok(Self { subspace, registry: registry.clone() })
    }

    pub fn params(&self, store: &dyn KvStore) -> Result<Params> {
        Ok(Params {
            dao_owner: self.subspace.get(store, KEY_DAO_OWNER)?.unwrap_or_default(),
            acl: self.acl(store)?,
            upgrade: self.subspace.get::<Option<String>>(store, KEY_UPGRADE)?.flatten(),
        })
    }

    pub fn set_params(&self, store: &mut dyn KvStore, params: &Params) -> Result<()> {
        for pair in &params.acl {
            self.registry.resolve(&pair.key)?;
        }
        self.subspace.set(store, KEY_DAO_OWNER, &params.dao_owner)?;
        self.subspace.set(store, KEY_UPGRADE, &params.upgrade)?;
        for pair in &params.acl {
            self.set_owner(store, &pair.key, pair.owner)?;
        }
        Ok(())
    }

    pub fn init_genesis(&self, store: &mut dyn KvStore, params: &Params) -> Result<()> {
        self.set_params(store, params)?;
        info!("Initialized governance genesis with {} protected parameters", params.acl.len());
        Ok(())
    }

    /// Applies `change` to the `module/name` parameter `key` on behalf of
    /// `requester`. Fails with `Unauthorized` when the key has an owner other
    /// than `requester`; keys without an owner accept any requester.
    pub fn modify_param(
        &self,
        store: &mut dyn KvStore,
        key: &str,
        requester: &Address,
        change: ParamChange,
    ) -> Result<()> {
        let (subspace, name) = self.registry.resolve(key)?;
        self.authorize(store, key, requester)?;
        match change {
            ParamChange::Value(value) => {
                subspace.set_raw(store, name, value)?;
                info!("Parameter {} modified by {}", key, requester);
            }
            ParamChange::TransferOwnership(owner) => {
                self.set_owner(store, key, owner)?;
            }
        }
        Ok(())
    }
}

impl AppModule for Keeper {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }
}
