//! Read-only query surface. Responses are pretty-printed JSON.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::KvStore;
use crate::types::{Address, PageRequest};

use super::keeper::Keeper;
use super::types::StakeStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    Validators(PageRequest),
    Validator(Address),
    StakedValidators(PageRequest),
    UnstakingValidators(PageRequest),
    UnstakedValidators(PageRequest),
    SigningInfo(Address),
    SigningInfos(PageRequest),
    Pool,
    Dao,
    Params,
}

impl Keeper {
    pub fn query(&self, store: &dyn KvStore, query: &Query) -> Result<Vec<u8>> {
        let default_limit = self.params(store)?.max_validators as usize;
        let value = match query {
            Query::Validators(page) => to_json(&page.apply(self.all_validators(store)?, default_limit))?,
            Query::Validator(address) => to_json(&self.get_validator(store, address)?)?,
            Query::StakedValidators(page) => {
                to_json(&page.apply(self.staked_validators_by_power(store)?, default_limit))?
            }
            Query::UnstakingValidators(page) => {
                let validators = self.validators_with(store, |v| v.status == StakeStatus::Unstaking)?;
                to_json(&page.apply(validators, default_limit))?
            }
            Query::UnstakedValidators(page) => {
                let validators = self.validators_with(store, |v| v.status == StakeStatus::Unstaked)?;
                to_json(&page.apply(validators, default_limit))?
            }
            Query::SigningInfo(address) => to_json(&self.get_signing_info(store, address)?)?,
            Query::SigningInfos(page) => to_json(&page.apply(self.all_signing_infos(store)?, default_limit))?,
            Query::Pool => to_json(&self.staked_pool(store)?)?,
            Query::Dao => to_json(&self.dao_pool(store)?)?,
            Query::Params => to_json(&self.params(store)?)?,
        };
        Ok(value)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}
