use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::{keys, prefix_iter, KvStore};
use crate::types::Address;

use super::keeper::Keeper;

/// Owner of one protected parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ACLPair {
    pub key: String,
    pub owner: Address,
}

fn acl_key(param: &str) -> Vec<u8> {
    let mut key = vec![keys::ACL];
    key.extend_from_slice(param.as_bytes());
    key
}

impl Keeper {
    pub fn get_owner(&self, store: &dyn KvStore, param: &str) -> Result<Option<Address>> {
        match store.get(&acl_key(param)) {
            Some(bytes) => Ok(Some(Address::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Registers or replaces the owner of `param`. Entries are never removed.
    pub fn set_owner(&self, store: &mut dyn KvStore, param: &str, owner: Address) -> Result<()> {
        self.registry.resolve(param)?;
        store.set(&acl_key(param), owner.as_bytes().to_vec());
        info!("Owner of parameter {} set to {}", param, owner);
        Ok(())
    }

    /// Checks that `requester` may change `param`.
    pub fn authorize(&self, store: &dyn KvStore, param: &str, requester: &Address) -> Result<()> {
        match self.get_owner(store, param)? {
            Some(owner) if owner != *requester => Err(Error::Unauthorized(format!(
                "{} is not the owner of parameter {}",
                requester, param
            ))),
            _ => Ok(()),
        }
    }

    /// Every registered pair in key order.
    pub fn acl(&self, store: &dyn KvStore) -> Result<Vec<ACLPair>> {
        prefix_iter(store, &[keys::ACL])
            .map(|(key, owner)| -> Result<ACLPair> {
                let key = String::from_utf8(key[1..].to_vec())
                    .map_err(|_| Error::Corrupt("ACL key is not valid UTF-8".into()))?;
                Ok(ACLPair { key, owner: Address::from_slice(&owner)? })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gov::tests::keeper;
    use crate::store::MemStore;

    #[test]
    fn owner_can_be_replaced_but_not_removed() {
        let mut store = MemStore::new();
        let gov = keeper();
        assert_eq!(gov.get_owner(&store, "pos/max_validators").unwrap(), None);

        gov.set_owner(&mut store, "pos/max_validators", Address([1; 20])).unwrap();
        gov.set_owner(&mut store, "pos/max_validators", Address([2; 20])).unwrap();
        assert_eq!(gov.get_owner(&store, "pos/max_validators").unwrap(), Some(Address([2; 20])));
        assert_eq!(gov.acl(&store).unwrap().len(), 1);
    }

    #[test]
    fn unknown_parameters_cannot_be_protected() {
        let mut store = MemStore::new();
        let gov = keeper();
        assert!(matches!(
            gov.set_owner(&mut store, "pos/nope", Address([1; 20])),
            Err(Error::NotFound(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn unregistered_parameter_is_open_to_anyone() {
        let store = MemStore::new();
        let gov = keeper();
        assert!(gov.authorize(&store, "pos/unstaking_time", &Address([9; 20])).is_ok());
    }
}
