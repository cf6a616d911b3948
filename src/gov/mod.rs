//! Protected parameters: every ACL entry names the one address allowed to
//! change a `module/name` parameter.
//!
//! A parameter without an entry is unprotected and any caller may change it.
//! Protection is opt-in and has to be registered at genesis through
//! [`Params::acl`].

pub mod acl;
pub mod keeper;
pub mod params;

pub use acl::ACLPair;
pub use keeper::{Keeper, ParamChange};
pub use params::Params;

pub const MODULE_NAME: &str = "gov";

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::params::ParamRegistry;
    use crate::pos;
    use crate::store::MemStore;
    use crate::types::Address;

    pub fn registry() -> ParamRegistry {
        ParamRegistry::new().with(pos::Params::subspace()).with(Params::subspace())
    }

    pub fn keeper() -> Keeper {
        Keeper::new(&registry()).unwrap()
    }

    const OWNER: Address = Address([1; 20]);
    const STRANGER: Address = Address([2; 20]);

    fn protected_store() -> (MemStore, Keeper) {
        let mut store = MemStore::new();
        let gov = keeper();
        let params = Params {
            dao_owner: OWNER,
            acl: vec![ACLPair { key: "pos/max_validators".into(), owner: OWNER }],
            upgrade: None,
        };
        gov.init_genesis(&mut store, &params).unwrap();
        (store, gov)
    }

    #[test]
    fn genesis_params_round_trip() {
        let (store, gov) = protected_store();
        let params = gov.params(&store).unwrap();
        assert_eq!(params.dao_owner, OWNER);
        assert_eq!(params.acl, vec![ACLPair { key: "pos/max_validators".into(), owner: OWNER }]);
        assert_eq!(params.upgrade, None);
    }

    #[test]
    fn only_owner_modifies_protected_param() {
        let (mut store, gov) = protected_store();
        let staking = pos::Keeper::new(crate::codec::Codec::new(), &registry()).unwrap();

        let err = gov
            .modify_param(&mut store, "pos/max_validators", &STRANGER, ParamChange::Value(json!(7)))
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(staking.params(&store).unwrap().max_validators, 100);

        gov.modify_param(&mut store, "pos/max_validators", &OWNER, ParamChange::Value(json!(7)))
            .unwrap();
        assert_eq!(staking.params(&store).unwrap().max_validators, 7);
    }

    #[test]
    fn ownership_transfer_moves_the_right() {
        let (mut store, gov) = protected_store();
        gov.modify_param(&mut store, "pos/max_validators", &OWNER, ParamChange::TransferOwnership(STRANGER))
            .unwrap();
        assert_eq!(gov.get_owner(&store, "pos/max_validators").unwrap(), Some(STRANGER));
        assert!(matches!(
            gov.modify_param(&mut store, "pos/max_validators", &OWNER, ParamChange::Value(json!(3))),
            Err(Error::Unauthorized(_))
        ));
        gov.modify_param(&mut store, "pos/max_validators", &STRANGER, ParamChange::Value(json!(3)))
            .unwrap();
    }

    #[test]
    fn unprotected_param_accepts_any_requester() {
        let (mut store, gov) = protected_store();
        gov.modify_param(&mut store, "pos/unstaking_time", &STRANGER, ParamChange::Value(json!(60)))
            .unwrap();
        gov.modify_param(&mut store, "gov/upgrade", &STRANGER, ParamChange::Value(json!("v2")))
            .unwrap();
        assert_eq!(gov.params(&store).unwrap().upgrade, Some("v2".to_string()));
    }

    #[test]
    fn bad_keys_and_values_are_rejected() {
        let (mut store, gov) = protected_store();
        assert!(matches!(
            gov.modify_param(&mut store, "pos/missing", &OWNER, ParamChange::Value(json!(1))),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            gov.modify_param(&mut store, "pos/max_validators", &OWNER, ParamChange::Value(json!(-1))),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn genesis_with_unknown_acl_key_writes_nothing() {
        let mut store = MemStore::new();
        let params = Params {
            acl: vec![ACLPair { key: "pos/bogus".into(), owner: OWNER }],
            ..Params::default()
        };
        assert!(keeper().init_genesis(&mut store, &params).is_err());
        assert!(store.is_empty());
    }
}
