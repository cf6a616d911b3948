use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::params::{KeyTable, Subspace};
use crate::types::Address;

use super::acl::ACLPair;
use super::MODULE_NAME;

pub const KEY_DAO_OWNER: &str = "dao_owner";
pub const KEY_UPGRADE: &str = "upgrade";

/// Governance parameters. `acl` is kept in its own key range; the other
/// fields live in the `gov` subspace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub dao_owner: Address,
    pub acl: Vec<ACLPair>,
    /// Pending upgrade description, if any.
    pub upgrade: Option<String>,
}

impl Params {
    pub fn key_table() -> KeyTable {
        KeyTable::new()
            .register(KEY_DAO_OWNER, validate_address)
            .register(KEY_UPGRADE, validate_upgrade)
    }

    pub fn subspace() -> Subspace {
        Subspace::new(MODULE_NAME, Self::key_table())
    }
}

fn validate_address(value: &Value) -> Result<()> {
    match value.as_str() {
        Some(s) if s.parse::<Address>().is_ok() => Ok(()),
        _ => Err(Error::InvalidArgument(format!("expected hex address, got {}", value))),
    }
}

fn validate_upgrade(value: &Value) -> Result<()> {
    match value {
        Value::Null | Value::String(_) => Ok(()),
        _ => Err(Error::InvalidArgument(format!("expected upgrade string or null, got {}", value))),
    }
}
