use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::params::{
    validate_basis_points, validate_percent, validate_positive_u64, validate_u64, KeyTable, Subspace,
};
use crate::store::{KvStore, MemStore};

use super::MODULE_NAME;

pub const KEY_UNSTAKING_TIME: &str = "unstaking_time";
pub const KEY_MAX_VALIDATORS: &str = "max_validators";
pub const KEY_POWER_REDUCTION: &str = "power_reduction";
pub const KEY_SIGNED_BLOCKS_WINDOW: &str = "signed_blocks_window";
pub const KEY_MIN_SIGNED_PER_WINDOW: &str = "min_signed_per_window";
pub const KEY_DOWNTIME_JAIL_DURATION: &str = "downtime_jail_duration";
pub const KEY_SLASH_FRACTION_DOWNTIME: &str = "slash_fraction_downtime";
pub const KEY_SLASH_FRACTION_DOUBLE_SIGN: &str = "slash_fraction_double_sign";
pub const KEY_MAX_EVIDENCE_AGE: &str = "max_evidence_age";

/// Staking and slashing parameters. Durations are in seconds, fractions in
/// basis points (1/100 of 1%).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub unstaking_time: u64,
    pub max_validators: u64,
    /// Staked tokens per unit of consensus power.
    pub power_reduction: u64,
    pub signed_blocks_window: u64,
    /// Percentage of the window a validator must sign to stay out of jail.
    pub min_signed_per_window: u64,
    pub downtime_jail_duration: u64,
    pub slash_fraction_downtime: u64,
    pub slash_fraction_double_sign: u64,
    pub max_evidence_age: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            unstaking_time: 21 * 24 * 60 * 60,
            max_validators: 100,
            power_reduction: 1,
            signed_blocks_window: 100,
            min_signed_per_window: 50,
            downtime_jail_duration: 600,
            slash_fraction_downtime: 100,
            slash_fraction_double_sign: 500,
            max_evidence_age: 21 * 24 * 60 * 60,
        }
    }
}

impl Params {
    pub fn key_table() -> KeyTable {
        KeyTable::new()
            .register(KEY_UNSTAKING_TIME, validate_positive_u64)
            .register(KEY_MAX_VALIDATORS, validate_positive_u64)
            .register(KEY_POWER_REDUCTION, validate_positive_u64)
            .register(KEY_SIGNED_BLOCKS_WINDOW, validate_positive_u64)
            .register(KEY_MIN_SIGNED_PER_WINDOW, validate_percent)
            .register(KEY_DOWNTIME_JAIL_DURATION, validate_u64)
            .register(KEY_SLASH_FRACTION_DOWNTIME, validate_basis_points)
            .register(KEY_SLASH_FRACTION_DOUBLE_SIGN, validate_basis_points)
            .register(KEY_MAX_EVIDENCE_AGE, validate_u64)
    }

    pub fn subspace() -> Subspace {
        Subspace::new(MODULE_NAME, Self::key_table())
    }

    /// Most blocks a validator may miss within one window.
    pub fn max_missed_blocks(&self) -> u64 {
        let min_signed = self.signed_blocks_window.saturating_mul(self.min_signed_per_window) / 100;
        self.signed_blocks_window - min_signed
    }

    /// Reads every parameter, falling back to the default for unset keys.
    pub fn load(subspace: &Subspace, store: &dyn KvStore) -> Result<Self> {
        let defaults = match serde_json::to_value(Params::default())? {
            Value::Object(map) => map,
            _ => return Err(Error::Corrupt("params did not encode as an object".into())),
        };
        let mut merged = Map::new();
        for (name, default) in defaults {
            let value = subspace.get_raw(store, &name)?.unwrap_or(default);
            merged.insert(name, value);
        }
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    /// Validates and writes every parameter.
    pub fn store(&self, subspace: &Subspace, store: &mut dyn KvStore) -> Result<()> {
        let fields = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => return Err(Error::Corrupt("params did not encode as an object".into())),
        };
        // dry run first so a bad value leaves the real store untouched
        let mut scratch = MemStore::new();
        for (name, value) in &fields {
            subspace.set_raw(&mut scratch, name, value.clone())?;
        }
        for (name, value) in fields {
            subspace.set_raw(store, &name, value)?;
        }
        Ok(())
    }
}
