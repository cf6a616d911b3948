//! Named parameter subspaces.
//!
//! Each module owns a [`Subspace`] whose [`KeyTable`] lists the parameters it
//! accepts and how to validate a new value. The subspaces are collected into a
//! [`ParamRegistry`] at startup and passed by reference to whoever needs them.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{keys, KvStore};

/// Checks a candidate value before it is written.
pub type ParamValidator = fn(&Value) -> Result<()>;

#[derive(Default, Clone)]
pub struct KeyTable {
    entries: BTreeMap<&'static str, ParamValidator>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    pub fn register(mut self, name: &'static str, validator: ParamValidator) -> Self {
        self.entries.insert(name, validator);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    fn validate(&self, name: &str, value: &Value) -> Result<()> {
        match self.entries.get(name) {
            Some(validator) => validator(value),
            None => Err(Error::NotFound(format!("unknown parameter {}", name))),
        }
    }
}

#[derive(Clone)]
pub struct Subspace {
    name: &'static str,
    table: KeyTable,
}

impl Subspace {
    pub fn new(name: &'static str, table: KeyTable) -> Self {
        Self { name, table }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table(&self) -> &KeyTable {
        &self.table
    }

    fn store_key(&self, param: &str) -> Vec<u8> {
        let mut key = vec![keys::PARAMS];
        key.extend_from_slice(self.name.as_bytes());
        key.push(b'/');
        key.extend_from_slice(param.as_bytes());
        key
    }

    pub fn get_raw(&self, store: &dyn KvStore, param: &str) -> Result<Option<Value>> {
        match store.get(&self.store_key(param)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, store: &dyn KvStore, param: &str) -> Result<Option<T>> {
        match self.get_raw(store, param)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Validates against the key table, then writes.
    pub fn set_raw(&self, store: &mut dyn KvStore, param: &str, value: Value) -> Result<()> {
        self.table.validate(param, &value)?;
        let bytes = serde_json::to_vec(&value)?;
        store.set(&self.store_key(param), bytes);
        Ok(())
    }

    pub fn set<T: Serialize>(&self, store: &mut dyn KvStore, param: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set_raw(store, param, value)
    }
}

/// All parameter subspaces known to the application.
#[derive(Default, Clone)]
pub struct ParamRegistry {
    subspaces: BTreeMap<&'static str, Subspace>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self { subspaces: BTreeMap::new() }
    }

    pub fn with(mut self, subspace: Subspace) -> Self {
        self.subspaces.insert(subspace.name, subspace);
        self
    }

    pub fn subspace(&self, name: &str) -> Result<&Subspace> {
        self.subspaces
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("unknown parameter subspace {}", name)))
    }

    /// Resolves a `module/name` key to its subspace and parameter name.
    pub fn resolve<'k>(&self, key: &'k str) -> Result<(&Subspace, &'k str)> {
        let (module, param) = split_key(key)?;
        let subspace = self.subspace(module)?;
        if !subspace.table.contains(param) {
            return Err(Error::NotFound(format!("unknown parameter {}", key)));
        }
        Ok((subspace, param))
    }
}

/// Splits `module/name` into its two halves.
pub fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('/') {
        Some((module, param)) if !module.is_empty() && !param.is_empty() => Ok((module, param)),
        _ => Err(Error::InvalidArgument(format!("parameter key must be module/name, got {:?}", key))),
    }
}

/// Validator accepting any non-negative integer.
pub fn validate_u64(value: &Value) -> Result<()> {
    value
        .as_u64()
        .map(|_| ())
        .ok_or_else(|| Error::InvalidArgument(format!("expected unsigned integer, got {}", value)))
}

/// Validator accepting a strictly positive integer.
pub fn validate_positive_u64(value: &Value) -> Result<()> {
    match value.as_u64() {
        Some(n) if n > 0 => Ok(()),
        _ => Err(Error::InvalidArgument(format!("expected positive integer, got {}", value))),
    }
}

/// Validator for basis-point fractions (0..=10_000).
pub fn validate_basis_points(value: &Value) -> Result<()> {
    match value.as_u64() {
        Some(n) if n <= 10_000 => Ok(()),
        _ => Err(Error::InvalidArgument(format!("expected basis points in 0..=10000, got {}", value))),
    }
}

/// Validator for percentages (0..=100).
pub fn validate_percent(value: &Value) -> Result<()> {
    match value.as_u64() {
        Some(n) if n <= 100 => Ok(()),
        _ => Err(Error::InvalidArgument(format!("expected percentage in 0..=100, got {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use serde_json::json;

    fn registry() -> ParamRegistry {
        let table = KeyTable::new()
            .register("limit", validate_positive_u64)
            .register("ratio", validate_percent);
        ParamRegistry::new().with(Subspace::new("demo", table))
    }

    #[test]
    fn set_then_get_typed() {
        let mut store = MemStore::new();
        let reg = registry();
        let space = reg.subspace("demo").unwrap();
        space.set(&mut store, "limit", &42u64).unwrap();
        assert_eq!(space.get::<u64>(&store, "limit").unwrap(), Some(42));
        assert_eq!(space.get::<u64>(&store, "ratio").unwrap(), None);
    }

    #[test]
    fn invalid_values_are_rejected_before_write() {
        let mut store = MemStore::new();
        let reg = registry();
        let space = reg.subspace("demo").unwrap();
        assert!(matches!(space.set_raw(&mut store, "ratio", json!(101)), Err(Error::InvalidArgument(_))));
        assert!(matches!(space.set_raw(&mut store, "nope", json!(1)), Err(Error::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn resolve_checks_module_and_name() {
        let reg = registry();
        assert_eq!(reg.resolve("demo/limit").unwrap().1, "limit");
        assert!(matches!(reg.resolve("demo/other"), Err(Error::NotFound(_))));
        assert!(matches!(reg.resolve("other/limit"), Err(Error::NotFound(_))));
        assert!(matches!(reg.resolve("nolimit"), Err(Error::InvalidArgument(_))));
    }
}
