use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

/// Binary codec for every value written to the store.
///
/// Built once at startup and handed to each keeper; there is no process-wide
/// registry of types.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec;

impl Codec {
    pub fn new() -> Self {
        Codec
    }

    pub fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    pub fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| Error::Corrupt(format!("failed to decode value: {}", e)))
    }
}
