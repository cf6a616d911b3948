//! Node configuration, read from a JSON file. Every field has a default, so
//! a missing file or a partial one is fine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::auth::GenesisAccount;
use crate::cryptography::keybase::DEFAULT_KDF_ITERATIONS;
use crate::gov;
use crate::pos::{self, GenesisValidator};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub state_path: PathBuf,
    pub keybase_path: PathBuf,
    /// PBKDF2 rounds for newly encrypted keys.
    pub kdf_iterations: u32,
    pub block_interval_ms: u64,
    pub genesis: Genesis,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("julius-state.bin"),
            keybase_path: PathBuf::from("julius-keys.bin"),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            block_interval_ms: 1_000,
            genesis: Genesis::default(),
        }
    }
}

/// State written when the node starts on an empty store.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Genesis {
    pub time: u64,
    pub accounts: Vec<GenesisAccount>,
    pub pos: pos::Params,
    pub gov: gov::Params,
    pub validators: Vec<GenesisValidator>,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}
