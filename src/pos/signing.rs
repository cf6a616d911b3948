//! Per-validator liveness tracking, downtime jailing and double-sign tombstoning.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::{prefix_iter, KvStore};
use crate::types::{Address, BlockHeader, Evidence};

use super::keeper::Keeper;
use super::keys;
use super::types::ValidatorSigningInfo;

/// Jail end for tombstoned validators: they never serve out their sentence.
pub const DOUBLE_SIGN_JAIL_END_TIME: u64 = u64::MAX;

impl Keeper {
    pub fn signing_info(&self, store: &dyn KvStore, address: &Address) -> Result<Option<ValidatorSigningInfo>> {
        match store.get(&keys::signing_info_key(address)) {
            Some(bytes) => Ok(Some(self.codec.unmarshal(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_signing_info(&self, store: &dyn KvStore, address: &Address) -> Result<ValidatorSigningInfo> {
        self.signing_info(store, address)?
            .ok_or_else(|| Error::NotFound(format!("signing info for {}", address)))
    }

    pub fn set_signing_info(&self, store: &mut dyn KvStore, info: &ValidatorSigningInfo) -> Result<()> {
        store.set(&keys::signing_info_key(&info.address), self.codec.marshal(info)?);
        Ok(())
    }

    /// Visits signing infos in address order until `visitor` returns true.
    pub fn iterate_signing_infos<F>(&self, store: &dyn KvStore, mut visitor: F) -> Result<()>
    where
        F: FnMut(&ValidatorSigningInfo) -> bool,
    {
        for (_, bytes) in prefix_iter(store, &keys::signing_info_prefix()) {
            let info: ValidatorSigningInfo = self.codec.unmarshal(&bytes)?;
            if visitor(&info) {
                break;
            }
        }
        Ok(())
    }

    pub fn all_signing_infos(&self, store: &dyn KvStore) -> Result<Vec<ValidatorSigningInfo>> {
        let mut infos = Vec::new();
        self.iterate_signing_infos(store, |info| {
            infos.push(info.clone());
            false
        })?;
        Ok(infos)
    }

    pub fn missed_block(&self, store: &dyn KvStore, address: &Address, index: u64) -> bool {
        store.has(&keys::missed_block_bitmap_key(address, index))
    }

    fn set_missed_block(&self, store: &mut dyn KvStore, address: &Address, index: u64, missed: bool) {
        let key = keys::missed_block_bitmap_key(address, index);
        if missed {
            store.set(&key, vec![1]);
        } else {
            store.delete(&key);
        }
    }

    fn clear_missed_blocks(&self, store: &mut dyn KvStore, address: &Address) {
        let keys: Vec<Vec<u8>> = prefix_iter(store, &keys::missed_block_bitmap_prefix(address))
            .map(|(k, _)| k)
            .collect();
        for key in keys {
            store.delete(&key);
        }
    }

    /// Records whether `address` signed the previous block. Jails and slashes
    /// the validator once it misses too many blocks within the window.
    pub fn handle_validator_signature(
        &self,
        store: &mut dyn KvStore,
        header: &BlockHeader,
        address: &Address,
        signed: bool,
    ) -> Result<()> {
        let validator = self.get_validator(store, address)?;
        if validator.jailed || validator.is_unstaked() {
            debug!("Ignoring signature of inactive validator {}", address);
            return Ok(());
        }
        let params = self.params(store)?;
        let mut info = match self.signing_info(store, address)? {
            Some(info) => info,
            None => ValidatorSigningInfo::new(*address, header.height),
        };

        let window = params.signed_blocks_window.max(1);
        let index = info.index_offset % window;
        info.index_offset += 1;

        let previously_missed = self.missed_block(store, address, index);
        let missed = !signed;
        match (previously_missed, missed) {
            (false, true) => {
                self.set_missed_block(store, address, index, true);
                info.missed_blocks_counter += 1;
            }
            (true, false) => {
                self.set_missed_block(store, address, index, false);
                info.missed_blocks_counter = info.missed_blocks_counter.saturating_sub(1);
            }
            _ => {}
        }

        if missed {
            debug!(
                "Validator {} missed block {} ({} of {} allowed)",
                address,
                header.height,
                info.missed_blocks_counter,
                params.max_missed_blocks()
            );
        }

        let min_height = info.start_height.saturating_add(window);
        if header.height > min_height && info.missed_blocks_counter > params.max_missed_blocks() {
            warn!(
                "Validator {} is jailed for downtime: missed {} blocks in window of {}",
                address, info.missed_blocks_counter, window
            );
            self.slash(store, address, header.height, params.slash_fraction_downtime)?;
            self.jail(store, address)?;
            info.jailed_until = header.time.saturating_add(params.downtime_jail_duration);
            info.missed_blocks_counter = 0;
            info.index_offset = 0;
            self.clear_missed_blocks(store, address);
        }

        self.set_signing_info(store, &info)
    }

    /// Slashes, jails and tombstones a validator for double signing.
    /// Evidence older than `max_evidence_age` is ignored.
    pub fn handle_double_sign(&self, store: &mut dyn KvStore, header: &BlockHeader, evidence: &Evidence) -> Result<()> {
        let params = self.params(store)?;
        let age = header.time.saturating_sub(evidence.time);
        if age > params.max_evidence_age {
            info!(
                "Ignoring double-sign evidence for {} at height {}: too old ({}s)",
                evidence.address, evidence.height, age
            );
            return Ok(());
        }

        let validator = match self.get_validator(store, &evidence.address) {
            Ok(v) => v,
            Err(Error::NotFound(_)) => {
                warn!("Ignoring double-sign evidence for unknown validator {}", evidence.address);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let mut info = match self.signing_info(store, &evidence.address)? {
            Some(info) => info,
            None => ValidatorSigningInfo::new(evidence.address, header.height),
        };
        if info.tombstoned {
            info!("Ignoring double-sign evidence for already tombstoned validator {}", evidence.address);
            return Ok(());
        }

        self.slash(store, &evidence.address, evidence.height, params.slash_fraction_double_sign)?;
        if !validator.is_unstaked() {
            self.jail(store, &evidence.address)?;
        }
        info.jailed_until = DOUBLE_SIGN_JAIL_END_TIME;
        info.tombstoned = true;
        self.set_signing_info(store, &info)?;

        warn!(
            "Validator {} tombstoned for double signing at height {}",
            evidence.address, evidence.height
        );
        Ok(())
    }
}
