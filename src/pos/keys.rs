//! Key construction for the staking indexes.
//!
//! Fixed-width big-endian integers keep the store's byte order equal to the
//! numeric order; the power index inverts the bits so larger powers sort first.

use crate::error::{Error, Result};
use crate::store::keys::*;
use crate::types::{Address, ADDRESS_LEN};

pub fn validator_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_LEN);
    key.push(VALIDATORS);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn validators_prefix() -> Vec<u8> {
    vec![VALIDATORS]
}

/// `prefix | !power (8 bytes BE) | address`: descending consensus power, then
/// ascending address.
pub fn power_key(power: u64, address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + ADDRESS_LEN);
    key.push(VALIDATORS_BY_POWER);
    key.extend_from_slice(&(!power).to_be_bytes());
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn power_prefix() -> Vec<u8> {
    vec![VALIDATORS_BY_POWER]
}

/// Power reduction the index keys were computed with.
pub fn power_index_reduction_key() -> Vec<u8> {
    vec![POWER_INDEX_REDUCTION]
}

pub fn address_from_power_key(key: &[u8]) -> Result<Address> {
    if key.len() != 1 + 8 + ADDRESS_LEN {
        return Err(Error::Corrupt(format!("power index key has length {}", key.len())));
    }
    Address::from_slice(&key[9..])
}

pub fn prev_state_power_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_LEN);
    key.push(PREV_STATE_POWER);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn prev_state_power_prefix() -> Vec<u8> {
    vec![PREV_STATE_POWER]
}

pub fn address_from_prev_state_key(key: &[u8]) -> Result<Address> {
    match key.split_first() {
        Some((&PREV_STATE_POWER, rest)) => Address::from_slice(rest),
        _ => Err(Error::Corrupt("not a previous-state power key".into())),
    }
}

pub fn prev_state_total_power_key() -> Vec<u8> {
    vec![PREV_STATE_TOTAL_POWER]
}

/// `max_validators` in force when the previous state was written.
pub fn prev_state_cap_key() -> Vec<u8> {
    vec![PREV_STATE_CAP]
}

/// `prefix | completion time (8 bytes BE) | address`: chronological, then by address.
pub fn unstaking_queue_key(completion_time: u64, address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 8 + ADDRESS_LEN);
    key.push(UNSTAKING_QUEUE);
    key.extend_from_slice(&completion_time.to_be_bytes());
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn unstaking_queue_prefix() -> Vec<u8> {
    vec![UNSTAKING_QUEUE]
}

pub fn parse_unstaking_queue_key(key: &[u8]) -> Result<(u64, Address)> {
    if key.len() != 1 + 8 + ADDRESS_LEN || key[0] != UNSTAKING_QUEUE {
        return Err(Error::Corrupt(format!("malformed unstaking queue key of length {}", key.len())));
    }
    let mut time = [0u8; 8];
    time.copy_from_slice(&key[1..9]);
    Ok((u64::from_be_bytes(time), Address::from_slice(&key[9..])?))
}

pub fn dao_pool_key() -> Vec<u8> {
    vec![DAO_POOL]
}

pub fn signing_info_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_LEN);
    key.push(SIGNING_INFO);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn signing_info_prefix() -> Vec<u8> {
    vec![SIGNING_INFO]
}

pub fn missed_block_bitmap_prefix(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_LEN);
    key.push(MISSED_BLOCK_BITMAP);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn missed_block_bitmap_key(address: &Address, index: u64) -> Vec<u8> {
    let mut key = missed_block_bitmap_prefix(address);
    key.extend_from_slice(&index.to_be_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_keys_sort_descending_then_by_address() {
        let low = Address([1; 20]);
        let high = Address([2; 20]);
        let mut keys = vec![
            power_key(10, &high),
            power_key(50, &high),
            power_key(10, &low),
            power_key(u64::MAX, &low),
        ];
        keys.sort();
        assert_eq!(keys[0], power_key(u64::MAX, &low));
        assert_eq!(keys[1], power_key(50, &high));
        assert_eq!(keys[2], power_key(10, &low));
        assert_eq!(keys[3], power_key(10, &high));
        assert_eq!(address_from_power_key(&keys[3]).unwrap(), high);
    }

    #[test]
    fn unstaking_keys_sort_chronologically() {
        let a = Address([9; 20]);
        let b = Address([1; 20]);
        let early = unstaking_queue_key(100, &a);
        let late = unstaking_queue_key(256, &b);
        assert!(early < late);
        assert_eq!(parse_unstaking_queue_key(&late).unwrap(), (256, b));
        assert!(parse_unstaking_queue_key(&late[..10]).is_err());
    }
}
