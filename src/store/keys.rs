//! One-byte prefixes partitioning the shared key space. Every component
//! builds its keys from exactly one of these, so ranges never overlap.

pub const PARAMS: u8 = 0x01;
pub const LAST_BLOCK: u8 = 0x02;

pub const ACCOUNTS: u8 = 0x11;

pub const VALIDATORS: u8 = 0x21;
pub const VALIDATORS_BY_POWER: u8 = 0x22;
pub const PREV_STATE_POWER: u8 = 0x23;
pub const PREV_STATE_TOTAL_POWER: u8 = 0x24;
pub const UNSTAKING_QUEUE: u8 = 0x25;
pub const DAO_POOL: u8 = 0x26;
pub const POWER_INDEX_REDUCTION: u8 = 0x27;
pub const PREV_STATE_CAP: u8 = 0x28;

pub const SIGNING_INFO: u8 = 0x31;
pub const MISSED_BLOCK_BITMAP: u8 = 0x32;

pub const ACL: u8 = 0x41;

pub const KEYBASE: u8 = 0x51;
