//! Shared primitive types: addresses, public keys and block context.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const ADDRESS_LEN: usize = 20;
pub const PUBLIC_KEY_LEN: usize = 32;

/// Account / validator address: the first 20 bytes of SHA-256 over the public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| Error::Corrupt(format!("address must be {} bytes, got {}", ADDRESS_LEN, bytes.len())))?;
        Ok(Address(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidArgument(format!("bad address hex: {}", e)))?;
        Address::from_slice(&bytes).map_err(|_| Error::InvalidArgument(format!("bad address length: {}", s)))
    }
}

/// Ed25519 public key bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::Corrupt(format!("public key must be {} bytes, got {}", PUBLIC_KEY_LEN, bytes.len())))?;
        Ok(PublicKey(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn address(&self) -> Address {
        let digest = Sha256::digest(self.0);
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(&digest[..ADDRESS_LEN]);
        Address(addr)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidArgument(format!("bad public key hex: {}", e)))?;
        PublicKey::from_slice(&bytes).map_err(|_| Error::InvalidArgument(format!("bad public key length: {}", s)))
    }
}

// Both types travel as hex strings so that query output stays readable.
macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_serde!(Address);
hex_serde!(PublicKey);

/// Header of the block currently being applied. Time is in Unix seconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub time: u64,
}

impl BlockHeader {
    pub fn new(height: u64, time: u64) -> Self {
        Self { height, time }
    }
}

/// One validator's participation in the previous block's commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub address: Address,
    pub signed_last_block: bool,
}

/// Proof of equivocation reported by the consensus engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub address: Address,
    pub height: u64,
    pub time: u64,
}

/// Everything the consensus engine hands over at the start of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginBlockRequest {
    pub header: BlockHeader,
    pub last_commit: Vec<VoteInfo>,
    pub evidence: Vec<Evidence>,
}

/// 1-based page selection used by the query surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }
    }

    /// Returns the `[start, end)` window over `total` items, or `None` for an
    /// empty page (page 0 or a start beyond the end). A zero limit falls back
    /// to `default_limit`.
    pub fn window(&self, total: usize, default_limit: usize) -> Option<(usize, usize)> {
        if self.page == 0 {
            return None;
        }
        let limit = if self.limit == 0 { default_limit } else { self.limit };
        let start = (self.page - 1).checked_mul(limit)?;
        if start >= total {
            return None;
        }
        let end = start.saturating_add(limit).min(total);
        Some((start, end))
    }

    pub fn apply<T>(&self, items: Vec<T>, default_limit: usize) -> Vec<T> {
        match self.window(items.len(), default_limit) {
            Some((start, end)) => items.into_iter().skip(start).take(end - start).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_truncated_sha256_of_public_key() {
        let pk = PublicKey([7u8; 32]);
        let digest = Sha256::digest([7u8; 32]);
        assert_eq!(pk.address().as_bytes(), &digest[..20]);
    }

    #[test]
    fn address_parses_its_own_display() {
        let addr = PublicKey([3u8; 32]).address();
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
        assert!("abcd".parse::<Address>().is_err());
    }

    #[test]
    fn address_serializes_as_hex_json() {
        let addr = Address([0xab; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn pagination_windows() {
        let page = |p, l| PageRequest::new(p, l);
        assert_eq!(page(0, 10).window(5, 100), None);
        assert_eq!(page(1, 2).window(5, 100), Some((0, 2)));
        assert_eq!(page(3, 2).window(5, 100), Some((4, 5)));
        assert_eq!(page(4, 2).window(5, 100), None);
        assert_eq!(page(1, 0).window(5, 3), Some((0, 3)));
        assert_eq!(page(2, 2).apply(vec![1, 2, 3, 4, 5], 10), vec![3, 4]);
    }
}
