//! Byte-ordered key/value access.
//!
//! The committed multi-version store belongs to the host; keepers only need
//! point reads and writes plus lexicographically ordered range scans.

pub mod keys;
mod memory;

pub use memory::MemStore;

/// Lazy cursor over a key range. Dropping it releases the underlying cursor,
/// so a visitor that stops early never leaks it.
pub type KvIter<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// Ascending iteration over `[start, end)`; `None` means unbounded.
    fn range<'a>(&'a self, start: &[u8], end: Option<&[u8]>) -> KvIter<'a>;
}

/// Iterate every entry whose key begins with `prefix`, in key order.
pub fn prefix_iter<'a>(store: &'a dyn KvStore, prefix: &[u8]) -> KvIter<'a> {
    let end = prefix_end(prefix);
    store.range(prefix, end.as_deref())
}

/// Smallest key strictly greater than every key starting with `prefix`.
/// Returns `None` when the prefix is all `0xff` bytes (no upper bound).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
