//! durable state store abstraction
//!
//! The module only ever sees a [`KvStore`]: an ordered byte-keyed map with
//! prefix iteration. Hosts decide where the bytes live ([`MemStore`] in
//! process, sled in `casinod`) and wrap each transaction or block in a
//! [`StoreCache`] so that a failed step leaves nothing behind.

mod cache;
mod mem;

pub use cache::StoreCache;
pub use mem::MemStore;

use crate::error::Result;

pub type KvPair = (Vec<u8>, Vec<u8>);

/// Lazy sequence of entries under a prefix
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<KvPair>> + 'a>;

/// Iteration direction over store keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// A pending write: `Some(value)` sets, `None` deletes
pub type Write = (Vec<u8>, Option<Vec<u8>>);

pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    /// Entries whose key starts with `prefix`, sorted by key in `order`
    fn prefix_iter<'a>(&'a self, prefix: &[u8], order: Order) -> KvIter<'a>;

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a set of writes. Backends that can should do it atomically.
    fn write_batch(&mut self, writes: Vec<Write>) -> Result<()> {
        for (key, value) in writes {
            match value {
                Some(v) => self.set(&key, v)?,
                None => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

/// Smallest key greater than every key starting with `prefix`, if any
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_end(&[0x01, 0xff]), Some(vec![0x02]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
        assert_eq!(prefix_end(b""), None);
    }
}
