use super::{prefix_end, KvIter, KvPair, KvStore, Order, Write};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Write-buffering branch over a parent store.
///
/// Reads see the branch's own writes layered on top of the parent. Nothing
/// reaches the parent until the host takes [`StoreCache::into_writes`] and
/// applies them; dropping the cache discards the branch.
pub struct StoreCache<'p> {
    parent: &'p dyn KvStore,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'p> StoreCache<'p> {
    pub fn new(parent: &'p dyn KvStore) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Resume a branch from writes taken out of an earlier one
    pub fn with_writes(parent: &'p dyn KvStore, writes: Vec<Write>) -> Self {
        Self {
            parent,
            writes: writes.into_iter().collect(),
        }
    }

    /// Buffered writes in key order, ready for [`KvStore::write_batch`]
    pub fn into_writes(self) -> Vec<Write> {
        self.writes.into_iter().collect()
    }
}

impl KvStore for StoreCache<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.writes.get(key) {
            Some(pending) => Ok(pending.clone()),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.writes.insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn prefix_iter<'a>(&'a self, prefix: &[u8], order: Order) -> KvIter<'a> {
        let mut merged = BTreeMap::new();
        for item in self.parent.prefix_iter(prefix, Order::Ascending) {
            match item {
                Ok((k, v)) => {
                    merged.insert(k, v);
                }
                Err(e) => return Box::new(std::iter::once(Err(e))),
            }
        }

        let upper = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        for (k, pending) in self
            .writes
            .range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), upper))
        {
            match pending {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }

        let entries = merged.into_iter().map(Ok::<KvPair, Error>);
        match order {
            Order::Ascending => Box::new(entries),
            Order::Descending => Box::new(entries.rev()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[test]
    fn test_reads_see_own_writes() {
        let mut parent = MemStore::new();
        parent.set(b"p/1", vec![1]).unwrap();
        parent.set(b"p/2", vec![2]).unwrap();

        let mut cache = StoreCache::new(&parent);
        cache.delete(b"p/1").unwrap();
        cache.set(b"p/3", vec![3]).unwrap();

        assert_eq!(cache.get(b"p/1").unwrap(), None);
        assert_eq!(cache.get(b"p/2").unwrap(), Some(vec![2]));
        let keys: Vec<_> = cache
            .prefix_iter(b"p/", Order::Descending)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, vec![b"p/3".to_vec(), b"p/2".to_vec()]);

        // parent untouched until commit
        assert_eq!(parent.get(b"p/1").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_commit_and_discard() {
        let mut parent = MemStore::new();

        let mut cache = StoreCache::new(&parent);
        cache.set(b"k", vec![9]).unwrap();
        drop(cache);
        assert!(parent.is_empty());

        let mut cache = StoreCache::new(&parent);
        cache.set(b"k", vec![9]).unwrap();
        let writes = cache.into_writes();
        parent.write_batch(writes).unwrap();
        assert_eq!(parent.get(b"k").unwrap(), Some(vec![9]));
    }

    #[test]
    fn test_resume_from_writes() {
        let mut parent = MemStore::new();
        parent.set(b"k/1", vec![1]).unwrap();

        let mut cache = StoreCache::new(&parent);
        cache.delete(b"k/1").unwrap();
        cache.set(b"k/2", vec![2]).unwrap();
        let writes = cache.into_writes();

        let resumed = StoreCache::with_writes(&parent, writes.clone());
        assert_eq!(resumed.get(b"k/1").unwrap(), None);
        assert_eq!(resumed.get(b"k/2").unwrap(), Some(vec![2]));
        assert_eq!(resumed.into_writes(), writes);
        assert_eq!(parent.get(b"k/1").unwrap(), Some(vec![1]));
    }

    #[test]
    fn test_nested_branches() {
        let parent = MemStore::new();
        let mut outer = StoreCache::new(&parent);
        outer.set(b"a", vec![1]).unwrap();
        {
            let mut inner = StoreCache::new(&outer);
            inner.set(b"b", vec![2]).unwrap();
            assert_eq!(inner.get(b"a").unwrap(), Some(vec![1]));
            let writes = inner.into_writes();
            outer.write_batch(writes).unwrap();
        }
        assert_eq!(outer.get(b"b").unwrap(), Some(vec![2]));
    }
}
