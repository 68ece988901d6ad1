use super::{prefix_end, KvIter, KvStore, Order};
use crate::error::Result;
use std::collections::BTreeMap;
use std::ops::Bound;

/// In-memory ordered store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.data.insert(key.to_vec(), value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.data.remove(key);
        Ok(())
    }

    fn prefix_iter<'a>(&'a self, prefix: &[u8], order: Order) -> KvIter<'a> {
        let upper = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let range = self
            .data
            .range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), upper))
            .map(|(k, v)| Ok((k.clone(), v.clone())));
        match order {
            Order::Ascending => Box::new(range),
            Order::Descending => Box::new(range.rev()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(store: &MemStore, prefix: &[u8], order: Order) -> Vec<Vec<u8>> {
        store
            .prefix_iter(prefix, order)
            .map(|r| r.unwrap().0)
            .collect()
    }

    #[test]
    fn test_prefix_iteration_order() {
        let mut store = MemStore::new();
        store.set(b"a/2", vec![2]).unwrap();
        store.set(b"a/1", vec![1]).unwrap();
        store.set(b"b/1", vec![3]).unwrap();
        store.set(b"a", vec![0]).unwrap();

        assert_eq!(
            keys(&store, b"a/", Order::Ascending),
            vec![b"a/1".to_vec(), b"a/2".to_vec()]
        );
        assert_eq!(
            keys(&store, b"a/", Order::Descending),
            vec![b"a/2".to_vec(), b"a/1".to_vec()]
        );
        assert_eq!(keys(&store, b"", Order::Ascending).len(), 4);
    }

    #[test]
    fn test_delete() {
        let mut store = MemStore::new();
        store.set(b"k", vec![1]).unwrap();
        assert!(store.has(b"k").unwrap());
        store.delete(b"k").unwrap();
        assert!(!store.has(b"k").unwrap());
        store.delete(b"k").unwrap();
    }
}
