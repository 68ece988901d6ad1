//! sled-backed module store

use std::path::Path;
use tracing::info;
use wta::store::{KvIter, Write};
use wta::{Error, KvStore, Order, Result};

fn sled_err(e: sled::Error) -> Error {
    Error::Store(format!("sled: {}", e))
}

/// [`KvStore`] over one sled tree; batches are applied atomically
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<Self> {
        info!("opening storage at {}", path.display());
        let db = sled::open(path).map_err(sled_err)?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(sled_err)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(sled_err)
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.db.insert(key, value).map_err(sled_err)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.db.remove(key).map_err(sled_err)?;
        Ok(())
    }

    fn prefix_iter<'a>(&'a self, prefix: &[u8], order: Order) -> KvIter<'a> {
        let iter = self.db.scan_prefix(prefix);
        let entries = move |item: sled::Result<(sled::IVec, sled::IVec)>| {
            item.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(sled_err)
        };
        match order {
            Order::Ascending => Box::new(iter.map(entries)),
            Order::Descending => Box::new(iter.rev().map(entries)),
        }
    }

    fn write_batch(&mut self, writes: Vec<Write>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (key, value) in writes {
            match value {
                Some(v) => batch.insert(key, v),
                None => batch.remove(key),
            }
        }
        self.db.apply_batch(batch).map_err(sled_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        assert!(store.is_empty());

        store.set(b"wta/draw", vec![1, 2, 3]).unwrap();
        assert_eq!(store.get(b"wta/draw").unwrap(), Some(vec![1, 2, 3]));
        assert!(store.has(b"wta/draw").unwrap());

        store.delete(b"wta/draw").unwrap();
        assert_eq!(store.get(b"wta/draw").unwrap(), None);
    }

    #[test]
    fn test_storage_prefix_order() {
        let dir = tempdir().unwrap();
        let mut store = SledStore::open(dir.path()).unwrap();
        store
            .write_batch(vec![
                (b"t/b".to_vec(), Some(vec![2])),
                (b"t/a".to_vec(), Some(vec![1])),
                (b"u/a".to_vec(), Some(vec![9])),
            ])
            .unwrap();

        let asc: Vec<_> = store
            .prefix_iter(b"t/", Order::Ascending)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(asc, vec![b"t/a".to_vec(), b"t/b".to_vec()]);

        let desc: Vec<_> = store
            .prefix_iter(b"t/", Order::Descending)
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(desc, vec![vec![2], vec![1]]);

        store
            .write_batch(vec![(b"t/a".to_vec(), None)])
            .unwrap();
        assert_eq!(store.prefix_iter(b"t/", Order::Ascending).count(), 1);
    }

    #[test]
    fn test_storage_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = SledStore::open(dir.path()).unwrap();
            store.set(b"k", vec![7]).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(vec![7]));
    }
}
