//! The `KvStore` implementation over a heed environment.

use std::ops::Bound;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use weave_store::{KvStore, StoreError};

use crate::LmdbError;

/// Default LMDB map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

const LEDGER_DB_NAME: &str = "ledger";

/// Durable `KvStore` backend over LMDB.
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

/// Advance `prefix` to the smallest byte string greater than every key it
/// prefixes, for use as an exclusive range upper bound. Returns `false` when
/// no such bound exists (the prefix is empty or all 0xFF).
fn increment_prefix(prefix: &mut Vec<u8>) -> bool {
    while let Some(last) = prefix.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return true;
        }
        prefix.pop();
    }
    false
}

impl LmdbStore {
    /// Open or create an LMDB environment at `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("failed to create directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(1)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let db = env.create_database(&mut wtxn, Some(LEDGER_DB_NAME))?;
        wtxn.commit()?;

        Ok(Self { env, db })
    }

}

impl KvStore for LmdbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self.db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(val.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.db.put(&mut wtxn, key, value).map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.db.delete(&mut wtxn, key).map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn size(&self, prefix: &[u8]) -> Result<u64, StoreError> {
        let mut upper = prefix.to_vec();
        let bounded = increment_prefix(&mut upper);
        let bounds = (
            Bound::Included(prefix),
            if bounded {
                Bound::Excluded(upper.as_slice())
            } else {
                Bound::Unbounded
            },
        );

        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.db.range(&rtxn, &bounds).map_err(LmdbError::from)?;

        let mut count = 0u64;
        for result in iter {
            result.map_err(LmdbError::from)?;
            count += 1;
        }
        Ok(count)
    }

    fn for_each_key(
        &self,
        prefix: &[u8],
        f: &mut dyn FnMut(&[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        // Collect under the read transaction first: the callback is free to
        // write to the store, and LMDB forbids a write transaction while
        // this thread holds a read transaction. The read snapshot also
        // defers concurrently inserted keys to the next scan.
        let keys: Vec<Vec<u8>> = {
            let mut upper = prefix.to_vec();
            let bounded = increment_prefix(&mut upper);
            let bounds = (
                Bound::Included(prefix),
                if bounded {
                    Bound::Excluded(upper.as_slice())
                } else {
                    Bound::Unbounded
                },
            );

            let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
            let iter = self.db.range(&rtxn, &bounds).map_err(LmdbError::from)?;

            let mut keys = Vec::new();
            for result in iter {
                let (key, _val) = result.map_err(LmdbError::from)?;
                keys.push(key[prefix.len()..].to_vec());
            }
            keys
        };

        for key in keys {
            f(&key)?;
        }
        Ok(())
    }
}
