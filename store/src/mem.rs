//! In-memory storage backend.
//!
//! A `Mutex<BTreeMap>` keyed on raw bytes. Used by unit tests and available
//! for ephemeral nodes; the ordered map gives the same prefix-scan shape as
//! the LMDB backend.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Mutex;

use crate::{KvStore, StoreError};

/// Volatile `KvStore` backend.
#[derive(Default)]
pub struct MemStore {
    map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, StoreError> {
        self.map
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn size(&self, prefix: &[u8]) -> Result<u64, StoreError> {
        let map = self.lock()?;
        let count = map
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .count();
        Ok(count as u64)
    }

    fn for_each_key(
        &self,
        prefix: &[u8],
        f: &mut dyn FnMut(&[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        // Snapshot the matching keys first so `f` may freely mutate the
        // store; keys inserted while iterating surface on the next scan.
        let keys: Vec<Vec<u8>> = {
            let map = self.lock()?;
            map.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k[prefix.len()..].to_vec())
                .collect()
        };

        for key in keys {
            f(&key)?;
        }
        Ok(())
    }
}
