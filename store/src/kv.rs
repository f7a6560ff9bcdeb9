//! The byte-keyed store trait.

use crate::StoreError;

/// A durable byte-keyed map with prefix iteration.
///
/// Acceptance state is externalized into a `KvStore`: the engine's two
/// buckets and the resolver's conflict-set mirror are key ranges identified
/// by prefix. Implementations must make each individual operation atomic;
/// callers never hold their own locks across a store call.
pub trait KvStore: Send + Sync {
    /// Read the value under `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` under `key`, replacing any existing value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Number of keys starting with `prefix`.
    fn size(&self, prefix: &[u8]) -> Result<u64, StoreError>;

    /// Invoke `f` for every key starting with `prefix`, with the prefix
    /// stripped from the key passed to `f`.
    ///
    /// Iteration covers a snapshot of the keys present when the call
    /// started; keys inserted concurrently are not visited. Returning an
    /// error from `f` stops the iteration and propagates the error.
    fn for_each_key(
        &self,
        prefix: &[u8],
        f: &mut dyn FnMut(&[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}
