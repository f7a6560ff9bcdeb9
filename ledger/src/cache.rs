//! Bounded LRU caches for the execution hot path.
//!
//! Two structurally identical caches back contract execution: compiled VM
//! instances keyed by 32-byte transaction id, and collapsed-state snapshots
//! keyed by a 64-bit ancestry fingerprint. Both are instantiations of the
//! generic [`Lru`] below.
//!
//! The LRU keeps a `HashMap` of slots plus a `VecDeque` of access stamps.
//! Each touch pushes a fresh `(stamp, key)` record and re-stamps the slot;
//! eviction pops from the front, skipping records whose stamp no longer
//! matches the slot (lazy tombstones). The queue is compacted once it
//! outgrows the live entry count.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use weave_types::TxId;

/// Compiled VM instances, keyed by transaction id.
pub type VmCache = Lru<TxId, Arc<VmInstance>>;

/// Collapsed-state snapshots, keyed by ancestry fingerprint.
pub type StateCache = Lru<u64, Arc<CollapseState>>;

/// A compiled contract instance produced by the execution engine. Opaque to
/// the ledger; caching it saves recompiling the same contract for every
/// execution.
#[derive(Debug, PartialEq, Eq)]
pub struct VmInstance {
    artifact: Vec<u8>,
}

impl VmInstance {
    pub fn new(artifact: Vec<u8>) -> Self {
        Self { artifact }
    }

    pub fn artifact(&self) -> &[u8] {
        &self.artifact
    }
}

/// Ledger state collapsed down one transaction's ancestry. Opaque to the
/// ledger; caching it saves re-collapsing shared ancestry prefixes.
#[derive(Debug, PartialEq, Eq)]
pub struct CollapseState {
    snapshot: Vec<u8>,
}

impl CollapseState {
    pub fn new(snapshot: Vec<u8>) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &[u8] {
        &self.snapshot
    }
}

struct Slot<V> {
    value: V,
    stamp: u64,
}

struct Inner<K, V> {
    size: usize,
    entries: HashMap<K, Slot<V>>,
    /// Access order, oldest first. Stale records (stamp mismatch) are
    /// skipped on eviction and dropped on compaction.
    access: VecDeque<(u64, K)>,
    clock: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn stamp(&mut self, key: &K) -> u64 {
        self.clock += 1;
        self.access.push_back((self.clock, key.clone()));
        self.clock
    }

    fn touch(&mut self, key: &K) {
        let stamp = self.stamp(key);
        if let Some(slot) = self.entries.get_mut(key) {
            slot.stamp = stamp;
        }
        self.compact();
    }

    fn insert(&mut self, key: K, value: V) {
        let stamp = self.stamp(&key);
        self.entries.insert(key, Slot { value, stamp });
        self.evict_to_bound();
        self.compact();
    }

    fn evict_to_bound(&mut self) {
        while self.entries.len() > self.size {
            let Some((stamp, key)) = self.access.pop_front() else {
                break;
            };
            let live = self
                .entries
                .get(&key)
                .map_or(false, |slot| slot.stamp == stamp);
            if live {
                self.entries.remove(&key);
            }
        }
    }

    fn compact(&mut self) {
        if self.access.len() > self.entries.len() * 2 + 16 {
            let entries = &self.entries;
            self.access
                .retain(|(stamp, key)| entries.get(key).map_or(false, |slot| slot.stamp == *stamp));
        }
    }
}

/// A bounded associative cache with least-recently-used eviction.
///
/// All operations are atomic with respect to one another and never fail;
/// after any operation the number of stored entries is at most the
/// configured size.
pub struct Lru<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Lru<K, V> {
    pub fn new(size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                size,
                entries: HashMap::with_capacity(size),
                access: VecDeque::new(),
                clock: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`. A hit returns the value and promotes the entry to
    /// most recently used.
    pub fn load(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        if !inner.entries.contains_key(key) {
            return None;
        }
        inner.touch(key);
        inner.entries.get(key).map(|slot| slot.value.clone())
    }

    /// Insert `value` unless `key` is already present, returning the value
    /// that ended up stored and whether the key was already present.
    ///
    /// Callers racing on the same key all receive the single winning value,
    /// which makes this the dedupe point for concurrent computations.
    pub fn load_or_put(&self, key: &K, value: V) -> (V, bool) {
        let mut inner = self.lock();
        if inner.entries.contains_key(key) {
            inner.touch(key);
            let stored = inner
                .entries
                .get(key)
                .map(|slot| slot.value.clone())
                .expect("entry checked above");
            (stored, true)
        } else {
            inner.insert(key.clone(), value.clone());
            (value, false)
        }
    }

    /// Insert or overwrite `key`, promoting it to most recently used.
    pub fn put(&self, key: &K, value: V) {
        let mut inner = self.lock();
        if let Some(slot) = inner.entries.get_mut(key) {
            slot.value = value;
            inner.touch(key);
        } else {
            inner.insert(key.clone(), value);
        }
    }

    /// Remove `key` if present.
    pub fn remove(&self, key: &K) {
        let mut inner = self.lock();
        inner.entries.remove(key);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}
