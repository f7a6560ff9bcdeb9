//! Conflict sets and the resolver that maintains them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use weave_store::{bucket_key, KvStore};
use weave_types::{AccountId, Symbol, Transaction};

use crate::{ConsensusError, Hll};

/// Bucket prefix for persisted conflict sets.
pub const BUCKET_CONFLICTS: &[u8] = b"conflict_";

type ConflictKey = (AccountId, u64);

/// State of one `(sender, nonce)` conflict set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConflictSet {
    /// Currently preferred transaction for this key.
    pub preferred: Symbol,
    /// Confidence in `preferred`: consecutive supporting observations since
    /// the preference last changed. Saturating.
    pub count: u64,
    /// Sketch of every member symbol observed for this key.
    pub transactions: Hll,
}

impl ConflictSet {
    fn started_by(symbol: &Symbol) -> Self {
        let mut transactions = Hll::new();
        transactions.insert(symbol.as_bytes());
        Self {
            preferred: symbol.clone(),
            count: 0,
            transactions,
        }
    }

    /// Whether conflicting alternatives have been observed for this key.
    pub fn is_conflicting(&self) -> bool {
        self.transactions.cardinality() != 1
    }
}

/// Tracks a conflict set per `(sender, nonce)` pair.
///
/// The in-memory map is authoritative; every update is mirrored to the
/// store under [`BUCKET_CONFLICTS`] after the map lock is released, and
/// reads fall back to the mirror, so sets survive a restart.
pub struct Resolver {
    store: Arc<dyn KvStore>,
    sets: Mutex<HashMap<ConflictKey, ConflictSet>>,
}

impl Resolver {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            sets: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ConflictKey, ConflictSet>>, ConsensusError> {
        self.sets.lock().map_err(|_| ConsensusError::Poisoned)
    }

    fn mirror_key(key: &ConflictKey) -> Vec<u8> {
        let (sender, nonce) = key;
        let mut suffix = Vec::with_capacity(32 + 8);
        suffix.extend_from_slice(sender.as_bytes());
        suffix.extend_from_slice(&nonce.to_be_bytes());
        bucket_key(BUCKET_CONFLICTS, &suffix)
    }

    fn load_mirror(&self, key: &ConflictKey) -> Result<Option<ConflictSet>, ConsensusError> {
        match self.store.get(&Self::mirror_key(key))? {
            Some(bytes) => {
                let set = bincode::deserialize(&bytes)
                    .map_err(|e| ConsensusError::Decode(e.to_string()))?;
                Ok(Some(set))
            }
            None => Ok(None),
        }
    }

    /// Fold one observed transaction into its conflict set and return the
    /// updated set.
    ///
    /// First observation of a key starts the set with the transaction as
    /// preferred at confidence zero. A repeat of the current preferred
    /// accumulates confidence; a new member that ranks higher by the
    /// deterministic tie-break (lexicographically lower symbol) takes the
    /// preference over and resets confidence; any other member only joins
    /// the sketch.
    pub fn observe(&self, tx: &Transaction) -> Result<ConflictSet, ConsensusError> {
        let key = (tx.sender, tx.nonce);

        // Prime from the mirror before taking the update lock, so no lock
        // spans a store read.
        let primed = {
            let known = self.lock()?.contains_key(&key);
            if known {
                None
            } else {
                self.load_mirror(&key)?
            }
        };

        let updated = {
            let mut sets = self.lock()?;
            let set = match sets.entry(key) {
                Entry::Occupied(entry) => {
                    let set = entry.into_mut();
                    Self::apply(set, &tx.symbol);
                    set
                }
                Entry::Vacant(entry) => match primed {
                    Some(mut set) => {
                        Self::apply(&mut set, &tx.symbol);
                        entry.insert(set)
                    }
                    None => entry.insert(ConflictSet::started_by(&tx.symbol)),
                },
            };
            set.clone()
        };

        let bytes = bincode::serialize(&updated)
            .map_err(|e| ConsensusError::Decode(e.to_string()))?;
        self.store.put(&Self::mirror_key(&key), &bytes)?;

        Ok(updated)
    }

    fn apply(set: &mut ConflictSet, symbol: &Symbol) {
        set.transactions.insert(symbol.as_bytes());

        if *symbol == set.preferred {
            set.count = set.count.saturating_add(1);
        } else if *symbol < set.preferred {
            set.preferred = symbol.clone();
            set.count = 0;
        }
    }

    /// The conflict set for `(sender, nonce)`.
    pub fn get(&self, sender: &AccountId, nonce: u64) -> Result<ConflictSet, ConsensusError> {
        let key = (*sender, nonce);

        if let Some(set) = self.lock()?.get(&key).cloned() {
            return Ok(set);
        }

        match self.load_mirror(&key)? {
            Some(set) => {
                // Prime memory so later observes continue from this state.
                let mut sets = self.lock()?;
                Ok(sets.entry(key).or_insert(set).clone())
            }
            None => Err(ConsensusError::NotFound {
                sender: sender.to_string(),
                nonce,
            }),
        }
    }
}
