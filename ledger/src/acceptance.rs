//! The acceptance state machine.
//!
//! Every known transaction is pending, accepted, or unknown; the engine
//! externalizes that state into two store buckets. Membership carries the
//! verdict: an accepted symbol holds a true byte under [`BUCKET_ACCEPTED`],
//! a pending symbol holds a marker under [`BUCKET_ACCEPT_PENDING`], and an
//! absent symbol is unknown. Readers parse absence as "not accepted".
//!
//! On every tick the engine walks the pending frontier: a symbol is
//! promoted once all its parents are accepted and either its conflict set
//! carries strong confidence, or no conflict has been observed and enough
//! descendants have built on top of it. A late conflict against an already
//! accepted transaction reverts it — and everything downstream — back to
//! pending.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use weave_consensus::{ConsensusError, Resolver};
use weave_graph::Graph;
use weave_store::{bucket_key, KvStore};
use weave_types::{Symbol, Transaction};

use crate::LedgerError;

/// Bucket prefix for finalized transactions.
pub const BUCKET_ACCEPTED: &[u8] = b"accepted_";
/// Bucket prefix for transactions awaiting an acceptance decision.
pub const BUCKET_ACCEPT_PENDING: &[u8] = b"p.accepted_";

const ACCEPTED_TRUE: &[u8] = &[1];
const PENDING_MARKER: &[u8] = &[0];

/// Walks the DAG from the root and decides which transactions are accepted.
pub struct AcceptanceEngine {
    store: Arc<dyn KvStore>,
    graph: Arc<Graph>,
    resolver: Arc<Resolver>,
    beta1: u64,
    beta2: u64,
}

impl AcceptanceEngine {
    pub fn new(
        store: Arc<dyn KvStore>,
        graph: Arc<Graph>,
        resolver: Arc<Resolver>,
        beta1: u64,
        beta2: u64,
    ) -> Self {
        Self {
            store,
            graph,
            resolver,
            beta1,
            beta2,
        }
    }

    fn accepted_key(symbol: &Symbol) -> Vec<u8> {
        bucket_key(BUCKET_ACCEPTED, symbol.as_bytes())
    }

    fn pending_key(symbol: &Symbol) -> Vec<u8> {
        bucket_key(BUCKET_ACCEPT_PENDING, symbol.as_bytes())
    }

    /// Whether `symbol` is currently accepted. Absence reads as false, so
    /// the query always succeeds; acceptance is eventually consistent.
    pub fn was_accepted(&self, symbol: &Symbol) -> bool {
        match self.store.get(&Self::accepted_key(symbol)) {
            Ok(Some(bytes)) => bytes.first() == Some(&1),
            Ok(None) | Err(_) => false,
        }
    }

    /// One acceptance pass. Returns the symbols newly accepted this tick.
    pub fn tick(&self) -> Vec<Symbol> {
        match self.bootstrap() {
            Ok(true) => return Vec::new(),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "acceptance bootstrap failed");
                return Vec::new();
            }
        }

        let mut accepted = Vec::new();
        let scan = self.store.for_each_key(BUCKET_ACCEPT_PENDING, &mut |key| {
            let Ok(raw) = std::str::from_utf8(key) else {
                return Ok(());
            };
            let symbol = Symbol::new(raw);
            match self.evaluate(&symbol) {
                Ok(true) => accepted.push(symbol),
                Ok(false) => {}
                Err(LedgerError::Store(e))
                | Err(LedgerError::Consensus(ConsensusError::Store(e))) => {
                    tracing::warn!(symbol = %symbol, error = %e, "pending evaluation hit the store");
                }
                // Missing transactions, conflict sets or decode failures
                // retry on the next tick.
                Err(_) => {}
            }
            Ok(())
        });
        if let Err(e) = scan {
            tracing::warn!(error = %e, "pending scan aborted");
        }

        if !accepted.is_empty() {
            let shorts: Vec<&str> = accepted.iter().map(|s| s.short()).collect();
            tracing::info!(count = accepted.len(), accepted = ?shorts, "accepted transactions");
        }
        accepted
    }

    /// Seed the pending bucket with the genesis when both buckets are
    /// empty. Returns true when a seed was inserted; the scan then starts
    /// on the following tick.
    fn bootstrap(&self) -> Result<bool, LedgerError> {
        if self.store.size(BUCKET_ACCEPT_PENDING)? != 0 || self.store.size(BUCKET_ACCEPTED)? != 0 {
            return Ok(false);
        }
        let Ok(genesis) = self.graph.get_by_index(0) else {
            // Nothing in the graph yet.
            return Ok(false);
        };
        self.store
            .put(&Self::pending_key(&genesis.symbol), PENDING_MARKER)?;
        Ok(true)
    }

    /// Decide one pending symbol. Returns true when it was accepted.
    fn evaluate(&self, symbol: &Symbol) -> Result<bool, LedgerError> {
        let tx = self.graph.get_by_symbol(symbol)?;
        let set = self.resolver.get(&tx.sender, tx.nonce)?;

        for parent in &tx.parents {
            if !self.was_accepted(parent) {
                return Ok(false);
            }
        }

        let strong = set.count > self.beta2;
        let fast = !set.is_conflicting()
            && self.graph.count_ascendants(symbol, self.beta1 + 1)? > self.beta1;

        if (strong || fast) && !self.was_accepted(symbol) {
            self.accept(symbol)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Finalize `symbol` and queue its not-yet-accepted descendants for an
    /// acceptance decision.
    pub fn accept(&self, symbol: &Symbol) -> Result<(), LedgerError> {
        self.store.put(&Self::accepted_key(symbol), ACCEPTED_TRUE)?;
        self.store.delete(&Self::pending_key(symbol))?;

        let mut visited: HashSet<Symbol> = HashSet::new();
        let mut queue: VecDeque<Symbol> = VecDeque::new();
        queue.push_back(symbol.clone());

        while let Some(popped) = queue.pop_front() {
            let Ok(children) = self.graph.get_children_by_symbol(&popped) else {
                continue;
            };
            for child in children {
                if visited.insert(child.clone()) {
                    if !self.was_accepted(&child) {
                        self.store.put(&Self::pending_key(&child), PENDING_MARKER)?;
                    }
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }

    /// Un-accept `symbol` and the transitive closure of its descendants,
    /// returning them all to pending.
    pub fn revert(&self, symbol: &Symbol) -> Result<(), LedgerError> {
        let mut reverted = 0u64;
        let mut visited: HashSet<Symbol> = HashSet::new();
        let mut queue: VecDeque<Symbol> = VecDeque::new();
        queue.push_back(symbol.clone());

        while let Some(popped) = queue.pop_front() {
            self.store.delete(&Self::accepted_key(&popped))?;
            self.store.put(&Self::pending_key(&popped), PENDING_MARKER)?;
            reverted += 1;

            // A missing child lookup skips that branch.
            let Ok(children) = self.graph.get_children_by_symbol(&popped) else {
                continue;
            };
            for child in children {
                if visited.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }

        tracing::debug!(num_reverted = reverted, "reverted transactions");
        Ok(())
    }

    /// Receive hook: fold the incoming transaction into its conflict set
    /// and revert the set's preferred transaction if it was accepted while
    /// a conflict now exists and confidence is not strong enough to
    /// overrule it.
    ///
    /// Errors abort the ingress; the caller decides whether to drop the
    /// transaction.
    pub fn ensure_safe_committable(
        &self,
        _index: u64,
        tx: &Transaction,
    ) -> Result<(), LedgerError> {
        let set = self.resolver.observe(tx)?;
        if set.is_conflicting() && self.was_accepted(&set.preferred) && set.count <= self.beta2 {
            self.revert(&set.preferred)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_store::MemStore;
    use weave_types::{AccountId, Signature, Tag};

    struct Fixture {
        store: Arc<dyn KvStore>,
        graph: Arc<Graph>,
        engine: Arc<AcceptanceEngine>,
    }

    /// Wire a graph, resolver and engine over a fresh in-memory store, with
    /// the safety hook registered the way the façade registers it.
    fn fixture(beta1: u64, beta2: u64) -> Fixture {
        let store: Arc<dyn KvStore> = Arc::new(MemStore::new());
        let graph = Arc::new(Graph::new());
        let resolver = Arc::new(Resolver::new(Arc::clone(&store)));
        let engine = Arc::new(AcceptanceEngine::new(
            Arc::clone(&store),
            Arc::clone(&graph),
            Arc::clone(&resolver),
            beta1,
            beta2,
        ));

        let hook = Arc::clone(&engine);
        graph.add_on_receive_handler(Box::new(move |index, tx| {
            hook.ensure_safe_committable(index, tx)
                .map_err(|e| weave_graph::GraphError::HookRejected(e.to_string()))
        }));

        Fixture {
            store,
            graph,
            engine,
        }
    }

    fn tx(symbol: &str, sender: u8, nonce: u64, parents: &[&str]) -> Transaction {
        Transaction {
            symbol: Symbol::new(symbol),
            sender: AccountId::new([sender; 32]),
            nonce,
            parents: parents.iter().map(|p| Symbol::new(*p)).collect(),
            tag: Tag::Transfer,
            payload: Vec::new(),
            signature: Signature::ZERO,
        }
    }

    fn is_pending(store: &Arc<dyn KvStore>, symbol: &str) -> bool {
        store
            .get(&bucket_key(BUCKET_ACCEPT_PENDING, symbol.as_bytes()))
            .unwrap()
            .is_some()
    }

    #[test]
    fn bootstrap_seeds_genesis_then_accepts() {
        let f = fixture(0, 150);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("h", 1, 1, &["g"])).unwrap();

        // First tick only seeds the pending bucket.
        assert!(f.engine.tick().is_empty());
        assert!(is_pending(&f.store, "g"));
        assert!(!f.engine.was_accepted(&Symbol::new("g")));

        // Second tick: no conflict observed for g and it has a descendant,
        // so the fast path accepts it.
        let accepted = f.engine.tick();
        assert_eq!(accepted, vec![Symbol::new("g")]);
        assert!(f.engine.was_accepted(&Symbol::new("g")));
        assert!(!is_pending(&f.store, "g"));
    }

    #[test]
    fn empty_graph_ticks_are_noops() {
        let f = fixture(0, 150);
        assert!(f.engine.tick().is_empty());
        assert!(f.engine.tick().is_empty());
        assert_eq!(f.store.size(BUCKET_ACCEPT_PENDING).unwrap(), 0);
        assert_eq!(f.store.size(BUCKET_ACCEPTED).unwrap(), 0);
    }

    #[test]
    fn ancestor_gate_defers_children() {
        // Pending bucket iterates in key order, so name the child "a" and
        // its parent "z" to force the child to be evaluated first.
        let f = fixture(0, 150);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("z", 1, 1, &["g"])).unwrap();
        f.graph.insert(tx("a", 1, 2, &["z"])).unwrap();

        f.engine.tick(); // seed g
        assert_eq!(f.engine.tick(), vec![Symbol::new("g")]);

        // g's acceptance queued both descendants. "a" is evaluated first
        // but its parent z is not accepted yet, so only z lands.
        assert!(is_pending(&f.store, "a"));
        assert!(is_pending(&f.store, "z"));
        assert_eq!(f.engine.tick(), vec![Symbol::new("z")]);
        assert!(!f.engine.was_accepted(&Symbol::new("a")));

        // With z accepted the next tick admits a. It has no descendants,
        // so only the strong path could fire — give it the fast path by
        // letting a build accumulate.
        f.graph.insert(tx("b", 1, 3, &["a"])).unwrap();
        assert_eq!(f.engine.tick(), vec![Symbol::new("a")]);
        assert!(f.engine.was_accepted(&Symbol::new("a")));
    }

    #[test]
    fn buckets_stay_mutually_exclusive() {
        let f = fixture(0, 150);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("m", 1, 1, &["g"])).unwrap();
        f.graph.insert(tx("n", 1, 2, &["m"])).unwrap();

        for _ in 0..5 {
            f.engine.tick();
            for symbol in ["g", "m", "n"] {
                let accepted = f.engine.was_accepted(&Symbol::new(symbol));
                let pending = is_pending(&f.store, symbol);
                assert!(
                    !(accepted && pending),
                    "{symbol} is in both buckets after a tick"
                );
            }
        }
    }

    #[test]
    fn accepted_parents_precede_accepted_children() {
        let f = fixture(0, 150);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("p", 1, 1, &["g"])).unwrap();
        f.graph.insert(tx("q", 1, 2, &["g", "p"])).unwrap();
        f.graph.insert(tx("r", 1, 3, &["q"])).unwrap();

        for _ in 0..6 {
            f.engine.tick();
            // Ancestor closure: whenever a symbol is accepted, so is every
            // parent.
            for (child, parents) in [("p", vec!["g"]), ("q", vec!["g", "p"]), ("r", vec!["q"])] {
                if f.engine.was_accepted(&Symbol::new(child)) {
                    for parent in parents {
                        assert!(
                            f.engine.was_accepted(&Symbol::new(parent)),
                            "{child} accepted before its parent {parent}"
                        );
                    }
                }
            }
        }
        assert!(f.engine.was_accepted(&Symbol::new("q")));
    }

    #[test]
    fn safety_hook_reverts_contested_acceptance() {
        let f = fixture(0, 10);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        // x arrives three times in gossip: confidence reaches 2.
        let x = tx("x", 2, 7, &["g"]);
        f.graph.insert(x.clone()).unwrap();
        f.engine.ensure_safe_committable(1, &x).unwrap();
        f.engine.ensure_safe_committable(1, &x).unwrap();
        // w builds on x.
        f.graph.insert(tx("w", 1, 1, &["x"])).unwrap();

        f.engine.tick(); // seed
        f.engine.tick(); // accept g
        f.engine.tick(); // accept x
        f.engine.tick(); // w: no descendants yet, stays pending
        assert!(f.engine.was_accepted(&Symbol::new("x")));

        // A conflicting transaction for (sender 2, nonce 7) arrives. Its
        // symbol ranks lower... use a higher symbol so x stays preferred
        // and the revert targets x itself.
        f.graph.insert(tx("y", 2, 7, &["g"])).unwrap();

        assert!(!f.engine.was_accepted(&Symbol::new("x")));
        assert!(is_pending(&f.store, "x"));
        // Descendants of x went back to pending with it.
        assert!(is_pending(&f.store, "w"));
        assert!(!f.engine.was_accepted(&Symbol::new("w")));
    }

    #[test]
    fn contested_preference_blocks_fast_acceptance() {
        let f = fixture(0, 10);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("x", 2, 7, &["g"])).unwrap();
        f.graph.insert(tx("y", 2, 7, &["g"])).unwrap();
        f.graph.insert(tx("child", 1, 1, &["x"])).unwrap();

        f.engine.tick(); // seed
        f.engine.tick(); // accept g; x and y become pending

        // x has a descendant but is contested with weak confidence: the
        // fast path must not fire and count (0) is not above beta2.
        for _ in 0..4 {
            f.engine.tick();
        }
        assert!(!f.engine.was_accepted(&Symbol::new("x")));
        assert!(!f.engine.was_accepted(&Symbol::new("y")));
    }

    #[test]
    fn strong_confidence_accepts_despite_conflict() {
        let f = fixture(0, 2);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        let x = tx("x", 2, 7, &["g"]);
        f.graph.insert(x.clone()).unwrap();
        f.graph.insert(tx("y", 2, 7, &["g"])).unwrap();

        // Repeated support for x pushes its confidence past beta2 even
        // though the set is conflicting.
        f.engine.ensure_safe_committable(1, &x).unwrap();
        f.engine.ensure_safe_committable(1, &x).unwrap();
        f.engine.ensure_safe_committable(1, &x).unwrap();

        f.engine.tick(); // seed
        f.engine.tick(); // accept g
        let accepted = f.engine.tick();
        assert!(accepted.contains(&Symbol::new("x")));
        assert!(f.engine.was_accepted(&Symbol::new("x")));
    }

    #[test]
    fn revert_walks_the_descendant_closure() {
        let f = fixture(0, 150);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("a", 1, 1, &["g"])).unwrap();
        f.graph.insert(tx("b", 1, 2, &["a"])).unwrap();
        f.graph.insert(tx("c", 1, 3, &["b"])).unwrap();

        for _ in 0..6 {
            f.engine.tick();
        }
        assert!(f.engine.was_accepted(&Symbol::new("a")));
        assert!(f.engine.was_accepted(&Symbol::new("b")));

        f.engine.revert(&Symbol::new("a")).unwrap();
        for symbol in ["a", "b", "c"] {
            assert!(!f.engine.was_accepted(&Symbol::new(symbol)));
            assert!(is_pending(&f.store, symbol), "{symbol} should be pending");
        }
        // The reverted subtree's root parent is untouched.
        assert!(f.engine.was_accepted(&Symbol::new("g")));
    }

    #[test]
    fn revert_then_reaccept() {
        let f = fixture(0, 150);
        f.graph.insert(tx("g", 1, 0, &[])).unwrap();
        f.graph.insert(tx("a", 1, 1, &["g"])).unwrap();
        f.graph.insert(tx("b", 1, 2, &["a"])).unwrap();

        for _ in 0..5 {
            f.engine.tick();
        }
        assert!(f.engine.was_accepted(&Symbol::new("a")));

        f.engine.revert(&Symbol::new("a")).unwrap();
        assert!(!f.engine.was_accepted(&Symbol::new("a")));
        assert!(is_pending(&f.store, "a"));

        // Nothing else changed, so the scan re-promotes a on its next pass
        // (b stays pending: nothing has built on it yet).
        for _ in 0..4 {
            f.engine.tick();
        }
        assert!(f.engine.was_accepted(&Symbol::new("a")));
        assert!(is_pending(&f.store, "b"));
    }
}
