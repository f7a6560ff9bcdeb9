//! The ledger façade.
//!
//! Owns the acceptance engine, both execution caches and the kill channel
//! for the tick worker. Construction registers the safety hook on the
//! graph, so every transaction the graph receives is checked against its
//! conflict set before it commits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use weave_consensus::{ConflictSet, ConsensusError, Resolver};
use weave_graph::{Graph, GraphError};
use weave_store::KvStore;
use weave_types::{AccountId, ConsensusParams, Symbol};

use crate::acceptance::AcceptanceEngine;
use crate::cache::{Lru, StateCache, VmCache};
use crate::LedgerError;

/// Composes the store, graph, resolver, acceptance engine and caches.
pub struct Ledger {
    graph: Arc<Graph>,
    resolver: Arc<Resolver>,
    engine: Arc<AcceptanceEngine>,
    vm_cache: Arc<VmCache>,
    state_cache: Arc<StateCache>,
    tick_period: Duration,
    kill: broadcast::Sender<()>,
}

impl Ledger {
    /// Wire a ledger over its collaborators and register the safety hook
    /// as the graph's receive handler.
    pub fn new(
        store: Arc<dyn KvStore>,
        graph: Arc<Graph>,
        resolver: Arc<Resolver>,
        params: &ConsensusParams,
    ) -> Arc<Self> {
        let engine = Arc::new(AcceptanceEngine::new(
            store,
            Arc::clone(&graph),
            Arc::clone(&resolver),
            params.beta1,
            params.beta2,
        ));

        let hook = Arc::clone(&engine);
        graph.add_on_receive_handler(Box::new(move |index, tx| {
            hook.ensure_safe_committable(index, tx)
                .map_err(|e| GraphError::HookRejected(e.to_string()))
        }));

        let (kill, _) = broadcast::channel(1);

        Arc::new(Self {
            graph,
            resolver,
            engine,
            vm_cache: Arc::new(Lru::new(params.vm_cache_size)),
            state_cache: Arc::new(Lru::new(params.state_cache_size)),
            tick_period: params.tick_period,
            kill,
        })
    }

    /// Spawn the acceptance tick worker. The task runs until
    /// [`Ledger::shutdown`] fires the kill channel.
    pub fn spawn_acceptance_loop(self: Arc<Self>) -> JoinHandle<()> {
        let mut kill_rx = self.kill.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_period);
            loop {
                tokio::select! {
                    biased;
                    _ = kill_rx.recv() => {
                        tracing::info!("acceptance loop shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.engine.tick();
                    }
                }
            }
        })
    }

    /// Stop the acceptance worker. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.kill.send(());
    }

    /// Run one acceptance pass synchronously. Returns the newly accepted
    /// symbols; deterministic tests drive the engine through this instead
    /// of the timer.
    pub fn tick(&self) -> Vec<Symbol> {
        self.engine.tick()
    }

    /// Whether `symbol` has been accepted.
    pub fn was_accepted(&self, symbol: &Symbol) -> bool {
        self.engine.was_accepted(symbol)
    }

    /// Un-accept `symbol` and its descendant closure.
    pub fn revert(&self, symbol: &Symbol) -> Result<(), LedgerError> {
        self.engine.revert(symbol)
    }

    /// Conflict set for `(sender, nonce)`.
    pub fn get_conflict_set(
        &self,
        sender: &AccountId,
        nonce: u64,
    ) -> Result<ConflictSet, ConsensusError> {
        self.resolver.get(sender, nonce)
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn vm_cache(&self) -> &Arc<VmCache> {
        &self.vm_cache
    }

    pub fn state_cache(&self) -> &Arc<StateCache> {
        &self.state_cache
    }
}
