//! The node struct — wires the storage, graph, resolver and ledger.

use std::str::FromStr;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;

use weave_consensus::Resolver;
use weave_graph::Graph;
use weave_ledger::Ledger;
use weave_store::KvStore;
use weave_store_lmdb::LmdbStore;

use crate::config::NodeConfig;
use crate::logging::{init_logging, LogFormat};
use crate::NodeError;

/// A running Weave node: LMDB-backed store, transaction graph, conflict
/// resolver and the ledger that ties them together.
///
/// The ledger's kill channel is the single cancellation path; stopping the
/// node fires it and waits for the acceptance worker to exit.
pub struct Node {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    acceptance_task: Option<JoinHandle<()>>,
}

impl Node {
    /// Open the data directory and wire all subsystems. Does not start the
    /// acceptance worker; call [`Node::start`].
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let store: Arc<dyn KvStore> =
            Arc::new(LmdbStore::open(&config.data_dir, config.map_size)?);
        Self::with_store(config, store)
    }

    /// Wire all subsystems over a caller-provided store backend.
    pub fn with_store(config: NodeConfig, store: Arc<dyn KvStore>) -> Result<Self, NodeError> {
        let graph = Arc::new(Graph::new());
        let resolver = Arc::new(Resolver::new(Arc::clone(&store)));
        let ledger = Ledger::new(store, graph, resolver, &config.consensus_params());

        Ok(Self {
            config,
            ledger,
            acceptance_task: None,
        })
    }

    /// Initialise logging from this node's configuration.
    pub fn init_logging(&self) -> Result<(), NodeError> {
        let format = LogFormat::from_str(&self.config.log_format).map_err(NodeError::Config)?;
        init_logging(format, &self.config.log_level);
        Ok(())
    }

    /// Start the acceptance worker.
    pub fn start(&mut self) {
        if self.acceptance_task.is_none() {
            tracing::info!(
                beta1 = self.config.beta1,
                beta2 = self.config.beta2,
                tick_ms = self.config.tick_period_ms,
                "starting acceptance worker"
            );
            self.acceptance_task = Some(Arc::clone(&self.ledger).spawn_acceptance_loop());
        }
    }

    /// Stop the acceptance worker and wait for it to exit. Idempotent.
    pub async fn stop(&mut self) {
        self.ledger.shutdown();
        if let Some(task) = self.acceptance_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "acceptance worker did not exit cleanly");
            }
        }
    }

    /// Block until SIGINT or SIGTERM arrives, then stop.
    pub async fn run_until_signal(&mut self) {
        self.start();

        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    term.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.stop().await;
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}
