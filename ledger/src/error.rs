use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Store(#[from] weave_store::StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] weave_graph::GraphError),

    #[error("consensus error: {0}")]
    Consensus(#[from] weave_consensus::ConsensusError),
}
