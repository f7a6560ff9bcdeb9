use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Store(#[from] weave_store::StoreError),

    #[error("failed to open LMDB environment: {0}")]
    Lmdb(#[from] weave_store_lmdb::LmdbError),

    #[error("ledger error: {0}")]
    Ledger(#[from] weave_ledger::LedgerError),
}
