use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("no conflict set for sender {sender} nonce {nonce}")]
    NotFound { sender: String, nonce: u64 },

    #[error("storage error: {0}")]
    Store(#[from] weave_store::StoreError),

    #[error("conflict set decode error: {0}")]
    Decode(String),

    #[error("resolver lock poisoned")]
    Poisoned,
}
