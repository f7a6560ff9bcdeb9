use thiserror::Error;

use weave_types::Symbol;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("transaction {0} not found")]
    NotFound(Symbol),

    #[error("no transaction at index {0}")]
    IndexOutOfRange(u64),

    #[error("transaction {0} already present")]
    Duplicate(Symbol),

    #[error("transaction {child} references unknown parent {parent}")]
    ParentNotFound { child: Symbol, parent: Symbol },

    #[error("non-genesis transaction {0} has no parents")]
    MissingParents(Symbol),

    #[error("receive hook rejected transaction: {0}")]
    HookRejected(String),

    #[error("graph lock poisoned")]
    Poisoned,
}
