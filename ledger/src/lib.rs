//! The Weave ledger core.
//!
//! Ties the transaction DAG, the conflict resolver and the store together:
//! the acceptance engine walks the pending frontier on a periodic tick and
//! promotes transactions to accepted (or reverts them when a late conflict
//! arrives), while two bounded LRU caches serve the execution hot path.
//!
//! ## Module overview
//!
//! - [`acceptance`] — the acceptance state machine over the two store
//!   buckets.
//! - [`cache`] — the generic LRU plus its VM and collapsed-state
//!   instantiations.
//! - [`ledger`] — the façade wiring everything, owning the tick loop.
//! - [`error`] — ledger error types.

pub mod acceptance;
pub mod cache;
pub mod error;
pub mod ledger;

pub use acceptance::{AcceptanceEngine, BUCKET_ACCEPTED, BUCKET_ACCEPT_PENDING};
pub use cache::{CollapseState, Lru, StateCache, VmCache, VmInstance};
pub use error::LedgerError;
pub use ledger::Ledger;
