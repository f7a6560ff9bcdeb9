//! Fundamental types for the Weave DAG ledger.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: transaction symbols, account identifiers, the transaction
//! record itself, and the tunable consensus parameters.

pub mod account;
pub mod hash;
pub mod keys;
pub mod params;
pub mod symbol;
pub mod transaction;

pub use account::AccountId;
pub use hash::TxId;
pub use keys::Signature;
pub use params::ConsensusParams;
pub use symbol::Symbol;
pub use transaction::{Tag, Transaction};
