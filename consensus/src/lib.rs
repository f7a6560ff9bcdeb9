//! Conflict resolution — deciding between transactions that spend from the
//! same `(sender, nonce)` pair.
//!
//! Every observed transaction lands in the conflict set keyed by its
//! `(sender, nonce)`. The set tracks the currently preferred transaction,
//! a Snowball-style confidence counter for that preference, and a
//! HyperLogLog sketch of every member seen. Cardinality 1 means no conflict
//! has been observed; anything above means conflicting alternatives exist
//! and acceptance must clear the confidence threshold.
//!
//! ## Module overview
//!
//! - [`hll`] — the member sketch (exact at low cardinality).
//! - [`conflict`] — conflict sets and the [`Resolver`].
//! - [`error`] — consensus error types.

pub mod conflict;
pub mod error;
pub mod hll;

pub use conflict::{ConflictSet, Resolver, BUCKET_CONFLICTS};
pub use error::ConsensusError;
pub use hll::Hll;
