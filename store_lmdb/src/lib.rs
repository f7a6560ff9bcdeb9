//! LMDB storage backend for the Weave ledger.
//!
//! Implements the `KvStore` trait from `weave-store` using the `heed` LMDB
//! bindings. All buckets live in a single named database; bucket prefixes
//! keep their key ranges disjoint.

pub mod error;
pub mod store;

pub use error::LmdbError;
pub use store::{LmdbStore, DEFAULT_MAP_SIZE};
