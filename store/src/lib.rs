//! Abstract storage for the Weave ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements the
//! [`KvStore`] trait. The rest of the workspace depends only on the trait.

pub mod bucket;
pub mod error;
pub mod kv;
pub mod mem;

pub use bucket::bucket_key;
pub use error::StoreError;
pub use kv::KvStore;
pub use mem::MemStore;
