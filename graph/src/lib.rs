//! The transaction DAG.
//!
//! Transactions are keyed by symbol and ordered by arrival index. Each
//! transaction references one or more parents (except the index-0 genesis);
//! the graph maintains the inverse child adjacency that acceptance and
//! revert propagation walk.
//!
//! Receive hooks registered via [`Graph::add_on_receive_handler`] run
//! synchronously before an inserted transaction is committed; a hook error
//! aborts the ingress.

pub mod error;
pub mod graph;

pub use error::GraphError;
pub use graph::{Graph, ReceiveHandler};
