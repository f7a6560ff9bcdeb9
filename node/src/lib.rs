//! The Weave node — wires the LMDB store, graph, resolver and ledger into a
//! runnable unit with configuration, logging and graceful shutdown.

pub mod config;
pub mod error;
pub mod logging;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::Node;
