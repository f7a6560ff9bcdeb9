//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use weave_types::{params, ConsensusParams};

use crate::NodeError;

/// Configuration for a Weave node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default, so
/// a partial file is enough.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for ledger storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Descendant threshold for the fast acceptance path.
    #[serde(default = "default_beta1")]
    pub beta1: u64,

    /// Confidence threshold for the strong acceptance path.
    #[serde(default = "default_beta2")]
    pub beta2: u64,

    /// Acceptance tick period in milliseconds.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Maximum entries in the compiled-VM cache.
    #[serde(default = "default_vm_cache_size")]
    pub vm_cache_size: usize,

    /// Maximum entries in the collapsed-state cache.
    #[serde(default = "default_state_cache_size")]
    pub state_cache_size: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("weave-data")
}

fn default_map_size() -> usize {
    weave_store_lmdb::DEFAULT_MAP_SIZE
}

fn default_beta1() -> u64 {
    params::DEFAULT_BETA1
}

fn default_beta2() -> u64 {
    params::DEFAULT_BETA2
}

fn default_tick_period_ms() -> u64 {
    params::DEFAULT_TICK_PERIOD.as_millis() as u64
}

fn default_vm_cache_size() -> usize {
    params::DEFAULT_VM_CACHE_SIZE
}

fn default_state_cache_size() -> usize {
    params::DEFAULT_STATE_CACHE_SIZE
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            beta1: default_beta1(),
            beta2: default_beta2(),
            tick_period_ms: default_tick_period_ms(),
            vm_cache_size: default_vm_cache_size(),
            state_cache_size: default_state_cache_size(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| NodeError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// The consensus parameters this configuration selects.
    pub fn consensus_params(&self) -> ConsensusParams {
        ConsensusParams {
            beta1: self.beta1,
            beta2: self.beta2,
            tick_period: Duration::from_millis(self.tick_period_ms),
            vm_cache_size: self.vm_cache_size,
            state_cache_size: self.state_cache_size,
        }
    }
}
