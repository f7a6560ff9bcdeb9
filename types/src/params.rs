//! Tunable consensus parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default descendant threshold for the fast acceptance path.
pub const DEFAULT_BETA1: u64 = 10;
/// Default confidence threshold for the strong acceptance path.
pub const DEFAULT_BETA2: u64 = 150;
/// Default acceptance tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(100);
/// Default bound on compiled-VM cache entries.
pub const DEFAULT_VM_CACHE_SIZE: usize = 64;
/// Default bound on collapsed-state cache entries.
pub const DEFAULT_STATE_CACHE_SIZE: usize = 16;

/// Parameters governing acceptance behavior.
///
/// `beta1` trades finality latency for safety on the no-conflict fast path;
/// `beta2` sets how many repeated preference confirmations overrule a
/// late-arriving conflict.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusParams {
    /// Descendant-count threshold for the fast accept path.
    pub beta1: u64,
    /// Confidence-count threshold for the strong accept path.
    pub beta2: u64,
    /// Interval between acceptance ticks.
    pub tick_period: Duration,
    /// Maximum entries in the compiled-VM cache.
    pub vm_cache_size: usize,
    /// Maximum entries in the collapsed-state cache.
    pub state_cache_size: usize,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            beta1: DEFAULT_BETA1,
            beta2: DEFAULT_BETA2,
            tick_period: DEFAULT_TICK_PERIOD,
            vm_cache_size: DEFAULT_VM_CACHE_SIZE,
            state_cache_size: DEFAULT_STATE_CACHE_SIZE,
        }
    }
}
