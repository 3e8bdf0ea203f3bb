use serde::{Deserialize, Serialize};

fn d_ttl_secs() -> u64 {
    900
}

fn d_max_cleanup_interval_secs() -> u64 {
    60
}

fn d_shard_count() -> usize {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "d_ttl_secs")]
    pub ttl_secs: u64,
    /// Upper bound on how long an expired session can linger before the
    /// sweep task reclaims it; the sweep never runs more often than this.
    #[serde(default = "d_max_cleanup_interval_secs")]
    pub max_cleanup_interval_secs: u64,
    #[serde(default = "d_shard_count")]
    pub shard_count: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_ttl_secs(),
            max_cleanup_interval_secs: d_max_cleanup_interval_secs(),
            shard_count: d_shard_count(),
        }
    }
}
