use serde::{Deserialize, Serialize};

fn d_full_listing_schedule() -> String {
    "0 2 * * *".to_string()
}

fn d_incremental_poll_period_secs() -> u64 {
    300
}

fn d_feed_max_attempts() -> u32 {
    5
}

fn d_feed_initial_backoff_secs() -> u64 {
    1
}

fn d_feed_backoff_cap_secs() -> u64 {
    30
}

/// Push cadence and retry policy. Unrelated to the server's own listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptorConfig {
    /// 5-field UTC cron expression for the full DocId listing.
    #[serde(default = "d_full_listing_schedule")]
    pub full_listing_schedule: String,
    /// `None` disables incremental polling even if the adaptor supports it.
    #[serde(default = "d_incremental_poll_period_secs")]
    pub incremental_poll_period_secs: u64,
    #[serde(default = "d_feed_max_attempts")]
    pub feed_max_attempts: u32,
    #[serde(default = "d_feed_initial_backoff_secs")]
    pub feed_initial_backoff_secs: u64,
    #[serde(default = "d_feed_backoff_cap_secs")]
    pub feed_backoff_cap_secs: u64,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            full_listing_schedule: d_full_listing_schedule(),
            incremental_poll_period_secs: d_incremental_poll_period_secs(),
            feed_max_attempts: d_feed_max_attempts(),
            feed_initial_backoff_secs: d_feed_initial_backoff_secs(),
            feed_backoff_cap_secs: d_feed_backoff_cap_secs(),
        }
    }
}
