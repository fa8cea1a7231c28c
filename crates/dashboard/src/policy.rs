use shopdash_core::config::DashboardConfig;
use std::time::Duration;

/// Keys, TTL and retry ladder for the dashboard summary. Process-wide and
/// fixed after startup.
#[derive(Debug, Clone)]
pub struct DashboardPolicy {
    pub cache_key: String,
    pub ttl: Duration,
    pub lock_resource: String,
    pub lock_lease: Duration,
    pub poll_attempts: u32,
    pub poll_base_delay: Duration,
    pub invalidation_channel: String,
}

impl DashboardPolicy {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            cache_key: config.cache_key.clone(),
            ttl: Duration::from_secs(config.ttl_secs),
            lock_resource: config.lock_resource.clone(),
            lock_lease: Duration::from_millis(config.lock_lease_ms),
            poll_attempts: config.poll_attempts,
            poll_base_delay: Duration::from_millis(config.poll_base_delay_ms),
            invalidation_channel: config.invalidation_channel.clone(),
        }
    }

    /// Delay before poll `attempt` (1-based): grows linearly.
    pub fn poll_delay(&self, attempt: u32) -> Duration {
        self.poll_base_delay * attempt
    }

    /// Longest a caller sleeps in the poll ladder before computing directly.
    pub fn max_poll_wait(&self) -> Duration {
        (1..=self.poll_attempts).map(|attempt| self.poll_delay(attempt)).sum()
    }
}

impl Default for DashboardPolicy {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}
