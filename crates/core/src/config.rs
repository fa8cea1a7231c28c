use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SHOPDASH__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Largest accepted request body.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_rate_limit_enabled")]
    pub rate_limit_enabled: bool,
    /// Requests per minute allowed per client IP.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// When false the service runs on the in-process cache and lock backends.
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Cache-aside and stampede-protection knobs for the dashboard summary.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
    #[serde(default = "default_dashboard_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_lock_resource")]
    pub lock_resource: String,
    #[serde(default = "default_lock_lease_ms")]
    pub lock_lease_ms: u64,
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    #[serde(default = "default_poll_base_delay_ms")]
    pub poll_base_delay_ms: u64,
    #[serde(default = "default_invalidation_channel")]
    pub invalidation_channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    3000
}
fn default_body_limit_bytes() -> usize {
    100 * 1024
}
fn default_rate_limit_enabled() -> bool {
    true
}
fn default_rate_limit_per_minute() -> u32 {
    60
}
fn default_redis_enabled() -> bool {
    true
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_cache_key() -> String {
    "dashboard:summary:v1".to_string()
}
fn default_dashboard_ttl_secs() -> u64 {
    300
}
fn default_lock_resource() -> String {
    "locks:dashboard:summary".to_string()
}
fn default_lock_lease_ms() -> u64 {
    10_000
}
fn default_poll_attempts() -> u32 {
    8
}
fn default_poll_base_delay_ms() -> u64 {
    200
}
fn default_invalidation_channel() -> String {
    "cache:invalidate".to_string()
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            body_limit_bytes: default_body_limit_bytes(),
            rate_limit_enabled: default_rate_limit_enabled(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            cache_key: default_cache_key(),
            ttl_secs: default_dashboard_ttl_secs(),
            lock_resource: default_lock_resource(),
            lock_lease_ms: default_lock_lease_ms(),
            poll_attempts: default_poll_attempts(),
            poll_base_delay_ms: default_poll_base_delay_ms(),
            invalidation_channel: default_invalidation_channel(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            redis: RedisConfig::default(),
            dashboard: DashboardConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SHOPDASH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
