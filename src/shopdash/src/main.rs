//! Shopdash: product catalog with a cached, stampede-protected dashboard.
//!
//! Main entry point that wires the cache and lock backends, the catalog and
//! the dashboard aggregator, then starts the server.

use clap::Parser;
use shopdash_api::{ApiServer, AppState};
use shopdash_cache::{
    CacheStore, EventPublisher, InvalidationListener, LocalCache, LocalLockProvider, LockProvider,
    RedisBackend,
};
use shopdash_catalog::{seed, CatalogStore};
use shopdash_core::config::AppConfig;
use shopdash_dashboard::{DashboardAggregator, DashboardPolicy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "shopdash")]
#[command(about = "Product catalog with a cached dashboard summary")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "SHOPDASH__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "SHOPDASH__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Use the in-process cache and lock backends even if Redis is configured
    #[arg(long, default_value_t = false)]
    local_cache: bool,

    /// Load a small demo catalog at startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

/// Cache, publisher and lock handles the aggregator runs on.
struct Backends {
    cache: Arc<dyn CacheStore>,
    events: Arc<dyn EventPublisher>,
    locks: Arc<dyn LockProvider>,
}

/// Prefer Redis; fall back to the in-process backends when it is disabled,
/// forced off, or unreachable.
async fn build_backends(config: &AppConfig, force_local: bool) -> Backends {
    let channel = config.dashboard.invalidation_channel.clone();

    if config.redis.enabled && !force_local {
        match RedisBackend::connect(&config.redis).await {
            Ok(redis) => {
                InvalidationListener::observing(channel).spawn_redis(redis.url().to_string());
                let store = Arc::new(redis.cache_store());
                return Backends {
                    cache: store.clone(),
                    events: store,
                    locks: Arc::new(redis.lock_provider()),
                };
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, using in-process cache");
            }
        }
    }

    info!("Using in-process cache and lock backends");
    let local = Arc::new(LocalCache::default());
    InvalidationListener::observing(channel).spawn_local(local.subscribe());

    // Spawn cache maintenance task
    let cache_for_maintenance = local.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = cache_for_maintenance.evict_expired();
            if evicted > 0 {
                tracing::debug!(evicted = evicted, "Evicted expired cache entries");
            }
        }
    });

    Backends {
        cache: local.clone(),
        events: local,
        locks: Arc::new(LocalLockProvider::new()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopdash=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Shopdash starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        redis_enabled = config.redis.enabled && !cli.local_cache,
        "Configuration loaded"
    );

    let backends = build_backends(&config, cli.local_cache).await;

    let catalog = Arc::new(CatalogStore::new());
    if cli.seed_demo {
        seed::seed_demo(&catalog)?;
    }

    let policy = DashboardPolicy::from_config(&config.dashboard);
    info!(
        cache_key = %policy.cache_key,
        ttl_secs = policy.ttl.as_secs(),
        lock_resource = %policy.lock_resource,
        "Dashboard cache configured"
    );
    let dashboard = Arc::new(DashboardAggregator::new(
        backends.cache,
        backends.events,
        backends.locks,
        catalog.clone(),
        policy,
    ));

    let state = AppState {
        dashboard,
        catalog,
        node_id: config.node_id.clone(),
        start_time: Instant::now(),
    };
    let api_server = ApiServer::new(config, state);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Shopdash is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    info!("Shopdash stopped");
    Ok(())
}
