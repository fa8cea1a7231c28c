//! Subscriber side of cache invalidation.
//!
//! Other processes (secondary cache tiers, metrics) learn about invalidated
//! keys from the invalidation channel. The listener runs either against
//! Redis pub/sub or against a `LocalCache` broadcast receiver.

use crate::store::InvalidationMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Called with the invalidated key for every received message.
pub type InvalidationHandler = Arc<dyn Fn(&str) + Send + Sync>;

pub struct InvalidationListener {
    channel: String,
    handler: InvalidationHandler,
}

impl InvalidationListener {
    pub fn new(channel: impl Into<String>, handler: InvalidationHandler) -> Self {
        Self {
            channel: channel.into(),
            handler,
        }
    }

    /// A listener that only logs and counts.
    pub fn observing(channel: impl Into<String>) -> Self {
        Self::new(channel, Arc::new(|_: &str| {}))
    }

    fn dispatch(&self, key: &str) {
        debug!(channel = %self.channel, key = %key, "received cache invalidation");
        metrics::counter!("dashboard.invalidations.observed").increment(1);
        (self.handler)(key);
    }

    /// Subscribe over Redis pub/sub, reconnecting with capped exponential
    /// backoff when the connection drops.
    pub fn spawn_redis(self, redis_url: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                match self.run_redis(&redis_url).await {
                    Ok(()) => {
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "Invalidation listener error, reconnecting"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        })
    }

    async fn run_redis(&self, redis_url: &str) -> Result<(), String> {
        use futures_util::StreamExt;

        let client = redis::Client::open(redis_url)
            .map_err(|e| format!("failed to create Redis client: {e}"))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| format!("failed to get pub/sub connection: {e}"))?;
        pubsub
            .subscribe(self.channel.as_str())
            .await
            .map_err(|e| format!("failed to subscribe: {e}"))?;

        info!(channel = %self.channel, "Subscribed to invalidation channel");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            match msg.get_payload::<String>() {
                Ok(key) => self.dispatch(&key),
                Err(e) => warn!(error = %e, "failed to parse invalidation payload"),
            }
        }
        Err("pub/sub connection closed".to_string())
    }

    /// Consume messages from a local broadcast bus until it closes.
    pub fn spawn_local(self, mut rx: broadcast::Receiver<InvalidationMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) if msg.channel == self.channel => self.dispatch(&msg.payload),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Invalidation listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
