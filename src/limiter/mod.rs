//! Per-client token-bucket rate limiting.
//!
//! Every client identity gets its own [`TokenBucket`] refilling at
//! `rps` tokens per second up to `burst`. Buckets live in a sharded
//! [`ClientRegistry`]; a background task started with
//! [`RateLimiter::spawn_sweeper`] evicts clients that have gone quiet so the
//! map does not grow with every address ever seen.
//!
//! State is process-local. Several instances behind a load balancer each
//! enforce their own budget.

mod bucket;
mod registry;

use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::LimiterConfig;

pub use bucket::TokenBucket;
pub use registry::{Client, ClientRegistry};

/// Shared handle to a limiter. Clones share the same registry.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    config: LimiterConfig,
    registry: ClientRegistry,
}

impl RateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        tracing::info!(
            rps = config.rps,
            burst = config.burst,
            enabled = config.enabled,
            "creating token bucket rate limiter"
        );
        let registry = ClientRegistry::new(config.rps, config.burst);
        Self { inner: Arc::new(Inner { config, registry }) }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.inner.config
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.inner.registry
    }

    /// Spends one token for `identity`. Returns `false` when the client is
    /// over its budget. Always `true` when the limiter is disabled.
    pub fn check(&self, identity: &str) -> bool {
        self.check_at(identity, Instant::now())
    }

    pub fn check_at(&self, identity: &str, now: Instant) -> bool {
        if !self.is_enabled() {
            return true;
        }
        self.inner.registry.consume(identity, now)
    }

    /// Evicts clients idle longer than the configured timeout.
    pub fn sweep(&self) -> usize {
        self.inner
            .registry
            .sweep(Instant::now(), self.inner.config.idle_timeout())
    }

    /// Spawns a tokio task that calls [`sweep`](Self::sweep) every
    /// `sweep_interval`.
    ///
    /// The task only holds a weak reference and exits once every
    /// `RateLimiter` clone has been dropped. A disabled limiter never fills
    /// its registry, and a zero interval cannot be ticked, so in either case
    /// the task exits at once. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval();

        if !self.is_enabled() {
            tracing::debug!("rate limiter disabled, not sweeping");
            return tokio::spawn(async {});
        }
        if period.is_zero() {
            tracing::warn!("sweep interval is zero, idle clients will not be evicted");
            return tokio::spawn(async {});
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    tracing::debug!("rate limiter dropped, sweeper exiting");
                    break;
                };
                let now = tokio::time::Instant::now().into_std();
                inner.registry.sweep(now, inner.config.idle_timeout());
            }
        })
    }
}
