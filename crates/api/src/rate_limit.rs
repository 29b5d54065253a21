//! Rate Limiting Middleware using GCRA Algorithm
//!
//! Per-IP limits through tower_governor. The Generic Cell Rate Algorithm
//! needs no background refill task, only periodic pruning of stale keys.

use governor::middleware::StateInformationMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tracing::{debug, warn};

/// Governor config with `X-RateLimit-*` headers enabled
pub type DefaultGovernorConfig =
    tower_governor::governor::GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>;

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Seconds between quota replenishments
    pub per_second: u64,
    /// Burst size (max requests that can be made immediately)
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: 1,
            burst_size: 20,
        }
    }
}

/// Build the governor config
///
/// Returns None when the quota is zero. The router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()` for IP extraction.
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<DefaultGovernorConfig>> {
    let built = GovernorConfigBuilder::default()
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish();

    if built.is_none() {
        warn!(
            "Rate limit disabled: invalid quota ({} s, burst {})",
            config.per_second, config.burst_size
        );
    }
    built.map(Arc::new)
}

/// Periodically drop limiter state for idle clients
pub fn spawn_limiter_cleanup(config: &Arc<DefaultGovernorConfig>, every: Duration) {
    let limiter = config.limiter().clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            debug!("Rate limiting storage size: {}", limiter.len());
            limiter.retain_recent();
        }
    });
}
