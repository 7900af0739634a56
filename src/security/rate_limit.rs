//! Rate limiting for sensitive bridge actions.
//!
//! Uses the `governor` crate's token bucket algorithm with configurable
//! rates and bursts, keyed per web identity. Enqueueing commands and
//! issuing/redeeming link codes go through this; status polls do not.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Thread-safe rate limit manager for sensitive actions.
#[derive(Debug)]
pub struct RateLimitManager {
    /// Per-identity limiters for sensitive actions.
    limiters: DashMap<String, DirectRateLimiter>,
    config: Arc<RateLimitConfig>,
}

impl RateLimitManager {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiters: DashMap::new(),
            config: Arc::new(config),
        }
    }

    /// Check whether an identity may perform another sensitive action.
    ///
    /// Returns `true` if allowed, `false` if rate limited.
    pub fn check_sensitive(&self, identity_id: &str) -> bool {
        let limiter = self
            .limiters
            .entry(identity_id.to_string())
            .or_insert_with(|| {
                let rate = NonZeroU32::new(self.config.sensitive_per_minute)
                    .unwrap_or(nonzero!(30u32));
                let burst =
                    NonZeroU32::new(self.config.sensitive_burst).unwrap_or(nonzero!(10u32));
                GovRateLimiter::direct(Quota::per_minute(rate).allow_burst(burst))
            });

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(identity = %identity_id, "sensitive action rate limit exceeded");
            crate::metrics::record_rate_limited();
        }
        allowed
    }

    /// Cleanup old entries to prevent memory growth.
    ///
    /// Call periodically from a maintenance task.
    pub fn cleanup(&self) {
        const MAX_ENTRIES: usize = 10_000;

        if self.limiters.len() > MAX_ENTRIES {
            self.limiters.clear();
            debug!("cleared sensitive-action rate limiters (exceeded {} entries)", MAX_ENTRIES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_limited() {
        let manager = RateLimitManager::new(RateLimitConfig {
            sensitive_per_minute: 1,
            sensitive_burst: 3,
        });

        assert!(manager.check_sensitive("web-abc"));
        assert!(manager.check_sensitive("web-abc"));
        assert!(manager.check_sensitive("web-abc"));
        // Burst exhausted.
        assert!(!manager.check_sensitive("web-abc"));
    }

    #[test]
    fn test_identities_are_independent() {
        let manager = RateLimitManager::new(RateLimitConfig {
            sensitive_per_minute: 1,
            sensitive_burst: 1,
        });

        assert!(manager.check_sensitive("web-a"));
        assert!(!manager.check_sensitive("web-a"));
        assert!(manager.check_sensitive("web-b"));
    }
}
