use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Spaces out plain page requests so each host sees at most one request
/// per configured interval
pub struct RateLimiter {
    host_limits: Arc<RwLock<HashMap<String, HostLimiter>>>,
    default_delay: Duration,
}

/// Per-host pacing state
struct HostLimiter {
    next_slot: Instant,
}

impl RateLimiter {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            host_limits: Arc::new(RwLock::new(HashMap::new())),
            default_delay,
        }
    }

    /// Wait until a request to `host` is allowed
    pub async fn wait_for_host(&self, host: &str) {
        let now = Instant::now();
        let required_delay = {
            let mut limits = self.host_limits.write().await;
            let limiter = limits
                .entry(host.to_string())
                .or_insert_with(|| HostLimiter { next_slot: now });

            let required_delay = limiter.next_slot.saturating_duration_since(now);
            limiter.next_slot = now + required_delay + self.default_delay;

            required_delay
        };

        if !required_delay.is_zero() {
            debug!("Rate limiting: waiting {}ms for host {}", required_delay.as_millis(), host);
            tokio::time::sleep(required_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait_for_host("www.tiktok.com").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_second_request_waits() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.wait_for_host("www.tiktok.com").await;
        limiter.wait_for_host("www.tiktok.com").await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_hosts_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait_for_host("a.example").await;
        limiter.wait_for_host("b.example").await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
