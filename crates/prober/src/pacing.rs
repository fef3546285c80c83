use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use crate::{ProbeError, RateLimitConfig, Result};

/// How long to wait after a chunk before dispatching the next one.
pub trait PacingPolicy: Send + Sync {
    fn delay_after(&self, chunk_index: usize) -> Duration;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl PacingPolicy for NoDelay {
    fn delay_after(&self, _chunk_index: usize) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl PacingPolicy for FixedDelay {
    fn delay_after(&self, _chunk_index: usize) -> Duration {
        self.0
    }
}

impl<F> PacingPolicy for F
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn delay_after(&self, chunk_index: usize) -> Duration {
        self(chunk_index)
    }
}

/// Token bucket shared by every outbound request of a fetcher.
pub struct RequestLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl RequestLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        let quota = Self::create_quota(config)?;
        Ok(Self {
            limiter: GovernorRateLimiter::direct(quota),
        })
    }

    pub async fn until_ready(&self) {
        debug!("Waiting for request slot");
        self.limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;
    }

    fn create_quota(config: &RateLimitConfig) -> Result<Quota> {
        if !(config.requests_per_second.is_finite() && config.requests_per_second > 0.0) {
            return Err(ProbeError::InvalidConfig(format!(
                "requests_per_second must be positive, got {}",
                config.requests_per_second
            )));
        }
        let burst = NonZeroU32::new(config.burst_size)
            .ok_or_else(|| ProbeError::InvalidConfig("burst_size must be at least 1".to_string()))?;
        let period = Duration::from_secs_f64(1.0 / config.requests_per_second);

        Quota::with_period(period)
            .map(|quota| quota.allow_burst(burst))
            .ok_or_else(|| ProbeError::InvalidConfig(format!("invalid request period {period:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_policies() {
        assert_eq!(NoDelay.delay_after(3), Duration::ZERO);
        assert_eq!(FixedDelay(Duration::from_millis(200)).delay_after(0), Duration::from_millis(200));

        let backoff = |chunk: usize| Duration::from_millis(100 * (chunk as u64 + 1));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_request_limiter() {
        let limiter = RequestLimiter::new(&RateLimitConfig {
            requests_per_second: 2.0,
            burst_size: 1,
        })
        .unwrap();

        let start = Instant::now();
        limiter.until_ready().await;
        assert!(start.elapsed() < Duration::from_millis(100));

        let start = Instant::now();
        limiter.until_ready().await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_invalid_quota() {
        let zero_burst = RateLimitConfig {
            requests_per_second: 1.0,
            burst_size: 0,
        };
        assert!(RequestLimiter::new(&zero_burst).is_err());
    }
}
