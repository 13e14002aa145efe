use std::time::Duration;

/// Backoff policy for transient failures (5xx, connection resets, timeouts).
///
/// Rate-limit waits are not governed by this policy; they are never counted
/// as attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let base = self.base_delay.as_secs_f64() * exp;
        let capped = base.min(self.max_delay.as_secs_f64());
        let delay = if self.jitter {
            // up to 25% either way
            capped * (0.75 + fastrand::f64() * 0.5)
        } else {
            capped
        };
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// How long to wait out a rate limit.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Used when the response carries no reset metadata.
    pub default_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_wait: Duration::from_secs(60),
            max_wait: Duration::from_secs(3600),
        }
    }
}

impl RateLimitPolicy {
    pub fn clamp(&self, wait: Option<Duration>) -> Duration {
        wait.unwrap_or(self.default_wait).min(self.max_wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn delays_grow_exponentially() {
        let cfg = no_jitter();
        assert_eq!(cfg.delay_for(1), Duration::from_millis(500));
        assert_eq!(cfg.delay_for(2), Duration::from_secs(1));
        assert_eq!(cfg.delay_for(3), Duration::from_secs(2));
    }

    #[test]
    fn delays_are_capped() {
        let cfg = no_jitter();
        assert_eq!(cfg.delay_for(20), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_in_band() {
        let cfg = RetryConfig::default();
        for _ in 0..100 {
            let d = cfg.delay_for(2);
            assert!(d >= Duration::from_millis(750) && d <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        assert_eq!(RetryConfig::default().with_max_attempts(0).max_attempts, 1);
    }

    #[test]
    fn rate_limit_wait_is_clamped() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.clamp(None), Duration::from_secs(60));
        assert_eq!(policy.clamp(Some(Duration::from_secs(2))), Duration::from_secs(2));
        assert_eq!(policy.clamp(Some(Duration::from_secs(99_999))), Duration::from_secs(3600));
    }
}
