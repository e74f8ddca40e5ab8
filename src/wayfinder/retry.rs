//! Backoff policies used by the resilient provider.
//!
//! Two separate ladders: [`RetryConfig`] for generic transient failures
//! (exponential backoff with additive jitter) and [`RateLimitConfig`] for
//! rate-limit exhaustion (fixed doubling schedule with a hard cap). The two
//! budgets never mix: a rate-limit error does not consume a generic retry.

use std::time::Duration;

/// Exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay on each subsequent retry.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Additive jitter as a fraction of the computed delay (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (zero-based), jitter included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        let jitter = rand::random::<f64>() * self.jitter_factor * capped;
        Duration::from_millis((capped + jitter) as u64)
    }
}

/// Dedicated backoff for rate-limit exhaustion.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Additional attempts granted after a rate-limit error.
    pub max_retries: u32,
    /// Delay before the first rate-limit retry; doubles each time.
    pub initial_delay: Duration,
    /// Upper bound on any single rate-limit delay.
    pub max_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_retries: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before rate-limit retry number `attempt` (zero-based): the
    /// initial delay doubled per step, capped. Defaults yield 10 s, 20 s,
    /// 40 s.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.initial_delay.as_millis() as u64;
        let doubled = millis.saturating_mul(1u64 << attempt.min(32));
        Duration::from_millis(doubled).min(self.max_delay)
    }
}
