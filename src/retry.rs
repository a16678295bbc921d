//! Backoff for caller-side resubmission.
//!
//! The batcher itself never retries a failed batch. This strategy backs
//! [`Batcher::call_with_retry`](crate::Batcher::call_with_retry), which
//! resubmits a payload as a fresh item.

use std::time::Duration;

/// Internal type - users configure retries via `RetrySettings` in `BatcherConfig`.
#[derive(Debug, Clone)]
pub(crate) struct RetryConfig {
    /// Maximum number of resubmissions
    max_retries: u32,
    /// Base backoff duration in milliseconds
    base_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds
    max_backoff_ms: u64,
    /// Backoff multiplier for exponential backoff
    multiplier: f64,
    /// Spread concurrent callers that failed in the same batch
    jitter: bool,
}

impl RetryConfig {
    pub(crate) fn new(max_retries: u32, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            base_backoff_ms,
            max_backoff_ms,
            multiplier: 2.0,
            jitter: true,
        }
    }

    #[cfg(test)]
    fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RetryStrategy {
    config: RetryConfig,
}

impl RetryStrategy {
    pub(crate) fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Calculate the backoff duration for a given attempt
    ///
    /// # Arguments
    ///
    /// * `attempt` - The current attempt number (1-indexed)
    pub(crate) fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let mut backoff_ms = self.config.base_backoff_ms as f64 * self.config.multiplier.powi(exponent);

        // Cap at max backoff
        backoff_ms = backoff_ms.min(self.config.max_backoff_ms as f64);

        if self.config.jitter {
            use rand::Rng;
            let jitter_factor = rand::rng().random_range(0.5..1.5);
            backoff_ms = (backoff_ms * jitter_factor).min(self.config.max_backoff_ms as f64);
        }

        Duration::from_millis(backoff_ms as u64)
    }

    /// Check if should retry based on attempt count
    pub(crate) fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.config.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth() {
        let strategy = RetryStrategy::new(RetryConfig::new(5, 100, 10_000).without_jitter());

        assert_eq!(strategy.calculate_backoff(0), Duration::ZERO);
        assert_eq!(strategy.calculate_backoff(1), Duration::from_millis(100));
        assert_eq!(strategy.calculate_backoff(2), Duration::from_millis(200));
        assert_eq!(strategy.calculate_backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let strategy = RetryStrategy::new(RetryConfig::new(10, 1000, 5000).without_jitter());
        assert_eq!(strategy.calculate_backoff(10), Duration::from_millis(5000));
        assert_eq!(strategy.calculate_backoff(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn test_should_retry() {
        let strategy = RetryStrategy::new(RetryConfig::new(2, 100, 1000));

        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(1));
        assert!(!strategy.should_retry(2));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let strategy = RetryStrategy::new(RetryConfig::new(5, 1000, 30_000));

        for _ in 0..20 {
            let backoff = strategy.calculate_backoff(2);
            // 2000ms nominal, jittered by 0.5x..1.5x
            assert!(backoff >= Duration::from_millis(1000));
            assert!(backoff <= Duration::from_millis(3000));
        }
    }
}
