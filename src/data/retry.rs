//! Bounded retry with exponential backoff and additive jitter for upstream fetches.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::constants;
use crate::error::{BoxError, FetchError};

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    /// Additive jitter unit, scaled by attempt number
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::retry::MAX_RETRIES,
            base_delay: constants::retry::BASE_DELAY,
            backoff_factor: constants::retry::BACKOFF_FACTOR,
            jitter: constants::retry::JITTER,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff_factor: config.backoff_factor,
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

impl RetryPolicy {
    /// Exponential part of the wait after failed attempt `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let scale = self.backoff_factor.powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * scale)
    }

    /// Wait after failed attempt `attempt`:
    /// `base_delay * backoff_factor^attempt + jitter * (attempt + 1)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + self.jitter * (attempt + 1)
    }
}

/// Runs read-only upstream operations with bounded retry.
///
/// Operations are re-invoked verbatim, so only pass idempotent fetches.
#[derive(Clone, Debug, Default)]
pub struct ResilientFetchClient {
    policy: RetryPolicy,
}

impl ResilientFetchClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Calls `operation` until it succeeds or `max_retries` attempts have failed.
    /// Each failed attempt is logged once. Exhaustion wraps the last error.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("[FETCH] {} succeeded on attempt {}/{}", label, attempt + 1, max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let err: BoxError = e.into();
                    warn!(
                        "[FETCH] {} failed, attempt {}/{}: {}",
                        label,
                        attempt + 1,
                        max_attempts,
                        err
                    );

                    if attempt + 1 >= max_attempts {
                        return Err(FetchError::Exhausted {
                            label: label.to_string(),
                            attempts: max_attempts,
                            source: Arc::from(err),
                        });
                    }

                    tokio::time::sleep(self.policy.delay(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
