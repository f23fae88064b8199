use std::fmt::Display;

use tokio::time::{sleep, Duration};
use tracing::{error, warn};

use crate::config::settings::RetryConfig;

pub const RETRY_ATTEMPTS_DEFAULT: u32 = 1;
pub const RETRY_BASE_DELAY_MS_DEFAULT: u64 = 200;
pub const RETRY_MAX_DELAY_MS_DEFAULT: u64 = 2000;

#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: RETRY_ATTEMPTS_DEFAULT,
            base_delay_ms: RETRY_BASE_DELAY_MS_DEFAULT,
            max_delay_ms: RETRY_MAX_DELAY_MS_DEFAULT,
        }
    }
}

impl From<Option<&RetryConfig>> for RetrySettings {
    fn from(retry: Option<&RetryConfig>) -> Self {
        Self {
            attempts: retry.and_then(|r| r.attempts).unwrap_or(RETRY_ATTEMPTS_DEFAULT).max(1),
            base_delay_ms: retry.and_then(|r| r.base_delay_ms).unwrap_or(RETRY_BASE_DELAY_MS_DEFAULT),
            max_delay_ms: retry.and_then(|r| r.max_delay_ms).unwrap_or(RETRY_MAX_DELAY_MS_DEFAULT),
        }
    }
}

impl RetrySettings {
    /// Run `operation` until it succeeds, the error is not retryable, or attempts run out.
    /// Delay doubles after every failed attempt, capped at `max_delay_ms`.
    pub async fn run_with_retry<F, Fut, T, E, R>(&self, mut operation: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Display,
        R: Fn(&E) -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut delay = self.base_delay_ms.min(self.max_delay_ms);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && retryable(&e) => {
                    warn!("Attempt {attempt}/{attempts} failed: {e}");
                    sleep(Duration::from_millis(delay)).await;
                    delay = delay.saturating_mul(2).min(self.max_delay_ms);
                    attempt += 1;
                }
                Err(e) => {
                    if attempts > 1 {
                        error!("gave up after {attempt} attempt(s): {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
