//! Restart-from-scratch retry for multi-request operations.
//!
//! A store cursor is only valid inside one coherent pagination session, so a
//! failed fetch cannot resume mid-way. The whole operation is re-run after a
//! constant cooldown until it succeeds or the attempt budget is spent.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::error::{Result, StoreError, short_error_message};
use crate::types::{FETCH_RETRY_COOLDOWN_MS, MAX_FETCH_ATTEMPTS};

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before each restart.
    pub cooldown: Duration,
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: usize,
    /// Whether to add jitter to the cooldown.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(FETCH_RETRY_COOLDOWN_MS),
            max_attempts: MAX_FETCH_ATTEMPTS,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(cooldown: Duration, max_attempts: usize) -> Self {
        Self {
            cooldown,
            max_attempts,
            with_jitter: false,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build a constant backoff strategy from this configuration.
    ///
    /// backon counts retries, not attempts, hence the `- 1`.
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        let mut builder = ConstantBuilder::default()
            .with_delay(self.cooldown)
            .with_max_times(self.max_attempts.max(1) - 1);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Run `operation` until it succeeds, restarting it from scratch on failure.
///
/// - Retryable errors trigger a restart after the cooldown; `on_retry` is
///   called with the failed attempt number, the error and the delay.
/// - Non-retryable errors are returned as-is on the first occurrence.
/// - When the budget is exhausted, returns
///   [`StoreError::MaxRetriesExceeded`] wrapping the last error. No further
///   attempt is made.
pub async fn with_restart<T, F, Fut, N>(
    mut operation: F,
    config: &RetryConfig,
    mut on_retry: N,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    N: FnMut(usize, &StoreError, Duration),
{
    let attempt = AtomicUsize::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    let result = retry_op
        .retry(config.clone().into_backoff())
        .notify(|err: &StoreError, dur: Duration| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            tracing::warn!(
                attempt = current_attempt,
                max_attempts = config.max_attempts,
                retry_in = ?dur,
                "Operation failed, restarting from scratch: {}",
                short_error_message(err)
            );
            on_retry(current_attempt, err, dur);
        })
        .when(StoreError::is_retryable)
        .await;

    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_retryable() => {
            let attempts = attempt.load(Ordering::SeqCst);
            tracing::error!(attempts, "Giving up: {}", short_error_message(&err));
            Err(StoreError::MaxRetriesExceeded {
                attempts,
                last_error: err.to_string(),
            })
        }
        Err(err) => Err(err),
    }
}
