//! Backoff strategy implementation
//!
//! Delays come from `backon`'s exponential schedule (doubling from the base
//! delay, capped at the maximum). The loop itself is explicit so that every
//! attempt and every sleep can be raced against a `CancellationToken`.

use backon::{BackoffBuilder, ExponentialBuilder};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::RetryError;
use super::classifier::RetryClassifiable;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total calls allowed, the first one included.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Random spread applied to each computed delay (0.0 disables jitter).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.0,
        }
    }
}

impl RetryConfig {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }

    /// Delays slept between attempts, before jitter.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff().build().collect()
    }
}

/// Retry status for progress callbacks
#[derive(Debug, Clone)]
pub struct RetryStatus {
    /// Attempt that just failed (1-indexed)
    pub attempt: usize,
    /// Total elapsed time since first attempt
    pub elapsed: Duration,
    /// Duration of the upcoming backoff sleep
    pub sleep: Duration,
    /// Human-readable reason for the retry
    pub reason: String,
    /// True if the delay came from the server (rate limit)
    pub is_rate_limit: bool,
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts, or `cancel` fires.
///
/// Only errors classified as retryable are retried. A server-suggested delay
/// (HTTP 429 `Retry-After`) replaces the computed one for that sleep, capped
/// at `max_delay_ms`.
pub async fn retry_with_backoff<F, Fut, T, E, StatusCb>(
    mut operation: F,
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut status_cb: StatusCb,
) -> super::Result<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    E: std::error::Error + RetryClassifiable + Send + Sync + 'static,
    StatusCb: FnMut(RetryStatus) + Send,
{
    let start_time = Instant::now();
    let mut delays = config.backoff().build();
    let mut attempt: usize = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Aborted);
        }

        attempt += 1;
        let output = tokio::select! {
            output = operation() => output,
            _ = cancel.cancelled() => return Err(RetryError::Aborted),
        };

        let err = match output {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(RetryError::PermanentError(err.to_string()));
        }

        let Some(delay) = delays.next() else {
            return Err(RetryError::MaxAttemptsExceeded {
                attempts: attempt,
                last_error: err.to_string(),
            });
        };

        let (sleep, is_rate_limit) = match err.suggested_backoff() {
            Some(suggested) => (suggested.min(Duration::from_millis(config.max_delay_ms)), true),
            None => (apply_jitter(delay, config.jitter_factor), false),
        };

        let reason = if is_rate_limit {
            format!("Rate limited, waiting {sleep:?}")
        } else {
            format!("Transient error: {err}, retrying in {sleep:?}")
        };
        status_cb(RetryStatus {
            attempt,
            elapsed: start_time.elapsed(),
            sleep,
            reason,
            is_rate_limit,
        });

        if wait_with_cancel(cancel, sleep).await.is_err() {
            return Err(RetryError::Aborted);
        }
    }
}

async fn wait_with_cancel(cancel: &CancellationToken, duration: Duration) -> Result<(), ()> {
    if duration.is_zero() {
        return Ok(());
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(()),
    }
}

/// Apply jitter to a duration
///
/// 100ms with 0.5 jitter lands anywhere in 50ms..=150ms.
fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return duration;
    }
    let jitter = rand::rng().random_range(-jitter_factor..=jitter_factor);
    let jittered_ms = (duration.as_millis() as f64 * (1.0 + jitter)).max(0.0) as u64;
    Duration::from_millis(jittered_ms)
}
