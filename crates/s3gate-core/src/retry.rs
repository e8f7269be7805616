//! Bounded retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;
use typed_builder::TypedBuilder;

/// How often and how patiently to retry.
///
/// ```
/// use std::time::Duration;
/// use backon::BackoffBuilder;
/// use s3gate_core::retry::RetryPolicy;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(4)
///     .initial_backoff(Duration::from_secs(1))
///     .build();
/// let delays: Vec<Duration> = policy.backoff().build().collect();
/// assert_eq!(delays.len(), 3);
/// assert_eq!(delays[0], Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    #[builder(default = 3)]
    pub max_attempts: u32,
    /// Delay after the first failure.
    #[builder(default = Duration::from_millis(500))]
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    #[builder(default = Duration::from_secs(5))]
    pub max_backoff: Duration,
    /// Growth factor between delays.
    #[builder(default = 2.0)]
    pub multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RetryPolicy {
    /// The delay schedule: one delay per retry, so `max_attempts - 1` of them.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBuilder {
        let retries = usize::try_from(self.max_attempts.saturating_sub(1)).unwrap_or(usize::MAX);
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_factor(self.multiplier)
            .with_max_times(retries)
    }
}

/// Run `op` until it succeeds, fails with an error `should_retry` rejects,
/// or `policy.max_attempts` attempts were made. The last error is returned.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, should_retry: P, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts;
    op.retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(|err: &E| should_retry(err))
        .notify(|err: &E, delay: Duration| {
            warn!(
                max_attempts,
                delay = ?delay,
                error = %err,
                "attempt failed, retrying"
            );
        })
        .await
}
