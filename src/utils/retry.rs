//! Bounded exponential backoff for fragile sources.
//!
//! The wrapped operation returns a `Result`; every `Err` counts as a failed
//! attempt. After a failure the policy sleeps for the current delay and then
//! doubles it, until the attempt ceiling is reached. There is no jitter and
//! no cap on the delay other than the attempt ceiling.

use std::time::Duration;
use tokio::time::sleep;

use crate::config::RetrySettings;
use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after each subsequent one
    pub base_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
        }
    }
}

impl From<&RetrySettings> for BackoffPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_secs(settings.base_delay_secs),
        }
    }
}

/// Result of a retry operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success {
        value: T,
        attempts: u32,
        waits: Vec<Duration>,
    },
    /// Every attempt failed; `last_error` is the final failure
    Exhausted {
        last_error: SourceError,
        attempts: u32,
        waits: Vec<Duration>,
    },
}

impl<T> RetryResult<T> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. } | RetryResult::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Backoff waits that were slept, in order
    pub fn waits(&self) -> &[Duration] {
        match self {
            RetryResult::Success { waits, .. } | RetryResult::Exhausted { waits, .. } => waits,
        }
    }

    /// The successful value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            RetryResult::Success { value, .. } => Some(value),
            RetryResult::Exhausted { .. } => None,
        }
    }
}

/// Execute an async operation under the backoff policy.
///
/// Never returns an error: exhaustion is reported as [`RetryResult::Exhausted`].
pub async fn with_backoff<T, F, Fut>(policy: BackoffPolicy, operation: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut operation = operation;
    let mut attempts = 0;
    let mut delay = policy.base_delay;
    let mut waits = Vec::new();

    loop {
        match operation().await {
            Ok(value) => {
                if attempts > 0 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} failures",
                        attempts + 1,
                        attempts
                    );
                }
                return RetryResult::Success {
                    value,
                    attempts: attempts + 1,
                    waits,
                };
            }
            Err(error) => {
                attempts += 1;
                tracing::warn!("Attempt {}/{} failed: {}", attempts, max_attempts, error);

                if attempts >= max_attempts {
                    tracing::error!("Giving up after {} attempts: {}", attempts, error);
                    return RetryResult::Exhausted {
                        last_error: error,
                        attempts,
                        waits,
                    };
                }

                tracing::debug!("Retrying in {:?}", delay);
                sleep(delay).await;
                waits.push(delay);
                delay = delay.saturating_mul(2);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = Rc::new(Cell::new(0));

        let result = {
            let calls = calls.clone();
            with_backoff(BackoffPolicy::default(), move || {
                let calls = calls.clone();
                async move {
                    calls.set(calls.get() + 1);
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.attempts(), 1);
        assert!(result.waits().is_empty());
        assert_eq!(result.into_value(), Some("success"));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_fifth_attempt() {
        let calls = Rc::new(Cell::new(0));
        let started = tokio::time::Instant::now();

        let result = {
            let calls = calls.clone();
            with_backoff(BackoffPolicy::default(), move || {
                let calls = calls.clone();
                async move {
                    calls.set(calls.get() + 1);
                    if calls.get() < 5 {
                        Err(SourceError::Network("blocked".to_string()))
                    } else {
                        Ok(vec![1, 2, 3])
                    }
                }
            })
        }
        .await;

        assert_eq!(calls.get(), 5);
        assert_eq!(result.attempts(), 5);
        assert_eq!(result.waits(), secs(&[10, 20, 40, 80]).as_slice());
        assert!(started.elapsed() >= Duration::from_secs(150));
        assert_eq!(result.into_value(), Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_without_error() {
        let calls = Rc::new(Cell::new(0));

        let result: RetryResult<Vec<u8>> = {
            let calls = calls.clone();
            with_backoff(BackoffPolicy::default(), move || {
                let calls = calls.clone();
                async move {
                    calls.set(calls.get() + 1);
                    Err(SourceError::Parse("captcha page".to_string()))
                }
            })
        }
        .await;

        assert_eq!(calls.get(), 5);
        assert_eq!(result.waits().len(), 4);
        match result {
            RetryResult::Exhausted {
                last_error,
                attempts,
                ..
            } => {
                assert_eq!(attempts, 5);
                assert!(matches!(last_error, SourceError::Parse(_)));
            }
            RetryResult::Success { .. } => panic!("expected exhaustion"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_tries_once() {
        let policy = BackoffPolicy {
            max_attempts: 0,
            base_delay: Duration::from_millis(5),
        };
        let result: RetryResult<()> =
            with_backoff(policy, || async { Err(SourceError::Other("x".into())) }).await;

        assert_eq!(result.attempts(), 1);
        assert!(result.waits().is_empty());
    }
}
