// ABOUTME: Bounded retry helper for eventually-consistent engine lookups.
// ABOUTME: Fixed attempt count with a fixed delay between attempts.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

/// How often and how patiently to retry a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Pause between attempts.
    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,
}

fn default_attempts() -> u32 {
    3
}

fn default_delay() -> Duration {
    Duration::from_secs(3)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay: default_delay(),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished successfully.
    Done(T),
    /// Not there yet; try again if attempts remain.
    Retry(E),
    /// Hard failure; stop immediately.
    Fail(E),
}

/// Run `op` until it finishes, fails hard, or the attempts are used up.
///
/// The closure receives the 1-based attempt number. On exhaustion the error
/// of the last attempt is returned.
pub async fn bounded_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fail(err) => return Err(err),
            Attempt::Retry(err) => {
                if attempt >= attempts {
                    return Err(err);
                }
                tracing::debug!("attempt {}/{} not ready, retrying", attempt, attempts);
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = bounded_retry(RetryPolicy::immediate(3), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 2 {
                    Attempt::Done(n)
                } else {
                    Attempt::Retry("not yet")
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = bounded_retry(RetryPolicy::immediate(3), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Attempt::Retry(format!("attempt {}", n)) }
        })
        .await;
        assert_eq!(result, Err("attempt 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hard_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = bounded_retry(RetryPolicy::immediate(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Fail("ambiguous") }
        })
        .await;
        assert_eq!(result, Err("ambiguous"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let result: Result<u8, ()> =
            bounded_retry(RetryPolicy::immediate(0), |_| async { Attempt::Done(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn default_policy_matches_cluster_settle_time() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }
}
