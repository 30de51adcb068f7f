use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Wait before the next attempt, given the attempt that just failed (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `initial * 2^(attempt - 1)`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    pub fn delay_after(&self, failed_attempt: usize) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let doublings = failed_attempt.saturating_sub(1).min(16) as u32;
                initial.saturating_mul(1 << doublings).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Backoff,
}

#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn exponential(max_attempts: usize, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Exponential { initial, max },
        }
    }

    pub fn immediate(max_attempts: usize) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Waiting for the vector store at startup: 20 probes, 3 s apart.
    pub fn connectivity_default() -> Self {
        Self::fixed(20, Duration::from_secs(3))
    }

    /// Batch writes: the first try plus two retries.
    pub fn upsert_default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryExhausted<E>>
    where
        E: Display,
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts => {
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        %error,
                        "attempt failed, retrying"
                    );
                    let delay = self.backoff.delay_after(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: error,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate(3)
            .run("flaky", |attempt| {
                calls.set(calls.get() + 1);
                async move {
                    if attempt < 3 {
                        Err(format!("failure {attempt}"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn reports_last_error_when_exhausted() {
        let result: Result<(), _> = RetryPolicy::immediate(2)
            .run("always-down", |attempt| async move { Err(format!("failure {attempt}")) })
            .await;

        let exhausted = result.expect_err("should give up");
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.last_error, "failure 2");
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_fixed_delay_between_attempts() {
        let started = tokio::time::Instant::now();
        let _ = RetryPolicy::fixed(3, Duration::from_secs(3))
            .run("slow", |_| async { Err::<(), _>("down") })
            .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_backoff_doubles_up_to_the_cap() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(3),
        };
        assert_eq!(backoff.delay_after(1), Duration::from_millis(500));
        assert_eq!(backoff.delay_after(2), Duration::from_secs(1));
        assert_eq!(backoff.delay_after(3), Duration::from_secs(2));
        assert_eq!(backoff.delay_after(4), Duration::from_secs(3));
        assert_eq!(backoff.delay_after(40), Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        let _ = RetryPolicy::exponential(4, Duration::from_millis(500), Duration::from_secs(3))
            .run("slow", |_| async { Err::<(), _>("down") })
            .await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3500) && elapsed < Duration::from_millis(4500));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }
}
