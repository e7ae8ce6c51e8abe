//! Bounded exponential backoff around any [`Cognition`] backend.

use std::time::Duration;

use super::{Cognition, Result};
use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Retries transient failures; non-transient errors are returned immediately.
pub struct RetryingCognition<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: Cognition> RetryingCognition<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<C: Cognition> Cognition for RetryingCognition<C> {
    fn ask(&self, prompt: &str, context: &[String]) -> Result<String> {
        let mut attempt = 1;
        loop {
            match self.inner.ask(prompt, context) {
                Ok(answer) => return Ok(answer),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient cognition failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cognition::CognitionError;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error for the first `failures` calls.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        transient: bool,
    }

    impl Cognition for Flaky {
        fn ask(&self, _prompt: &str, _context: &[String]) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.transient {
                    Err(CognitionError::Timeout)
                } else {
                    Err(CognitionError::Parse("garbage".into()))
                }
            } else {
                Ok("answer".into())
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(3000),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(4), Duration::from_millis(3000));
        assert_eq!(policy.backoff(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let flaky = Flaky { failures: 2, calls: AtomicU32::new(0), transient: true };
        let retrying = RetryingCognition::new(flaky, fast_policy(3));
        assert_eq!(retrying.ask("q", &[]).unwrap(), "answer");
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let flaky = Flaky { failures: 10, calls: AtomicU32::new(0), transient: true };
        let retrying = RetryingCognition::new(flaky, fast_policy(3));
        assert!(matches!(retrying.ask("q", &[]), Err(CognitionError::Timeout)));
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_permanent_errors_fail_fast() {
        let flaky = Flaky { failures: 1, calls: AtomicU32::new(0), transient: false };
        let retrying = RetryingCognition::new(flaky, fast_policy(5));
        assert!(matches!(retrying.ask("q", &[]), Err(CognitionError::Parse(_))));
        assert_eq!(retrying.inner.calls.load(Ordering::SeqCst), 1);
    }
}
