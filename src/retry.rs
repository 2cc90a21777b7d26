//! Exponential-backoff retry for transient transport failures.
//!
//! Both the Qdrant client and the remote embedding provider wrap their
//! outbound calls in [`with_retry`]. Only rate limiting, server errors, and
//! connection-level failures are retried; everything else fails fast.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// HTTP status codes worth retrying.
const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// Backoff policy. Delay for attempt `n` (1-based) is
/// `min(initial_delay * backoff_factor^(n-1), max_delay)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.max_delay)
    }
}

/// Run `op` up to `max_retries` times, sleeping between attempts.
///
/// `label` names the operation in retry logs.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Whether an error is a transient transport failure.
///
/// Walks the error chain looking for an HTTP-layer error: timeouts and
/// connection failures (reset, refused, DNS) retry, as do the status codes in
/// [`RETRYABLE_STATUS`]. Application-level errors never retry.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(req_err) = cause.downcast_ref::<reqwest::Error>() {
            if req_err.is_timeout() || req_err.is_connect() {
                return true;
            }
            if let Some(status) = req_err.status() {
                return RETRYABLE_STATUS.contains(&status.as_u16());
            }
            // Request never produced a response (reset mid-flight, etc.)
            return req_err.is_request() || req_err.is_body();
        }
        if let Some(status) = cause.downcast_ref::<RetryableStatus>() {
            return RETRYABLE_STATUS.contains(&status.0);
        }
    }
    false
}

/// Marker error carrying an HTTP status from a response whose body was already
/// consumed, so [`is_retryable`] can still classify it.
#[derive(Debug, thiserror::Error)]
#[error("HTTP status {0}")]
pub struct RetryableStatus(pub u16);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let policy = RetryPolicy::default();
        let result = with_retry(&policy, "test", || async { Ok::<_, anyhow::Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { anyhow::bail!("bad request") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retryable_status_retries_until_exhausted() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        };
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RetryableStatus(503).into()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let policy = RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_factor: 2.0,
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(RetryableStatus(429).into())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn status_classification() {
        assert!(is_retryable(&RetryableStatus(429).into()));
        assert!(is_retryable(&RetryableStatus(502).into()));
        assert!(!is_retryable(&RetryableStatus(400).into()));
        assert!(!is_retryable(&anyhow::anyhow!("logic error")));
    }
}
