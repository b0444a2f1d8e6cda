// Upstream feed seam: paginated sources of raw records, their error type, and
// the bounded exponential-backoff retry wrapper.

pub mod game_logs;
pub mod odds;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::model::RawRecord;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode upstream payload: {0}")]
    Decode(String),

    #[error("upstream still failing after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// Network failures, throttling (429), and server errors (5xx) are worth
    /// retrying; anything else fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::Decode(_) | UpstreamError::RetriesExhausted { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Feed trait
// ---------------------------------------------------------------------------

/// One page of raw records plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<String>,
}

/// A cursor-paginated upstream source. `cursor = None` requests the first
/// page.
#[async_trait]
pub trait RecordFeed: Send + Sync {
    /// Short label for logs and summaries.
    fn name(&self) -> &str;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `backoff_max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.backoff_base
            .checked_mul(factor)
            .map_or(self.backoff_max, |d| d.min(self.backoff_max))
    }
}

/// Run `op` until it succeeds, fails permanently, or uses up the policy's
/// attempts. Exhaustion is reported as `RetriesExhausted` wrapping the last
/// transient error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let max_attempts = policy.max_retries.max(1);
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt + 1 >= max_attempts => {
                return Err(UpstreamError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    feed = label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "transient upstream error, retrying: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(250),
        }
    }

    fn unavailable() -> UpstreamError {
        UpstreamError::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(2), Duration::from_millis(250));
        assert_eq!(p.delay_for(40), Duration::from_millis(250));
    }

    #[test]
    fn transient_classification() {
        assert!(unavailable().is_transient());
        assert!(UpstreamError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!UpstreamError::Status { status: 404, body: String::new() }.is_transient());
        assert!(!UpstreamError::Decode("bad json".into()).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(unavailable())
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<(), _> = with_retry(&policy(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;
        match result {
            Err(UpstreamError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, UpstreamError::Status { status: 503, .. }));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Slept 100ms then 200ms between the three attempts.
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&policy(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(UpstreamError::Status {
                status: 401,
                body: "bad key".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(UpstreamError::Status { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
