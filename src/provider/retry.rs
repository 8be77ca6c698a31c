//! Retry with exponential backoff for transport-level failures.

use crate::cancel::CancelToken;
use anyhow::anyhow;
use std::future::Future;
use std::time::Duration;

pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Retry configuration
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }
}

/// Run `op` until it succeeds, the error is not retryable, or retries run
/// out. Backoff doubles each attempt up to the cap; cancellation aborts the
/// backoff wait immediately.
pub async fn with_retry<T, F, Fut>(
    config: RetryConfig,
    cancel: &CancelToken,
    is_retryable: impl Fn(&anyhow::Error) -> bool,
    mut op: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut backoff = config.initial_backoff;
    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt == config.max_retries || !is_retryable(&e) {
                    return Err(e);
                }
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "request failed, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancel.cancelled() => {
                        return Err(anyhow!("retry cancelled: {}", e));
                    }
                }
                last_err = Some(e);
                backoff = (backoff * 2).min(config.max_backoff);
            }
        }
    }

    // Unreachable: the loop returns on the final attempt.
    Err(last_err.unwrap_or_else(|| anyhow!("max retries exceeded")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: anyhow::Result<u32> = with_retry(fast_config(), &CancelToken::never(), |_| true, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: anyhow::Result<&str> = with_retry(fast_config(), &CancelToken::never(), |_| true, move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("transient")
                }
                Ok("ok")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: anyhow::Result<()> = with_retry(fast_config(), &CancelToken::never(), |_| true, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("always fails")
            }
        })
        .await;
        assert!(result.is_err());
        // initial attempt + 3 retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_fast() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: anyhow::Result<()> = with_retry(fast_config(), &CancelToken::never(), |_| false, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("terminal")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_backoff_wait() {
        let (handle, token) = crate::cancel::channel();
        let slow = RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
        };
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();

        handle.cancel();
        let result: anyhow::Result<()> = with_retry(slow, &token, |_| true, move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("transient")
            }
        })
        .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("retry cancelled"), "{}", err);
        // The first failure enters the backoff wait, which aborts at once
        // instead of sleeping out the 60s window.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
