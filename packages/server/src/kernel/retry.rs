//! Bounded exponential backoff for outbound calls.

use std::future::Future;
use std::time::Duration;

use crate::common::EngineError;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Run `op`, retrying transient failures up to three times with 1s/2s/4s
/// waits. Validation, conflict, and permanent external errors pass through
/// untouched on the first occurrence.
pub async fn retry_with_backoff<T, F, Fut>(label: &str, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut delay = BASE_DELAY;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    target = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(EngineError::Transient(anyhow::anyhow!("flaky")))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Transient(anyhow::anyhow!("down"))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn does_not_retry_validation() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::validation("bad input")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
