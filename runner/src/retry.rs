//! Retry utility with exponential backoff

use std::time::Duration;
use tracing::warn;

/// Upper bound for the delay between two attempts
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry an async operation with exponential backoff.
///
/// Runs at least once. Returns `Ok` on first success, or the last `Err` after
/// `max_attempts` attempts. Delays: `initial_delay`, `2 * initial_delay`, ...
/// capped at 30s.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    max_attempts: u32,
    initial_delay: Duration,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = initial_delay;
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_attempts, e
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let result: Result<&str, String> =
            retry_with_backoff("test", 3, Duration::from_millis(1), || async { Ok("done") }).await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_succeeds_after_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result: Result<&str, String> =
            retry_with_backoff("test", 3, Duration::from_millis(1), move || {
                let counter = counter_clone.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::Relaxed);
                    if n < 2 {
                        Err(format!("fail #{}", n))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result: Result<(), String> =
            retry_with_backoff("test", 2, Duration::from_millis(1), move || {
                let n = counter_clone.fetch_add(1, Ordering::Relaxed);
                async move { Err(format!("fail #{}", n)) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "fail #1");
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_runs_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let result: Result<(), String> =
            retry_with_backoff("test", 0, Duration::from_millis(1), move || {
                counter_clone.fetch_add(1, Ordering::Relaxed);
                async { Err("always fails".to_string()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
