use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::app::Result;

/// Run `op` up to `max_attempts` times.
///
/// Only rate-limit errors are retried, sleeping `base_delay * attempt`
/// between tries. Any other error is returned immediately.
pub async fn with_retry<T, F, Fut>(max_attempts: u32, base_delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt < max_attempts => {
                let delay = base_delay * attempt;
                warn!(
                    "Rate limited (attempt {}/{}), retrying in {:?}",
                    attempt, max_attempts, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TributaryError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_backs_off_linearly() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let result = with_retry(3, Duration::from_secs(1), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TributaryError::RateLimited("slow down".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s after the first attempt, 2s after the second
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TributaryError::Upstream("bad json".into()))
        })
        .await;

        assert!(matches!(result, Err(TributaryError::Upstream(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(3, Duration::from_secs(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TributaryError::RateLimited("still busy".into()))
        })
        .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
