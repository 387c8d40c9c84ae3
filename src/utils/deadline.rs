use std::future::Future;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Run `operation` with a deadline.
///
/// On expiry the future is dropped. An append that already committed stays
/// committed; one that had not reached its commit point is rolled back by the
/// backend, so the log never holds half an event.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> CoreResult<T>
where
    F: Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Operation deadline exceeded");
            Err(CoreError::Timeout(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let result = with_deadline(Duration::from_millis(100), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let result: CoreResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_inner_error_is_kept() {
        let result: CoreResult<()> = with_deadline(Duration::from_millis(100), async {
            Err(CoreError::NotFound("match M1".to_string()))
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }
}
