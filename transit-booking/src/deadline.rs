use std::future::Future;
use std::time::Duration;
use tracing::warn;
use transit_core::{EngineError, EngineResult};

/// Runs `fut` under `limit`. On expiry the future is dropped, and with it any
/// open transaction, which rolls back.
pub async fn with_deadline<T, F>(limit: Duration, operation: &'static str, fut: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            let millis = limit.as_millis() as u64;
            warn!(operation, millis, "operation exceeded its deadline");
            Err(EngineError::Timeout { millis })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fast_operations_pass_through() {
        let out = with_deadline(Duration::from_millis(200), "noop", async { Ok(7) }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_slow_operations_time_out() {
        let out: EngineResult<()> = with_deadline(Duration::from_millis(10), "sleepy", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;
        assert!(matches!(out, Err(EngineError::Timeout { millis: 10 })));
    }

    #[tokio::test]
    async fn test_errors_are_not_masked() {
        let out: EngineResult<()> =
            with_deadline(Duration::from_millis(200), "fails", async { Err(EngineError::EmptyBatch) }).await;
        assert!(matches!(out, Err(EngineError::EmptyBatch)));
    }
}
