//! Per-call time limits.

use check_core::ClusterError;
use std::future::Future;
use std::time::Duration;

/// Run one cluster call, failing with [`ClusterError::Timeout`] if it takes longer than `limit`.
///
/// There is no retry: a timed-out call is fatal for the run.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ClusterError>
where
    F: Future<Output = Result<T, ClusterError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ClusterError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok::<_, ClusterError>(1)
        };
        let result = bounded(Duration::from_secs(60), slow).await;
        assert!(matches!(result, Err(ClusterError::Timeout(d)) if d == Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, ClusterError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
