//! Timeout helpers for bounded async operations.
//!
//! ```ignore
//! let rows = with_timeout(
//!     Duration::from_millis(30_000),
//!     executor.execute(&sql, timeout),
//!     "sql execution",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{QuorumError, Result};

/// Execute an async operation with a timeout
///
/// Returns `QuorumError::Timeout` if the operation doesn't complete in time.
/// The inner future is dropped on expiry.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(QuorumError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, QuorumError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, QuorumError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result, Err(QuorumError::Timeout { .. })));
    }
}
