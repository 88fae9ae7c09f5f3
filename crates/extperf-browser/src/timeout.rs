use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Bound `fut` by `limit`, turning expiry into a typed [`Error::Timeout`]
pub async fn with_timeout<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!("{} exceeded {:?}", operation, limit);
            Err(Error::Timeout {
                operation: operation.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })
        }
    }
}
