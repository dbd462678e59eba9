//! Optional per-call deadlines

use std::future::Future;
use std::time::Duration;

use crate::error::{RepositoryError, Result};

/// Run `fut`, failing with `Timeout` if a deadline is set and passes first
pub(crate) async fn with_deadline<T, F>(
    deadline: Option<Duration>,
    operation: &str,
    table: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    table,
                    operation,
                    timeout_ms = limit.as_millis() as u64,
                    "Backing-store call timed out"
                );
                Err(RepositoryError::timeout(operation, table))
            }
        },
    }
}
