use crate::error::{TranslationError, TranslationResult};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Race an async data operation against a deadline.
///
/// The operation runs as its own task. If the deadline wins, the task is
/// abandoned rather than aborted: it keeps running and its result is
/// discarded. Only pass read-only or idempotent operations.
///
/// # Arguments
/// * `operation_name` - Name of the operation for logging and the timeout error
/// * `limit` - Deadline for the operation
/// * `operation` - Future producing the operation's result
///
/// # Returns
/// The operation's own result, or [`TranslationError::Timeout`] if the
/// deadline passed first.
pub async fn with_timeout<T, Fut>(
    operation_name: &'static str,
    limit: Duration,
    operation: Fut,
) -> TranslationResult<T>
where
    Fut: Future<Output = TranslationResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(operation);

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(TranslationError::DataStore(format!(
            "{} task failed: {}",
            operation_name, join_error
        ))),
        Err(_) => {
            debug!(
                "{}: deadline of {:?} passed, abandoning operation",
                operation_name, limit
            );
            Err(TranslationError::Timeout {
                operation: operation_name,
                after: limit,
            })
        }
    }
}
