//! Waiting for asynchronous remote operations.
//!
//! The loop itself is unbounded; callers wrap it in `tokio::time::timeout` with the budget
//! of the operation being waited on.

use crate::api::{ApiError, ManagementApi, OperationStatus, Submitted};
use crate::resource::ManagedResource;
use std::time::Duration;
use tracing::debug;

/// Polls until the submitted operation finishes. A remote `Failed` status becomes
/// [`ApiError::Failed`].
pub async fn wait_for_completion<R, A>(
    api: &A,
    submitted: Submitted,
    interval: Duration,
) -> Result<(), ApiError>
where
    R: ManagedResource,
    A: ManagementApi<R> + ?Sized,
{
    let operation = match submitted {
        Submitted::Completed => return Ok(()),
        Submitted::Accepted(operation) => operation,
    };

    let mut polls = 0u32;
    loop {
        polls += 1;
        match api.poll(&operation).await? {
            OperationStatus::Succeeded => {
                debug!(%operation, polls, "Operation succeeded");
                return Ok(());
            }
            OperationStatus::Failed(message) => {
                return Err(ApiError::Failed {
                    code: "OperationFailed".to_string(),
                    message,
                })
            }
            OperationStatus::InProgress => tokio::time::sleep(interval).await,
        }
    }
}
