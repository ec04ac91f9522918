//! # Management API Contract
//!
//! The remote collaborator the controller talks to. Mutations either finish immediately or
//! hand back an [`OperationId`] to poll; the controller owns the polling and the timeout.
//! Transport concerns (HTTP, credentials, retries) live behind implementations of
//! [`ManagementApi`].

use crate::identity::ResourceIdentity;
use crate::resource::ManagedResource;
use async_trait::async_trait;
use std::fmt;

/// Handle of an asynchronous remote operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(pub String);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer to a create/update/delete submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Completed,
    Accepted(OperationId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("the resource was not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{code}: {message}")]
    Failed { code: String, message: String },
    #[error("the management plane is unavailable")]
    Unavailable,
}

/// Remote operations on one resource kind.
#[async_trait]
pub trait ManagementApi<R: ManagedResource>: Send + Sync {
    /// Fetches the record, `None` when nothing exists at `identity`.
    async fn get(&self, identity: &ResourceIdentity) -> Result<Option<R::Record>, ApiError>;

    async fn create(
        &self,
        identity: &ResourceIdentity,
        record: R::Record,
    ) -> Result<Submitted, ApiError>;

    async fn update(
        &self,
        identity: &ResourceIdentity,
        patch: R::Patch,
    ) -> Result<Submitted, ApiError>;

    async fn delete(&self, identity: &ResourceIdentity) -> Result<Submitted, ApiError>;

    async fn poll(&self, operation: &OperationId) -> Result<OperationStatus, ApiError>;
}
