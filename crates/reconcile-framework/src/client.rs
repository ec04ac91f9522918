//! # Plane Client
//!
//! The [`ManagementApi`] implementation that talks to an in-memory
//! [`PlaneActor`](crate::actor::PlaneActor).

use crate::api::{ApiError, ManagementApi, OperationId, OperationStatus, Submitted};
use crate::identity::ResourceIdentity;
use crate::message::PlaneRequest;
use crate::resource::ManagedResource;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

/// Cheap to clone: holds only the sender half of the actor's channel. A closed channel
/// surfaces as [`ApiError::Unavailable`].
pub struct PlaneClient<R: ManagedResource> {
    sender: mpsc::Sender<PlaneRequest<R>>,
}

impl<R: ManagedResource> Clone for PlaneClient<R> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<R: ManagedResource> PlaneClient<R> {
    pub fn new(sender: mpsc::Sender<PlaneRequest<R>>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, ApiError>>) -> PlaneRequest<R>,
    ) -> Result<T, ApiError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| ApiError::Unavailable)?;
        response.await.map_err(|_| ApiError::Unavailable)?
    }
}

#[async_trait]
impl<R: ManagedResource> ManagementApi<R> for PlaneClient<R> {
    #[instrument(skip_all, fields(identity = %identity))]
    async fn get(&self, identity: &ResourceIdentity) -> Result<Option<R::Record>, ApiError> {
        let identity = identity.clone();
        self.request(|respond_to| PlaneRequest::Get {
            identity,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(identity = %identity))]
    async fn create(
        &self,
        identity: &ResourceIdentity,
        record: R::Record,
    ) -> Result<Submitted, ApiError> {
        let identity = identity.clone();
        self.request(|respond_to| PlaneRequest::Create {
            identity,
            record,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(identity = %identity))]
    async fn update(
        &self,
        identity: &ResourceIdentity,
        patch: R::Patch,
    ) -> Result<Submitted, ApiError> {
        let identity = identity.clone();
        self.request(|respond_to| PlaneRequest::Update {
            identity,
            patch,
            respond_to,
        })
        .await
    }

    #[instrument(skip_all, fields(identity = %identity))]
    async fn delete(&self, identity: &ResourceIdentity) -> Result<Submitted, ApiError> {
        let identity = identity.clone();
        self.request(|respond_to| PlaneRequest::Delete {
            identity,
            respond_to,
        })
        .await
    }

    async fn poll(&self, operation: &OperationId) -> Result<OperationStatus, ApiError> {
        let operation = operation.clone();
        self.request(|respond_to| PlaneRequest::Poll {
            operation,
            respond_to,
        })
        .await
    }
}
