//! # Plane Messages
//!
//! Requests sent from a [`PlaneClient`](crate::client::PlaneClient) to a
//! [`PlaneActor`](crate::actor::PlaneActor). One variant per call of the
//! [`ManagementApi`](crate::api::ManagementApi) contract, each carrying a oneshot sender for
//! the answer.

use crate::api::{ApiError, OperationId, OperationStatus, Submitted};
use crate::identity::ResourceIdentity;
use crate::resource::ManagedResource;
use tokio::sync::oneshot;

/// The one-shot response channel used by the plane.
pub type Response<T> = oneshot::Sender<Result<T, ApiError>>;

#[derive(Debug)]
pub enum PlaneRequest<R: ManagedResource> {
    Get {
        identity: ResourceIdentity,
        respond_to: Response<Option<R::Record>>,
    },
    Create {
        identity: ResourceIdentity,
        record: R::Record,
        respond_to: Response<Submitted>,
    },
    Update {
        identity: ResourceIdentity,
        patch: R::Patch,
        respond_to: Response<Submitted>,
    },
    Delete {
        identity: ResourceIdentity,
        respond_to: Response<Submitted>,
    },
    Poll {
        operation: OperationId,
        respond_to: Response<OperationStatus>,
    },
}
