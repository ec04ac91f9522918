//! # ManagedResource Trait
//!
//! The contract a resource kind implements to be driven by the
//! [`LifecycleController`](crate::controller::LifecycleController). It plays the role an
//! entity definition plays for an actor: associated types fix the wire record and the
//! partial-update payload, so a rule's patch can never be sent to a tags endpoint.
//!
//! All methods are pure translations. No I/O happens here, which is what lets the controller
//! report every validation failure before the first remote call.

use crate::error::ReconcileError;
use crate::fragment::{ChangeSet, Fragment};
use crate::identity::{IdentityTemplate, ResourceIdentity};
use std::fmt::Debug;

pub trait ManagedResource: Send + Sync + 'static {
    /// The full server-held representation.
    type Record: Clone + Send + Sync + Debug + 'static;

    /// A partial update carrying only changed fields.
    type Patch: Clone + Send + Sync + Debug + 'static;

    /// Human-readable kind, used in logs.
    const KIND: &'static str;

    /// The identity layout of this kind.
    fn template() -> &'static IdentityTemplate;

    /// Derives the identity a desired-state fragment addresses.
    fn identity(desired: &Fragment) -> Result<ResourceIdentity, ReconcileError>;

    /// Desired state -> full wire record. Runs every local validation.
    fn expand(identity: &ResourceIdentity, desired: &Fragment)
        -> Result<Self::Record, ReconcileError>;

    /// Wire record -> desired state, with every declared field set.
    fn flatten(identity: &ResourceIdentity, record: &Self::Record)
        -> Result<Fragment, ReconcileError>;

    /// Builds the partial update for `changes`. `None` means nothing needs to be sent.
    fn expand_patch(
        identity: &ResourceIdentity,
        desired: &Fragment,
        changes: &ChangeSet,
    ) -> Result<Option<Self::Patch>, ReconcileError>;

    /// Fills declared defaults so two fragments describing the same record compare equal.
    fn normalize(identity: &ResourceIdentity, fragment: &Fragment) -> Result<Fragment, ReconcileError> {
        Self::flatten(identity, &Self::expand(identity, fragment)?)
    }
}
