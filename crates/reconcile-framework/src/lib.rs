//! # Reconcile Framework
//!
//! Building blocks for driving declarative resources to their desired state against a
//! remote management plane. Given a typed desired-state document, a client for the remote
//! API, and a mapping between the two, a [`LifecycleController`] creates, reads, updates
//! and deletes one resource at a time, failing fast on anything it can check locally and
//! bounding every wait on the remote side.
//!
//! ## Architecture Overview
//!
//! The crate separates concerns into four layers, leaves first:
//!
//! 1. **Identity** ([`identity`]) - canonical resource identifiers, parsed and rendered
//!    losslessly, with parent/child derivation.
//! 2. **Mapping** ([`registry`], [`codec`]) - multi-valued, discriminated composite fields
//!    (a rule's actions or conditions) translated between their desired-state shape and the
//!    flat, tagged wire sequence, with cardinality and ceiling checks.
//! 3. **Resource** ([`ManagedResource`]) - your resource kind: how its desired state expands
//!    into a wire record and flattens back.
//! 4. **Lifecycle** ([`LifecycleController`]) - the state machine, diffing, completion
//!    waiting and timeouts, talking to any [`ManagementApi`].
//!
//! ```text
//!  Fragment ──expand──▶ Record ──ManagementApi──▶ remote plane
//!  Fragment ◀─flatten── Record ◀──────────────────
//! ```
//!
//! ## Remote Planes
//!
//! [`ManagementApi`] is the only thing the controller knows about the remote side. Two
//! implementations ship with the crate:
//!
//! - [`PlaneActor`] / [`PlaneClient`]: an in-memory plane running as an actor task, with
//!   long-running operations that complete after a configurable number of polls.
//! - [`mock::MockApi`]: scripted expectations for unit tests.
//!
//! ## Concurrency Model
//!
//! - Registries are built once (typically in a `OnceLock`) and only read afterwards.
//! - The codec and identity layers are pure.
//! - A controller holds no per-resource state; each [`ResourceInstance`] is owned by the
//!   task reconciling it.
//! - The plane actor processes its requests sequentially and needs no locks.

pub mod actor;
pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod fragment;
pub mod identity;
pub mod message;
pub mod mock;
pub mod registry;
pub mod resource;
pub mod tracing;
pub mod waiter;

// Re-export core types for convenience
pub use actor::{PlaneActor, PlaneOptions, PlaneResource};
pub use api::{ApiError, ManagementApi, OperationId, OperationStatus, Submitted};
pub use client::PlaneClient;
pub use config::{ReconcilerConfig, Timeouts};
pub use controller::{LifecycleController, Phase, ReadOutcome, ResourceInstance};
pub use error::{AtIdentity, CodecError, LifecycleOp, Observed, ReconcileError, RegistryError};
pub use fragment::{ChangeSet, Fragment};
pub use identity::{IdentityTemplate, ResourceIdentity, SegmentSpec};
pub use message::{PlaneRequest, Response};
pub use registry::{Cardinality, Discriminated, RawVariant, Registry, VariantKind};
pub use resource::ManagedResource;
