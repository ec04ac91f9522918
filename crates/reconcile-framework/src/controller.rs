//! # Resource Lifecycle Controller
//!
//! Drives one resource instance through its state machine against a [`ManagementApi`]:
//!
//! ```text
//! Absent -> Creating -> Present -> {Reading, Updating} -> Present -> Deleting -> Absent
//! ```
//!
//! The controller itself holds no per-resource state; the phase, identity and last known
//! fragment live in a [`ResourceInstance`] the caller owns and passes in. One controller can
//! therefore reconcile many instances concurrently from independent tasks.
//!
//! ## Guarantees
//!
//! - Every local check (identity, codec, field validation) runs before the first remote call.
//! - Create never overwrites: an existing record yields [`ReconcileError::AlreadyExists`].
//! - Update sends only the fields whose normalized value changed.
//! - Every wait is bounded by the budget of its operation. On timeout the controller makes one
//!   final `get` (bounded by the read budget) and records what it saw before surfacing
//!   [`ReconcileError::OperationTimeout`].
//! - Nothing is retried.
//! - A transient phase left behind by a cancelled future marks an interrupted operation. Such
//!   an instance keeps its identity and can still be read (which settles it) or deleted.

use crate::api::{ApiError, ManagementApi};
use crate::config::Timeouts;
use crate::error::{LifecycleOp, Observed, ReconcileError};
use crate::fragment::{diff, Fragment};
use crate::identity::ResourceIdentity;
use crate::resource::ManagedResource;
use crate::waiter::wait_for_completion;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Absent,
    Creating,
    Present,
    Reading,
    Updating,
    Deleting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Phase::Absent => "absent",
            Phase::Creating => "creating",
            Phase::Present => "present",
            Phase::Reading => "reading",
            Phase::Updating => "updating",
            Phase::Deleting => "deleting",
        };
        f.write_str(phase)
    }
}

/// Tracked state of one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstance {
    phase: Phase,
    identity: Option<ResourceIdentity>,
    state: Option<Fragment>,
}

impl Default for ResourceInstance {
    fn default() -> Self {
        Self::absent()
    }
}

impl ResourceInstance {
    /// An instance that has not been created yet.
    pub fn absent() -> Self {
        Self {
            phase: Phase::Absent,
            identity: None,
            state: None,
        }
    }

    /// An instance known to exist remotely, whose state has not been read yet.
    pub fn tracking(identity: ResourceIdentity) -> Self {
        Self {
            phase: Phase::Present,
            identity: Some(identity),
            state: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn identity(&self) -> Option<&ResourceIdentity> {
        self.identity.as_ref()
    }

    /// The fragment produced by the last successful read.
    pub fn state(&self) -> Option<&Fragment> {
        self.state.as_ref()
    }

    fn tracked(&self, operation: LifecycleOp) -> Result<ResourceIdentity, ReconcileError> {
        match (operation, self.phase, &self.identity) {
            (LifecycleOp::Update, Phase::Present, Some(identity)) => Ok(identity.clone()),
            (LifecycleOp::Read | LifecycleOp::Delete, _, Some(identity)) => Ok(identity.clone()),
            (_, phase, _) => Err(ReconcileError::InvalidPhase { phase, operation }),
        }
    }

    /// Marks an operation as in flight. Only a completed operation moves the phase on.
    fn begin(&mut self, phase: Phase, identity: &ResourceIdentity) {
        self.phase = phase;
        self.identity = Some(identity.clone());
    }

    fn forget(&mut self) {
        *self = Self::absent();
    }

    fn settle(&mut self, identity: &ResourceIdentity, err: &ReconcileError, fallback: Phase) {
        let phase = match err {
            ReconcileError::OperationTimeout {
                observed: Observed::Present,
                ..
            } => Phase::Present,
            ReconcileError::OperationTimeout {
                observed: Observed::Absent,
                ..
            } => Phase::Absent,
            _ => fallback,
        };
        if phase == Phase::Absent {
            self.forget();
        } else {
            self.phase = phase;
            self.identity = Some(identity.clone());
        }
    }
}

/// Result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Present(Fragment),
    /// Deleted out of band; the instance has been reset to `Absent` and should be dropped
    /// from tracked state.
    Gone,
}

pub struct LifecycleController<R, A> {
    api: A,
    timeouts: Timeouts,
    _kind: PhantomData<fn() -> R>,
}

impl<R, A> LifecycleController<R, A>
where
    R: ManagedResource,
    A: ManagementApi<R>,
{
    pub fn new(api: A, timeouts: Timeouts) -> Self {
        Self {
            api,
            timeouts,
            _kind: PhantomData,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Creates the resource described by `desired` and returns its normalized state.
    #[instrument(skip_all, fields(kind = R::KIND, identity = tracing::field::Empty))]
    pub async fn create(
        &self,
        instance: &mut ResourceInstance,
        desired: &Fragment,
    ) -> Result<Fragment, ReconcileError> {
        if instance.phase != Phase::Absent {
            return Err(ReconcileError::InvalidPhase {
                phase: instance.phase,
                operation: LifecycleOp::Create,
            });
        }

        let identity = R::identity(desired)?;
        record_identity(&identity);
        let record = R::expand(&identity, desired)?;
        debug!(%identity, ?record, "Create payload");

        instance.begin(Phase::Creating, &identity);
        let (api, id, interval) = (&self.api, &identity, self.timeouts.poll_interval);
        let work = async move {
            let existing = api
                .get(id)
                .await
                .map_err(|e| remote_error(id, LifecycleOp::Create, e))?;
            if existing.is_some() {
                return Err(ReconcileError::AlreadyExists {
                    identity: id.render(),
                });
            }
            let submitted = api
                .create(id, record)
                .await
                .map_err(|e| remote_error(id, LifecycleOp::Create, e))?;
            wait_for_completion::<R, A>(api, submitted, interval)
                .await
                .map_err(|e| remote_error(id, LifecycleOp::Create, e))
        };

        if let Err(err) = self.bounded(LifecycleOp::Create, &identity, work).await {
            warn!(%identity, error = %err, "Create failed");
            instance.settle(&identity, &err, Phase::Absent);
            return Err(err);
        }

        info!(%identity, "Created");
        instance.phase = Phase::Present;

        match self.read(instance).await? {
            ReadOutcome::Present(state) => Ok(state),
            ReadOutcome::Gone => Err(ReconcileError::NotFound {
                identity,
                operation: LifecycleOp::Create,
            }),
        }
    }

    /// Refreshes the instance from the remote record.
    ///
    /// Works from any phase that has an identity, so it also settles an instance whose last
    /// operation was cancelled.
    #[instrument(skip_all, fields(kind = R::KIND, identity = tracing::field::Empty))]
    pub async fn read(&self, instance: &mut ResourceInstance) -> Result<ReadOutcome, ReconcileError> {
        let identity = instance.tracked(LifecycleOp::Read)?;
        record_identity(&identity);
        let settled = instance.phase;
        instance.begin(Phase::Reading, &identity);

        let (api, id) = (&self.api, &identity);
        let work = async move {
            match api.get(id).await {
                Ok(record) => Ok(record),
                Err(ApiError::NotFound) => Ok(None),
                Err(e) => Err(remote_error(id, LifecycleOp::Read, e)),
            }
        };

        let record = match self.bounded(LifecycleOp::Read, &identity, work).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(%identity, "Gone, dropping from state");
                instance.forget();
                return Ok(ReadOutcome::Gone);
            }
            Err(err) => {
                warn!(%identity, error = %err, "Read failed");
                let fallback = match settled {
                    Phase::Reading => Phase::Present,
                    phase => phase,
                };
                instance.settle(&identity, &err, fallback);
                return Err(err);
            }
        };

        instance.phase = Phase::Present;
        let state = R::flatten(&identity, &record)?;
        debug!(%identity, ?state, "Read");
        instance.state = Some(state.clone());
        Ok(ReadOutcome::Present(state))
    }

    /// Sends the fields of `desired` that differ from the last read state.
    ///
    /// The prior state is the remote record as flattened by the last read. It is diffed as is
    /// and never re-validated, so a remote value the local checks would refuse can still be
    /// corrected.
    #[instrument(skip_all, fields(kind = R::KIND, identity = tracing::field::Empty))]
    pub async fn update(
        &self,
        instance: &mut ResourceInstance,
        desired: &Fragment,
    ) -> Result<Fragment, ReconcileError> {
        let identity = instance.tracked(LifecycleOp::Update)?;
        record_identity(&identity);

        let target = R::identity(desired)?;
        if target.key() != identity.key() {
            return Err(ReconcileError::IncompatibleCombination {
                identity,
                field: "id".to_string(),
                reason: format!(
                    "changing the identity to {:?} requires replacing the resource",
                    target.render()
                ),
            });
        }

        let desired_state = R::normalize(&identity, desired)?;
        let prior_state = instance.state.clone().unwrap_or_default();

        let changes = diff(&prior_state, &desired_state);
        if changes.is_empty() {
            debug!(%identity, "No changes");
            return Ok(prior_state);
        }
        let Some(patch) = R::expand_patch(&identity, desired, &changes)? else {
            debug!(%identity, "Changes are computed-only");
            return Ok(prior_state);
        };
        info!(%identity, changed = ?changes.iter().collect::<Vec<_>>(), "Updating");
        debug!(%identity, ?patch, "Update payload");

        instance.begin(Phase::Updating, &identity);
        let (api, id, interval) = (&self.api, &identity, self.timeouts.poll_interval);
        let work = async move {
            let submitted = api
                .update(id, patch)
                .await
                .map_err(|e| remote_error(id, LifecycleOp::Update, e))?;
            wait_for_completion::<R, A>(api, submitted, interval)
                .await
                .map_err(|e| remote_error(id, LifecycleOp::Update, e))
        };

        if let Err(err) = self.bounded(LifecycleOp::Update, &identity, work).await {
            warn!(%identity, error = %err, "Update failed");
            instance.settle(&identity, &err, Phase::Present);
            return Err(err);
        }

        info!(%identity, "Updated");
        instance.phase = Phase::Present;
        match self.read(instance).await? {
            ReadOutcome::Present(state) => Ok(state),
            ReadOutcome::Gone => Err(ReconcileError::NotFound {
                identity,
                operation: LifecycleOp::Update,
            }),
        }
    }

    /// Deletes the resource. A record that is already gone counts as deleted.
    #[instrument(skip_all, fields(kind = R::KIND, identity = tracing::field::Empty))]
    pub async fn delete(&self, instance: &mut ResourceInstance) -> Result<(), ReconcileError> {
        if instance.phase == Phase::Absent {
            debug!("Already absent");
            return Ok(());
        }
        let identity = instance.tracked(LifecycleOp::Delete)?;
        record_identity(&identity);
        instance.begin(Phase::Deleting, &identity);

        let (api, id, interval) = (&self.api, &identity, self.timeouts.poll_interval);
        let work = async move {
            let submitted = match api.delete(id).await {
                Ok(submitted) => submitted,
                Err(ApiError::NotFound) => return Ok(()),
                Err(e) => return Err(remote_error(id, LifecycleOp::Delete, e)),
            };
            match wait_for_completion::<R, A>(api, submitted, interval).await {
                Ok(()) | Err(ApiError::NotFound) => Ok(()),
                Err(e) => Err(remote_error(id, LifecycleOp::Delete, e)),
            }
        };

        match self.bounded(LifecycleOp::Delete, &identity, work).await {
            Ok(()) => {
                info!(%identity, "Deleted");
                instance.forget();
                Ok(())
            }
            Err(err) => {
                warn!(%identity, error = %err, "Delete failed");
                instance.settle(&identity, &err, Phase::Present);
                Err(err)
            }
        }
    }

    /// Starts tracking an existing resource from its canonical identity.
    #[instrument(skip(self), fields(kind = R::KIND))]
    pub async fn import(&self, canonical: &str) -> Result<ResourceInstance, ReconcileError> {
        let identity = R::template().parse(canonical)?;
        let mut instance = ResourceInstance::tracking(identity.clone());
        match self.read(&mut instance).await? {
            ReadOutcome::Present(_) => {
                info!(%identity, "Imported");
                Ok(instance)
            }
            ReadOutcome::Gone => Err(ReconcileError::NotFound {
                identity,
                operation: LifecycleOp::Read,
            }),
        }
    }

    async fn bounded<T, F>(
        &self,
        operation: LifecycleOp,
        identity: &ResourceIdentity,
        work: F,
    ) -> Result<T, ReconcileError>
    where
        F: Future<Output = Result<T, ReconcileError>>,
    {
        let budget = self.timeouts.for_op(operation);
        match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => {
                let observed = self.observe(identity).await;
                warn!(%identity, %operation, ?budget, %observed, "Timed out");
                Err(ReconcileError::OperationTimeout {
                    identity: identity.clone(),
                    operation,
                    budget,
                    observed,
                })
            }
        }
    }

    /// Final state check after an abandoned wait.
    async fn observe(&self, identity: &ResourceIdentity) -> Observed {
        match tokio::time::timeout(self.timeouts.read, self.api.get(identity)).await {
            Ok(Ok(Some(_))) => Observed::Present,
            Ok(Ok(None)) | Ok(Err(ApiError::NotFound)) => Observed::Absent,
            _ => Observed::Unknown,
        }
    }
}

fn record_identity(identity: &ResourceIdentity) {
    tracing::Span::current().record("identity", tracing::field::display(identity));
}

fn remote_error(identity: &ResourceIdentity, operation: LifecycleOp, err: ApiError) -> ReconcileError {
    match err {
        ApiError::NotFound => ReconcileError::NotFound {
            identity: identity.clone(),
            operation,
        },
        ApiError::Conflict(_) if operation == LifecycleOp::Create => ReconcileError::AlreadyExists {
            identity: identity.render(),
        },
        other => ReconcileError::RemoteFailure {
            identity: identity.clone(),
            operation,
            message: other.to_string(),
        },
    }
}
