//! # In-Memory Management Plane
//!
//! A [`PlaneActor`] stands in for a remote management plane. It owns a store of records keyed
//! by case-folded canonical identity and processes [`PlaneRequest`]s one at a time, so the
//! store needs no lock.
//!
//! Mutations behave like long-running operations: a create, update or delete is accepted
//! with an operation id and only takes effect once it has been polled
//! [`PlaneOptions::polls_to_complete`] times. With `polls_to_complete == 0` the mutation is
//! applied immediately and answered with `Submitted::Completed`.
//!
//! An operation is not tied to its poller. One that nobody has polled for
//! [`PlaneOptions::operation_ttl`] completes on its own when the plane handles its next request.
//! An insert that has not been applied yet does not count as an existing record: a new create
//! at the same identity supersedes it.
//!
//! ```rust,ignore
//! let (actor, client) = PlaneActor::<Rule>::new(32, PlaneOptions::default());
//! let handle = tokio::spawn(actor.run());
//! let controller = LifecycleController::new(client, Timeouts::default());
//! ```

use crate::api::{ApiError, OperationId, OperationStatus, Submitted};
use crate::client::PlaneClient;
use crate::identity::ResourceIdentity;
use crate::message::PlaneRequest;
use crate::resource::ManagedResource;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A resource kind the in-memory plane can host.
pub trait PlaneResource: ManagedResource {
    /// Applies a partial update to a stored record.
    fn apply_patch(record: &mut Self::Record, patch: Self::Patch);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneOptions {
    /// Number of polls after which an accepted operation completes.
    pub polls_to_complete: u32,
    /// Complete every operation with a failure instead of applying it.
    pub fail_operations: bool,
    /// Idle time after which an unpolled operation completes without its poller.
    pub operation_ttl: Duration,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            polls_to_complete: 1,
            fail_operations: false,
            operation_ttl: Duration::from_secs(60),
        }
    }
}

enum Effect<R: ManagedResource> {
    Insert(R::Record),
    Patch(R::Patch),
    Remove,
}

struct PendingOperation<R: ManagedResource> {
    identity: ResourceIdentity,
    effect: Effect<R>,
    remaining: u32,
    sequence: u64,
    touched: Instant,
}

pub struct PlaneActor<R: PlaneResource> {
    receiver: mpsc::Receiver<PlaneRequest<R>>,
    store: HashMap<String, R::Record>,
    pending: HashMap<OperationId, PendingOperation<R>>,
    options: PlaneOptions,
    next_operation: u64,
}

impl<R: PlaneResource> PlaneActor<R> {
    /// Creates the actor and its client. `buffer_size` bounds the request channel.
    pub fn new(buffer_size: usize, options: PlaneOptions) -> (Self, PlaneClient<R>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            store: HashMap::new(),
            pending: HashMap::new(),
            options,
            next_operation: 1,
        };
        (actor, PlaneClient::new(sender))
    }

    /// Processes requests until every client has been dropped.
    pub async fn run(mut self) {
        info!(kind = R::KIND, "Plane started");

        while let Some(msg) = self.receiver.recv().await {
            self.complete_abandoned();
            match msg {
                PlaneRequest::Get {
                    identity,
                    respond_to,
                } => {
                    let record = self.store.get(&identity.key()).cloned();
                    debug!(kind = R::KIND, %identity, found = record.is_some(), "Get");
                    let _ = respond_to.send(Ok(record));
                }
                PlaneRequest::Create {
                    identity,
                    record,
                    respond_to,
                } => {
                    let response = if self.exists(&identity) {
                        warn!(kind = R::KIND, %identity, "Create conflicts with an existing record");
                        Err(ApiError::Conflict(format!("{} already exists", identity.render())))
                    } else {
                        self.supersede_inserts(&identity);
                        self.submit(identity, Effect::Insert(record))
                    };
                    let _ = respond_to.send(response);
                }
                PlaneRequest::Update {
                    identity,
                    patch,
                    respond_to,
                } => {
                    let response = if self.exists(&identity) {
                        self.submit(identity, Effect::Patch(patch))
                    } else {
                        warn!(kind = R::KIND, %identity, "Not found");
                        Err(ApiError::NotFound)
                    };
                    let _ = respond_to.send(response);
                }
                PlaneRequest::Delete {
                    identity,
                    respond_to,
                } => {
                    let response = if self.exists(&identity) {
                        self.submit(identity, Effect::Remove)
                    } else {
                        debug!(kind = R::KIND, %identity, "Not found");
                        Err(ApiError::NotFound)
                    };
                    let _ = respond_to.send(response);
                }
                PlaneRequest::Poll {
                    operation,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.poll(operation));
                }
            }
        }

        info!(kind = R::KIND, size = self.store.len(), "Shutdown");
    }

    fn exists(&self, identity: &ResourceIdentity) -> bool {
        self.store.contains_key(&identity.key())
    }

    fn supersede_inserts(&mut self, identity: &ResourceIdentity) {
        let key = identity.key();
        self.pending.retain(|operation, op| {
            let stale = matches!(op.effect, Effect::Insert(_)) && op.identity.key() == key;
            if stale {
                debug!(kind = R::KIND, %identity, %operation, "Superseded");
            }
            !stale
        });
    }

    /// Applies, in submission order, every operation idle for longer than the TTL.
    fn complete_abandoned(&mut self) {
        let now = Instant::now();
        let ttl = self.options.operation_ttl;
        let mut abandoned: Vec<(u64, OperationId)> = self
            .pending
            .iter()
            .filter(|(_, op)| now.duration_since(op.touched) >= ttl)
            .map(|(operation, op)| (op.sequence, operation.clone()))
            .collect();
        abandoned.sort_by_key(|(sequence, _)| *sequence);

        for (_, operation) in abandoned {
            let Some(pending) = self.pending.remove(&operation) else {
                continue;
            };
            debug!(kind = R::KIND, identity = %pending.identity, %operation, "Completing unpolled operation");
            if let Err(err) = self.complete(pending.identity, pending.effect) {
                warn!(kind = R::KIND, %operation, error = %err, "Unpolled operation failed");
            }
        }
    }

    fn submit(
        &mut self,
        identity: ResourceIdentity,
        effect: Effect<R>,
    ) -> Result<Submitted, ApiError> {
        if self.options.polls_to_complete == 0 {
            return self.complete(identity, effect).map(|()| Submitted::Completed);
        }

        let sequence = self.next_operation;
        let operation = OperationId(format!("op-{sequence}"));
        self.next_operation += 1;
        debug!(kind = R::KIND, %identity, %operation, "Accepted");
        self.pending.insert(
            operation.clone(),
            PendingOperation {
                identity,
                effect,
                remaining: self.options.polls_to_complete,
                sequence,
                touched: Instant::now(),
            },
        );
        Ok(Submitted::Accepted(operation))
    }

    fn poll(&mut self, operation: OperationId) -> Result<OperationStatus, ApiError> {
        let Some(pending) = self.pending.get_mut(&operation) else {
            return Err(ApiError::Failed {
                code: "UnknownOperation".to_string(),
                message: format!("no operation {operation}"),
            });
        };

        pending.remaining = pending.remaining.saturating_sub(1);
        pending.touched = Instant::now();
        if pending.remaining > 0 {
            return Ok(OperationStatus::InProgress);
        }

        let Some(pending) = self.pending.remove(&operation) else {
            return Ok(OperationStatus::InProgress);
        };
        match self.complete(pending.identity, pending.effect) {
            Ok(()) => Ok(OperationStatus::Succeeded),
            Err(ApiError::Failed { message, .. }) => Ok(OperationStatus::Failed(message)),
            Err(other) => Err(other),
        }
    }

    fn complete(&mut self, identity: ResourceIdentity, effect: Effect<R>) -> Result<(), ApiError> {
        if self.options.fail_operations {
            warn!(kind = R::KIND, %identity, "Operation failed");
            return Err(ApiError::Failed {
                code: "OperationFailed".to_string(),
                message: format!("the operation on {} failed", identity.render()),
            });
        }

        let key = identity.key();
        match effect {
            Effect::Insert(record) => {
                self.store.insert(key, record);
                info!(kind = R::KIND, %identity, size = self.store.len(), "Created");
            }
            Effect::Patch(patch) => match self.store.get_mut(&key) {
                Some(record) => {
                    R::apply_patch(record, patch);
                    info!(kind = R::KIND, %identity, "Updated");
                }
                None => return Err(ApiError::NotFound),
            },
            Effect::Remove => {
                if self.store.remove(&key).is_none() {
                    return Err(ApiError::NotFound);
                }
                info!(kind = R::KIND, %identity, size = self.store.len(), "Deleted");
            }
        }
        Ok(())
    }
}
