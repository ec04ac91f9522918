//! # Mock Management API
//!
//! [`MockApi<R>`] implements [`ManagementApi<R>`] entirely in memory from a queue of
//! expectations. It is the tool for testing controller logic around the remote boundary:
//! error injection is trivial, every call is recorded, and a test can assert that a
//! validation failure happened before *any* remote call.
//!
//! | Feature | MockApi | PlaneActor |
//! |---------|---------|------------|
//! | **State** | None (scripted answers) | Real record store |
//! | **Determinism** | Fully scripted | Sequential actor |
//! | **Error Injection** | Any `ApiError` per call | `PlaneOptions::fail_operations` |
//! | **Use Case** | Controller edge cases | End-to-end lifecycles |
//!
//! ```rust,ignore
//! let mut mock = MockApi::<Rule>::new();
//! mock.expect_get(&id).return_ok(None);
//! mock.expect_create(&id).return_ok(Submitted::Completed);
//! mock.expect_get(&id).return_ok(Some(record));
//!
//! let controller = LifecycleController::new(mock.clone(), Timeouts::default());
//! controller.create(&mut instance, &desired).await?;
//! mock.verify();
//! ```
//!
//! Expectations are consumed in order. A call that does not match the next expectation (or
//! arrives when none is left) panics, failing the test.

use crate::api::{ApiError, ManagementApi, OperationId, OperationStatus, Submitted};
use crate::identity::ResourceIdentity;
use crate::resource::ManagedResource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// RECORDED CALLS
// =============================================================================

/// A call received by the mock, in arrival order.
pub enum ApiCall<R: ManagedResource> {
    Get(ResourceIdentity),
    Create(ResourceIdentity, R::Record),
    Update(ResourceIdentity, R::Patch),
    Delete(ResourceIdentity),
    Poll(OperationId),
}

impl<R: ManagedResource> ApiCall<R> {
    pub fn name(&self) -> &'static str {
        match self {
            ApiCall::Get(_) => "get",
            ApiCall::Create(..) => "create",
            ApiCall::Update(..) => "update",
            ApiCall::Delete(_) => "delete",
            ApiCall::Poll(_) => "poll",
        }
    }
}

impl<R: ManagedResource> Clone for ApiCall<R> {
    fn clone(&self) -> Self {
        match self {
            ApiCall::Get(id) => ApiCall::Get(id.clone()),
            ApiCall::Create(id, record) => ApiCall::Create(id.clone(), record.clone()),
            ApiCall::Update(id, patch) => ApiCall::Update(id.clone(), patch.clone()),
            ApiCall::Delete(id) => ApiCall::Delete(id.clone()),
            ApiCall::Poll(op) => ApiCall::Poll(op.clone()),
        }
    }
}

impl<R: ManagedResource> fmt::Debug for ApiCall<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiCall::Get(id) => write!(f, "get({})", id.render()),
            ApiCall::Create(id, record) => write!(f, "create({}, {record:?})", id.render()),
            ApiCall::Update(id, patch) => write!(f, "update({}, {patch:?})", id.render()),
            ApiCall::Delete(id) => write!(f, "delete({})", id.render()),
            ApiCall::Poll(op) => write!(f, "poll({op})"),
        }
    }
}

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

enum Expectation<R: ManagedResource> {
    Get {
        key: String,
        response: Result<Option<R::Record>, ApiError>,
    },
    Create {
        key: String,
        response: Result<Submitted, ApiError>,
    },
    Update {
        key: String,
        response: Result<Submitted, ApiError>,
    },
    Delete {
        key: String,
        response: Result<Submitted, ApiError>,
    },
    Poll {
        operation: OperationId,
        response: Result<OperationStatus, ApiError>,
    },
}

impl<R: ManagedResource> Expectation<R> {
    fn describe(&self) -> String {
        match self {
            Expectation::Get { key, .. } => format!("get({key})"),
            Expectation::Create { key, .. } => format!("create({key})"),
            Expectation::Update { key, .. } => format!("update({key})"),
            Expectation::Delete { key, .. } => format!("delete({key})"),
            Expectation::Poll { operation, .. } => format!("poll({operation})"),
        }
    }
}

type Queue<R> = Arc<Mutex<VecDeque<Expectation<R>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct MockApi<R: ManagedResource> {
    expectations: Queue<R>,
    calls: Arc<Mutex<Vec<ApiCall<R>>>>,
}

impl<R: ManagedResource> Clone for MockApi<R> {
    fn clone(&self) -> Self {
        Self {
            expectations: self.expectations.clone(),
            calls: self.calls.clone(),
        }
    }
}

impl<R: ManagedResource> Default for MockApi<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ManagedResource> MockApi<R> {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_get(&mut self, identity: &ResourceIdentity) -> GetExpectationBuilder<R> {
        GetExpectationBuilder {
            key: identity.key(),
            expectations: self.expectations.clone(),
        }
    }

    pub fn expect_create(&mut self, identity: &ResourceIdentity) -> SubmitExpectationBuilder<R> {
        self.submit(identity, SubmitKind::Create)
    }

    pub fn expect_update(&mut self, identity: &ResourceIdentity) -> SubmitExpectationBuilder<R> {
        self.submit(identity, SubmitKind::Update)
    }

    pub fn expect_delete(&mut self, identity: &ResourceIdentity) -> SubmitExpectationBuilder<R> {
        self.submit(identity, SubmitKind::Delete)
    }

    pub fn expect_poll(&mut self, operation: &str) -> PollExpectationBuilder<R> {
        PollExpectationBuilder {
            operation: OperationId(operation.to_string()),
            expectations: self.expectations.clone(),
        }
    }

    fn submit(&mut self, identity: &ResourceIdentity, kind: SubmitKind) -> SubmitExpectationBuilder<R> {
        SubmitExpectationBuilder {
            key: identity.key(),
            kind,
            expectations: self.expectations.clone(),
        }
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<ApiCall<R>> {
        lock(&self.calls).clone()
    }

    /// Panics unless every expectation has been consumed.
    pub fn verify(&self) {
        let exps = lock(&self.expectations);
        if !exps.is_empty() {
            let remaining: Vec<_> = exps.iter().map(Expectation::describe).collect();
            panic!(
                "Not all expectations were met. {} remaining: {}",
                remaining.len(),
                remaining.join(", ")
            );
        }
    }

    fn next(&self, call: ApiCall<R>) -> (Expectation<R>, String) {
        let described = format!("{call:?}");
        lock(&self.calls).push(call);
        let expectation = lock(&self.expectations).pop_front();
        match expectation {
            Some(expectation) => (expectation, described),
            None => panic!("Unexpected request {described}: no expectations left"),
        }
    }
}

fn mismatch<R: ManagedResource>(got: &str, expected: &Expectation<R>) -> ! {
    panic!(
        "Unexpected request or expectation mismatch: got {got}, expected {}",
        expected.describe()
    )
}

#[async_trait]
impl<R: ManagedResource> ManagementApi<R> for MockApi<R> {
    async fn get(&self, identity: &ResourceIdentity) -> Result<Option<R::Record>, ApiError> {
        match self.next(ApiCall::Get(identity.clone())) {
            (Expectation::Get { key, response }, _) if key == identity.key() => response,
            (other, got) => mismatch(&got, &other),
        }
    }

    async fn create(
        &self,
        identity: &ResourceIdentity,
        record: R::Record,
    ) -> Result<Submitted, ApiError> {
        match self.next(ApiCall::Create(identity.clone(), record)) {
            (Expectation::Create { key, response }, _) if key == identity.key() => response,
            (other, got) => mismatch(&got, &other),
        }
    }

    async fn update(
        &self,
        identity: &ResourceIdentity,
        patch: R::Patch,
    ) -> Result<Submitted, ApiError> {
        match self.next(ApiCall::Update(identity.clone(), patch)) {
            (Expectation::Update { key, response }, _) if key == identity.key() => response,
            (other, got) => mismatch(&got, &other),
        }
    }

    async fn delete(&self, identity: &ResourceIdentity) -> Result<Submitted, ApiError> {
        match self.next(ApiCall::Delete(identity.clone())) {
            (Expectation::Delete { key, response }, _) if key == identity.key() => response,
            (other, got) => mismatch(&got, &other),
        }
    }

    async fn poll(&self, operation: &OperationId) -> Result<OperationStatus, ApiError> {
        match self.next(ApiCall::Poll(operation.clone())) {
            (Expectation::Poll {
                operation: expected,
                response,
            }, _) if expected == *operation => response,
            (other, got) => mismatch(&got, &other),
        }
    }
}

pub struct GetExpectationBuilder<R: ManagedResource> {
    key: String,
    expectations: Queue<R>,
}

impl<R: ManagedResource> GetExpectationBuilder<R> {
    pub fn return_ok(self, record: Option<R::Record>) {
        lock(&self.expectations).push_back(Expectation::Get {
            key: self.key,
            response: Ok(record),
        });
    }

    pub fn return_err(self, error: ApiError) {
        lock(&self.expectations).push_back(Expectation::Get {
            key: self.key,
            response: Err(error),
        });
    }
}

#[derive(Clone, Copy)]
enum SubmitKind {
    Create,
    Update,
    Delete,
}

pub struct SubmitExpectationBuilder<R: ManagedResource> {
    key: String,
    kind: SubmitKind,
    expectations: Queue<R>,
}

impl<R: ManagedResource> SubmitExpectationBuilder<R> {
    pub fn return_ok(self, submitted: Submitted) {
        self.push(Ok(submitted));
    }

    /// Shorthand for an operation accepted under `operation`.
    pub fn return_accepted(self, operation: &str) {
        self.push(Ok(Submitted::Accepted(OperationId(operation.to_string()))));
    }

    pub fn return_err(self, error: ApiError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<Submitted, ApiError>) {
        let key = self.key;
        let expectation = match self.kind {
            SubmitKind::Create => Expectation::Create { key, response },
            SubmitKind::Update => Expectation::Update { key, response },
            SubmitKind::Delete => Expectation::Delete { key, response },
        };
        lock(&self.expectations).push_back(expectation);
    }
}

pub struct PollExpectationBuilder<R: ManagedResource> {
    operation: OperationId,
    expectations: Queue<R>,
}

impl<R: ManagedResource> PollExpectationBuilder<R> {
    pub fn return_ok(self, status: OperationStatus) {
        lock(&self.expectations).push_back(Expectation::Poll {
            operation: self.operation,
            response: Ok(status),
        });
    }

    pub fn return_err(self, error: ApiError) {
        lock(&self.expectations).push_back(Expectation::Poll {
            operation: self.operation,
            response: Err(error),
        });
    }
}
