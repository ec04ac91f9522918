//! # Reconciliation Errors
//!
//! This module defines the error taxonomy shared by every component of the engine.
//!
//! Two layers exist:
//!
//! - [`CodecError`] is raised by the pure, identity-agnostic parts (registry and codec).
//! - [`ReconcileError`] is what callers of the controller see. Every variant names the
//!   resource identity it concerns; codec failures are lifted into it with
//!   [`ReconcileError::from_codec`] (or the [`AtIdentity`] helper) once the identity is known.

use crate::identity::ResourceIdentity;
use std::fmt;
use std::time::Duration;

/// The lifecycle operation that was in flight when an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            LifecycleOp::Create => "creation",
            LifecycleOp::Read => "retrieval",
            LifecycleOp::Update => "update",
            LifecycleOp::Delete => "deletion",
        };
        f.write_str(verb)
    }
}

/// What a final state check found after an operation was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    Present,
    Absent,
    Unknown,
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Observed::Present => "resource is present",
            Observed::Absent => "resource is absent",
            Observed::Unknown => "state could not be determined",
        };
        f.write_str(state)
    }
}

/// Errors raised while building a registry. These indicate a programming error in the
/// kind catalog and surface on first access to the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("variant kind `{0}` is registered more than once")]
    DuplicateName(&'static str),
    #[error("discriminator `{0}` is registered more than once")]
    DuplicateDiscriminator(&'static str),
    #[error("combination rule references unknown variant kind `{0}`")]
    UnknownKind(&'static str),
}

/// Errors produced by the composite field codec and the variant kinds it drives.
///
/// These are detected locally, before any call to the management plane.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("the `{kind}` block may only be specified once in the `{field}` block, got {count}")]
    CardinalityViolation {
        field: &'static str,
        kind: &'static str,
        count: usize,
    },

    #[error("the `{field}` block may only contain up to {ceiling} entries, got {count}")]
    CeilingExceeded {
        field: &'static str,
        ceiling: usize,
        count: usize,
    },

    #[error("`{field}`: {reason}")]
    IncompatibleCombination { field: String, reason: String },

    #[error("`{field}`: unrecognized variant with discriminator `{discriminator}`")]
    UnrecognizedVariant {
        field: &'static str,
        discriminator: String,
    },

    #[error("`{field}`: {reason}")]
    InvalidField { field: String, reason: String },
}

impl CodecError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn incompatible(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CodecError::IncompatibleCombination {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Prefixes the field path, e.g. `url_redirect_action.0` + `query_string`.
    pub fn within(self, parent: &str) -> Self {
        match self {
            CodecError::InvalidField { field, reason } => CodecError::InvalidField {
                field: format!("{parent}.{field}"),
                reason,
            },
            CodecError::IncompatibleCombination { field, reason } => {
                CodecError::IncompatibleCombination {
                    field: format!("{parent}.{field}"),
                    reason,
                }
            }
            other => other,
        }
    }
}

/// Errors surfaced by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("parsing {expected} ID {input:?}: {reason}")]
    MalformedIdentity {
        expected: &'static str,
        input: String,
        reason: String,
    },

    #[error(
        "a resource with the ID {identity:?} already exists - to be managed via this tool \
         this resource needs to be imported into the state"
    )]
    AlreadyExists { identity: String },

    #[error("{identity} was not found during {operation}")]
    NotFound {
        identity: ResourceIdentity,
        operation: LifecycleOp,
    },

    #[error("{identity}: the `{kind}` block may only be specified once in `{field}`, got {count}")]
    CardinalityViolation {
        identity: ResourceIdentity,
        field: &'static str,
        kind: &'static str,
        count: usize,
    },

    #[error("{identity}: `{field}` may only contain up to {ceiling} entries, got {count}")]
    CeilingExceeded {
        identity: ResourceIdentity,
        field: &'static str,
        ceiling: usize,
        count: usize,
    },

    #[error("{identity}: `{field}`: {reason}")]
    IncompatibleCombination {
        identity: ResourceIdentity,
        field: String,
        reason: String,
    },

    #[error("{identity}: `{field}` contains an unrecognized variant `{discriminator}`")]
    UnrecognizedVariant {
        identity: ResourceIdentity,
        field: &'static str,
        discriminator: String,
    },

    #[error("{identity}: `{field}`: {reason}")]
    InvalidField {
        identity: ResourceIdentity,
        field: String,
        reason: String,
    },

    #[error("timed out after {budget:?} waiting for the {operation} of {identity} ({observed})")]
    OperationTimeout {
        identity: ResourceIdentity,
        operation: LifecycleOp,
        budget: Duration,
        observed: Observed,
    },

    #[error("{operation} of {identity} failed: {message}")]
    RemoteFailure {
        identity: ResourceIdentity,
        operation: LifecycleOp,
        message: String,
    },

    #[error("cannot run {operation} while the resource is {phase}")]
    InvalidPhase {
        phase: crate::controller::Phase,
        operation: LifecycleOp,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ReconcileError {
    /// Attaches the resource identity to a codec error.
    pub fn from_codec(identity: &ResourceIdentity, err: CodecError) -> Self {
        let identity = identity.clone();
        match err {
            CodecError::CardinalityViolation { field, kind, count } => {
                ReconcileError::CardinalityViolation {
                    identity,
                    field,
                    kind,
                    count,
                }
            }
            CodecError::CeilingExceeded {
                field,
                ceiling,
                count,
            } => ReconcileError::CeilingExceeded {
                identity,
                field,
                ceiling,
                count,
            },
            CodecError::IncompatibleCombination { field, reason } => {
                ReconcileError::IncompatibleCombination {
                    identity,
                    field,
                    reason,
                }
            }
            CodecError::UnrecognizedVariant {
                field,
                discriminator,
            } => ReconcileError::UnrecognizedVariant {
                identity,
                field,
                discriminator,
            },
            CodecError::InvalidField { field, reason } => ReconcileError::InvalidField {
                identity,
                field,
                reason,
            },
        }
    }

    /// True when the error was raised locally, before any remote call.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            ReconcileError::NotFound { .. }
                | ReconcileError::AlreadyExists { .. }
                | ReconcileError::OperationTimeout { .. }
                | ReconcileError::RemoteFailure { .. }
        )
    }
}

/// Lifts `Result<T, CodecError>` into `Result<T, ReconcileError>` for a known identity.
pub trait AtIdentity<T> {
    fn at(self, identity: &ResourceIdentity) -> Result<T, ReconcileError>;
}

impl<T> AtIdentity<T> for Result<T, CodecError> {
    fn at(self, identity: &ResourceIdentity) -> Result<T, ReconcileError> {
        self.map_err(|e| ReconcileError::from_codec(identity, e))
    }
}
