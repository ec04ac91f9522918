//! Wire records and desired-state mappings for the Front Door resources.
//!
//! - [`actions`] and [`conditions`] hold the two composite fields of a delivery rule: the
//!   closed wire enums, their typed configuration blocks, and the registries tying the two
//!   together.
//! - [`rule`] and [`tags`] hold the records the management plane stores.

pub mod actions;
pub mod conditions;
pub mod rule;
pub mod tags;

pub use actions::{action_registry, DeliveryRuleAction};
pub use conditions::{condition_registry, DeliveryRuleCondition};
pub use rule::{MatchBehavior, RulePatch, RuleRecord};
pub use tags::TagsRecord;

use reconcile_framework::fragment::{decode_block, required_str};
use reconcile_framework::{CodecError, Fragment, IdentityTemplate, ReconcileError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes and converts every entry of one kind's list. Errors are prefixed with
/// `<kind>.<index>`.
pub(crate) fn expand_blocks<C, W>(
    kind: &str,
    items: &[Value],
    convert: impl Fn(C) -> Result<W, CodecError>,
) -> Result<Vec<W>, CodecError>
where
    C: DeserializeOwned,
{
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let path = format!("{kind}.{index}");
            let block = decode_block(&path, item)?;
            convert(block).map_err(|e| e.within(&path))
        })
        .collect()
}

pub(crate) fn not_empty(field: &str, value: &str) -> Result<(), CodecError> {
    if value.trim().is_empty() {
        return Err(CodecError::invalid(field, "may not be empty"));
    }
    Ok(())
}

/// Reads the string field an identity is derived from. A missing or mistyped field is
/// reported under that field's name.
pub(crate) fn identity_field<'a>(
    desired: &'a Fragment,
    field: &str,
    expected: &'static IdentityTemplate,
) -> Result<&'a str, ReconcileError> {
    required_str(desired, field).map_err(|err| {
        let reason = match err {
            CodecError::InvalidField { reason, .. } => reason,
            other => other.to_string(),
        };
        ReconcileError::MalformedIdentity {
            expected: expected.name(),
            input: field.to_string(),
            reason,
        }
    })
}

/// A flatten function was handed a variant of another kind.
pub(crate) fn wrong_kind(kind: &str, discriminator: &str) -> CodecError {
    CodecError::invalid(kind, format!("cannot flatten a `{discriminator}` variant"))
}

/// Rejects top-level fields the resource does not declare.
pub(crate) fn reject_unknown_fields(
    desired: &Fragment,
    declared: &[&str],
) -> Result<(), CodecError> {
    match desired.keys().find(|field| !declared.contains(&field.as_str())) {
        Some(field) => Err(CodecError::invalid(field.as_str(), "is not a supported field")),
        None => Ok(()),
    }
}
