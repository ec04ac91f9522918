//! # Composite Field Codec
//!
//! Translates a multi-valued, discriminated composite (a rule's `actions` or `conditions`)
//! between its desired-state shape and its wire shape.
//!
//! Desired state groups entries by kind:
//!
//! ```json
//! { "url_redirect_action": [ { ... } ], "request_header_action": [ { ... }, { ... } ] }
//! ```
//!
//! The wire sequence is a flat list of tagged variants. [`expand`] walks the registry in
//! declaration order, so variants of the same kind stay in user order and kinds appear in
//! registry order. [`flatten`] classifies every variant by discriminator and rebuilds the
//! grouped shape with **every** kind present, empty or not.

use crate::error::CodecError;
use crate::registry::{Cardinality, Discriminated, Registry};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Expands a composite block into a wire sequence.
///
/// `None`, `null`, and `{}` expand to an empty sequence.
pub fn expand<W: Discriminated>(
    fragment: Option<&Value>,
    registry: &Registry<W>,
) -> Result<Vec<W>, CodecError> {
    let block = match fragment {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(block)) => block,
        Some(other) => {
            return Err(CodecError::invalid(
                registry.field(),
                format!("expected a block, got {}", type_name(other)),
            ))
        }
    };

    if let Some(unknown) = block.keys().find(|key| registry.lookup(key).is_none()) {
        return Err(CodecError::invalid(
            registry.field(),
            format!("`{unknown}` is not a supported block"),
        ));
    }

    let mut results = Vec::new();
    let mut present = BTreeSet::new();

    for kind in registry.kinds() {
        let items = match block.get(kind.config_name()) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(CodecError::invalid(
                    format!("{}.{}", registry.field(), kind.config_name()),
                    format!("expected a list, got {}", type_name(other)),
                ))
            }
        };
        if items.is_empty() {
            continue;
        }

        let expanded = kind
            .expand(items)
            .map_err(|e| e.within(registry.field()))?;

        if kind.cardinality() == Cardinality::Singleton && expanded.len() > 1 {
            return Err(CodecError::CardinalityViolation {
                field: registry.field(),
                kind: kind.config_name(),
                count: expanded.len(),
            });
        }

        if !expanded.is_empty() {
            present.insert(kind.config_name());
        }
        results.extend(expanded);
    }

    if results.len() > registry.ceiling() {
        return Err(CodecError::CeilingExceeded {
            field: registry.field(),
            ceiling: registry.ceiling(),
            count: results.len(),
        });
    }

    for group in registry.exclusive_groups() {
        let clashing: Vec<_> = group.iter().filter(|name| present.contains(*name)).collect();
        if clashing.len() > 1 {
            let names = clashing
                .iter()
                .map(|name| format!("`{name}`"))
                .collect::<Vec<_>>()
                .join(" and ");
            return Err(CodecError::incompatible(
                registry.field(),
                format!("{names} cannot be used together"),
            ));
        }
    }

    debug!(field = registry.field(), count = results.len(), "expanded");
    Ok(results)
}

/// Flattens a wire sequence into a composite block with one list per registered kind.
///
/// An unrecognized discriminator fails the whole call; nothing is dropped.
pub fn flatten<W: Discriminated>(
    sequence: &[W],
    registry: &Registry<W>,
) -> Result<Value, CodecError> {
    let mut buckets: Vec<Vec<Value>> = vec![Vec::new(); registry.len()];

    for variant in sequence {
        let (index, kind) = registry.classify_indexed(variant)?;
        let flattened = kind
            .flatten(variant)
            .map_err(|e| e.within(registry.field()))?;
        buckets[index].push(flattened);
    }

    let block: Map<String, Value> = registry
        .kinds()
        .zip(buckets)
        .map(|(kind, items)| (kind.config_name().to_string(), Value::Array(items)))
        .collect();

    Ok(Value::Object(block))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a block",
    }
}
