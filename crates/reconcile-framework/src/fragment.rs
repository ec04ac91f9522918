//! # Desired-State Fragments
//!
//! A fragment is a `serde_json` object: the tree of named fields a user declares for one
//! resource. Variant kinds decode their configuration blocks out of it with
//! [`decode_block`], which applies declared defaults and rejects unknown fields, and write
//! them back with [`encode_block`].
//!
//! [`diff`] compares two fragments field by field at the top level; the controller uses the
//! resulting [`ChangeSet`] to build a partial update.

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub type Fragment = Map<String, Value>;

/// Decodes a typed configuration block. Serde errors become `InvalidField` at `field`.
pub fn decode_block<T: DeserializeOwned>(field: &str, value: &Value) -> Result<T, CodecError> {
    T::deserialize(value).map_err(|e| CodecError::invalid(field, e.to_string()))
}

pub fn encode_block<T: Serialize>(field: &str, block: &T) -> Result<Value, CodecError> {
    serde_json::to_value(block).map_err(|e| CodecError::invalid(field, e.to_string()))
}

/// Decodes every entry of a kind's list, tagging errors with the entry index.
pub fn decode_each<T: DeserializeOwned>(kind: &str, items: &[Value]) -> Result<Vec<T>, CodecError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_block(&format!("{kind}.{index}"), item))
        .collect()
}

/// Reads a required top-level string field.
pub fn required_str<'a>(fragment: &'a Fragment, field: &str) -> Result<&'a str, CodecError> {
    match fragment.get(field) {
        Some(Value::String(value)) => Ok(value),
        None | Some(Value::Null) => Err(CodecError::invalid(field, "is required")),
        Some(_) => Err(CodecError::invalid(field, "expected a string")),
    }
}

/// The set of top-level fields whose desired value differs from the last known one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(BTreeSet<String>);

impl ChangeSet {
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ChangeSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Top-level field diff. An absent field and an explicit `null` compare equal; an empty
/// list does not equal an absent field.
pub fn diff(prior: &Fragment, desired: &Fragment) -> ChangeSet {
    prior
        .keys()
        .chain(desired.keys())
        .filter(|field| {
            let before = prior.get(*field).unwrap_or(&Value::Null);
            let after = desired.get(*field).unwrap_or(&Value::Null);
            before != after
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Rewrite {
        source_pattern: String,
        #[serde(default)]
        preserve_unmatched_path: bool,
    }

    fn fragment(value: Value) -> Fragment {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_decode_applies_defaults() {
        let block: Rewrite = decode_block("rewrite", &json!({ "source_pattern": "/" })).unwrap();
        assert_eq!(
            block,
            Rewrite {
                source_pattern: "/".into(),
                preserve_unmatched_path: false
            }
        );
        assert_eq!(
            encode_block("rewrite", &block).unwrap(),
            json!({ "source_pattern": "/", "preserve_unmatched_path": false })
        );
    }

    #[test]
    fn test_decode_errors_name_the_field() {
        let err = decode_each::<Rewrite>("rewrite", &[json!({ "source_pattern": "/" }), json!({})])
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidField { ref field, .. } if field == "rewrite.1"));

        let unknown = decode_block::<Rewrite>("rewrite", &json!({ "source_pattern": "/", "x": 1 }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_required_str() {
        let desired = fragment(json!({ "name": "r1", "order": 1 }));
        assert_eq!(required_str(&desired, "name").unwrap(), "r1");
        assert!(required_str(&desired, "order").is_err());
        assert!(required_str(&desired, "missing").is_err());
    }

    #[test]
    fn test_diff_reports_changed_fields_only() {
        let prior = fragment(json!({ "order": 1, "actions": { "a": [] }, "conditions": null }));
        let desired = fragment(json!({ "order": 2, "actions": { "a": [] } }));
        let changes = diff(&prior, &desired);
        assert_eq!(changes.iter().collect::<Vec<_>>(), ["order"]);

        let desired = fragment(json!({ "order": 1, "actions": { "a": [] }, "conditions": [] }));
        assert!(diff(&prior, &desired).contains("conditions"));
        assert!(diff(&prior, &prior).is_empty());
    }
}
