//! # Identity & Addressing
//!
//! Structured resource identifiers and their canonical string form:
//!
//! ```text
//! /subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P/ruleSets/RS/rules/R1
//! ```
//!
//! An [`IdentityTemplate`] describes the expected shape for one resource kind as an ordered
//! list of keyword/value segments. Keywords (and fixed values such as the provider
//! namespace) match case-insensitively on parse; the casing the caller supplied is kept and
//! reproduced on render, so `render(parse(x)) == x` for every valid `x`.
//!
//! Identities are immutable. A child identity is derived from its parent plus a leaf name
//! with [`IdentityTemplate::derive_child`]; the parent is recovered with
//! [`ResourceIdentity::parent`].

use crate::error::ReconcileError;
use serde::{Serialize, Serializer};
use std::fmt;

const SEPARATOR: char = '/';

/// One position in an identity template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentSpec {
    /// `/<keyword>/<any value>`
    Named(&'static str),
    /// `/<keyword>/<fixed value>`, e.g. `/providers/Microsoft.Cdn`.
    Fixed(&'static str, &'static str),
}

impl SegmentSpec {
    pub fn keyword(&self) -> &'static str {
        match self {
            SegmentSpec::Named(keyword) | SegmentSpec::Fixed(keyword, _) => keyword,
        }
    }
}

/// The expected layout of one resource kind's identity.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct IdentityTemplate {
    name: &'static str,
    segments: &'static [SegmentSpec],
}

/// A keyword/value pair as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub keyword: String,
    pub value: String,
}

/// A parsed or derived resource identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    template: &'static IdentityTemplate,
    segments: Vec<Segment>,
}

impl IdentityTemplate {
    pub const fn new(name: &'static str, segments: &'static [SegmentSpec]) -> Self {
        Self { name, segments }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn segments(&self) -> &'static [SegmentSpec] {
        self.segments
    }

    /// True when `self` is a strict prefix of `child`.
    pub fn is_parent_of(&self, child: &IdentityTemplate) -> bool {
        child.segments.len() > self.segments.len()
            && child.segments[..self.segments.len()] == *self.segments
    }

    /// Parses a canonical identity string against this template.
    pub fn parse(&'static self, input: &str) -> Result<ResourceIdentity, ReconcileError> {
        let malformed = |reason: String| ReconcileError::MalformedIdentity {
            expected: self.name,
            input: input.to_string(),
            reason,
        };

        let rest = input
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| malformed("expected a leading `/`".to_string()))?;
        let parts: Vec<&str> = rest.split(SEPARATOR).collect();

        if parts.len() != self.segments.len() * 2 {
            return Err(malformed(format!(
                "expected {} segments, got {}",
                self.segments.len() * 2,
                parts.len()
            )));
        }

        let mut segments = Vec::with_capacity(self.segments.len());
        for (spec, pair) in self.segments.iter().zip(parts.chunks(2)) {
            let (keyword, value) = (pair[0], pair[1]);
            if !keyword.eq_ignore_ascii_case(spec.keyword()) {
                return Err(malformed(format!(
                    "expected the segment `{}`, got `{keyword}`",
                    spec.keyword()
                )));
            }
            if value.is_empty() {
                return Err(malformed(format!("the `{}` segment is empty", spec.keyword())));
            }
            if let SegmentSpec::Fixed(_, fixed) = spec {
                if !value.eq_ignore_ascii_case(fixed) {
                    return Err(malformed(format!(
                        "expected `{}` to be `{fixed}`, got `{value}`",
                        spec.keyword()
                    )));
                }
            }
            segments.push(Segment {
                keyword: keyword.to_string(),
                value: value.to_string(),
            });
        }

        Ok(ResourceIdentity {
            template: self,
            segments,
        })
    }

    /// Builds an identity from the values of the template's `Named` segments, in order.
    pub fn build<I, S>(&'static self, values: I) -> Result<ResourceIdentity, ReconcileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(Vec::new(), values.into_iter().map(Into::into).collect(), "")
    }

    /// Derives a child identity whose template is `self` from its parent and a leaf name.
    ///
    /// The leaf name may not contain the `/` separator.
    pub fn derive_child(
        &'static self,
        parent: &ResourceIdentity,
        leaf_name: &str,
    ) -> Result<ResourceIdentity, ReconcileError> {
        self.child_of(parent, [leaf_name])
    }

    /// Like [`derive_child`](Self::derive_child), for templates that extend the parent by
    /// any number of segments. `values` fills the additional `Named` segments.
    pub fn child_of<I, S>(
        &'static self,
        parent: &ResourceIdentity,
        values: I,
    ) -> Result<ResourceIdentity, ReconcileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rendered = parent.render();
        if !parent.template.is_parent_of(self) {
            return Err(ReconcileError::MalformedIdentity {
                expected: self.name,
                input: rendered,
                reason: format!("a {} is not the parent of a {}", parent.template.name, self.name),
            });
        }
        self.extend(
            parent.segments.clone(),
            values.into_iter().map(Into::into).collect(),
            &rendered,
        )
    }

    fn extend(
        &'static self,
        mut segments: Vec<Segment>,
        values: Vec<String>,
        prefix: &str,
    ) -> Result<ResourceIdentity, ReconcileError> {
        let input = format!("{prefix}/{}", values.join("/"));
        let malformed = |reason: String| ReconcileError::MalformedIdentity {
            expected: self.name,
            input: input.clone(),
            reason,
        };

        let mut values = values.into_iter();
        for spec in &self.segments[segments.len()..] {
            let value = match spec {
                SegmentSpec::Fixed(_, fixed) => fixed.to_string(),
                SegmentSpec::Named(keyword) => {
                    let value = values
                        .next()
                        .ok_or_else(|| malformed(format!("missing a value for `{keyword}`")))?;
                    if value.is_empty() {
                        return Err(malformed(format!("the `{keyword}` segment is empty")));
                    }
                    if value.contains(SEPARATOR) {
                        return Err(malformed(format!(
                            "the `{keyword}` value {value:?} may not contain `/`"
                        )));
                    }
                    value
                }
            };
            segments.push(Segment {
                keyword: spec.keyword().to_string(),
                value,
            });
        }

        if let Some(extra) = values.next() {
            return Err(malformed(format!("unexpected value {extra:?}")));
        }

        Ok(ResourceIdentity {
            template: self,
            segments,
        })
    }
}

impl ResourceIdentity {
    pub fn template(&self) -> &'static IdentityTemplate {
        self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The canonical string form, in the casing originally supplied.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .fold(String::new(), |mut out, segment| {
                out.push(SEPARATOR);
                out.push_str(&segment.keyword);
                out.push(SEPARATOR);
                out.push_str(&segment.value);
                out
            })
    }

    /// Case-folded rendering; two identities addressing the same remote resource share it.
    pub fn key(&self) -> String {
        self.render().to_ascii_lowercase()
    }

    /// Looks up a segment value by keyword (case-insensitive).
    pub fn value(&self, keyword: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|segment| segment.keyword.eq_ignore_ascii_case(keyword))
            .map(|segment| segment.value.as_str())
    }

    /// The value of the last segment.
    pub fn leaf_name(&self) -> &str {
        self.segments
            .last()
            .map(|segment| segment.value.as_str())
            .unwrap_or_default()
    }

    /// Truncates this identity to the given ancestor template.
    pub fn parent(
        &self,
        template: &'static IdentityTemplate,
    ) -> Result<ResourceIdentity, ReconcileError> {
        if !template.is_parent_of(self.template) {
            return Err(ReconcileError::MalformedIdentity {
                expected: template.name,
                input: self.render(),
                reason: format!("a {} is not an ancestor of a {}", template.name, self.template.name),
            });
        }
        Ok(ResourceIdentity {
            template,
            segments: self.segments[..template.segments.len()].to_vec(),
        })
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.template.name, self.render())
    }
}

impl Serialize for ResourceIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}
