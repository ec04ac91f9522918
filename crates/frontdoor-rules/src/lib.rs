//! # Front Door Rules
//!
//! Declarative management of CDN delivery rules and resource-group tags on top of
//! `reconcile-framework`.
//!
//! - [`ids`] - identity templates for profiles, rule sets, rules, origin groups and tags
//! - [`model`] - wire records plus the action and condition registries
//! - [`rule_resource`] / [`tags_resource`] - the two resource kinds
//! - [`lifecycle`] - [`RuleSystem`](lifecycle::RuleSystem), which wires in-memory planes to
//!   controllers

pub mod ids;
pub mod lifecycle;
pub mod model;
pub mod rule_resource;
pub mod tags_resource;
