//! # Delivery Rule Resource
//!
//! A rule of a Front Door rule set: an ordered entry with a `behavior_on_match`, up to five
//! actions and up to ten conditions.
//!
//! ## Structure
//!
//! - [`resource`] - [`ManagedResource`](reconcile_framework::ManagedResource) implementation
//!   for [`Rule`]
//! - [`new()`] - Factory for an in-memory plane hosting rules
//!
//! ## Desired State
//!
//! ```json
//! {
//!   "name": "HttpsRedirect",
//!   "cdn_frontdoor_rule_set_id": "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P/ruleSets/RS",
//!   "order": 1,
//!   "behavior_on_match": "Stop",
//!   "conditions": { "request_scheme_condition": [{ "operator": "Equal", "match_values": ["HTTP"] }] },
//!   "actions": { "url_redirect_action": [{ "redirect_type": "Moved", "redirect_protocol": "Https", "destination_hostname": "contoso.com" }] }
//! }
//! ```
//!
//! `cdn_frontdoor_rule_set_name` is computed from the identity and filled on every read.

pub mod resource;

pub use resource::Rule;

use reconcile_framework::{PlaneActor, PlaneClient, PlaneOptions};

/// Creates an in-memory plane for rules and its client.
pub fn new(buffer_size: usize, options: PlaneOptions) -> (PlaneActor<Rule>, PlaneClient<Rule>) {
    PlaneActor::new(buffer_size, options)
}
