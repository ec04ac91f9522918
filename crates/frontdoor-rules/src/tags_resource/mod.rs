//! # Resource Tags
//!
//! The tag set of a resource group, addressed as
//! `/subscriptions/S/resourceGroups/G/providers/Microsoft.Resources/tags/default`. It has no
//! composite fields and is replaced as a whole on update.
//!
//! ```json
//! { "resource_id": "/subscriptions/S/resourceGroups/G", "tags": { "env": "prod" } }
//! ```

pub mod resource;

pub use resource::Tags;

use reconcile_framework::{PlaneActor, PlaneClient, PlaneOptions};

/// Creates an in-memory plane for tag sets and its client.
pub fn new(buffer_size: usize, options: PlaneOptions) -> (PlaneActor<Tags>, PlaneClient<Tags>) {
    PlaneActor::new(buffer_size, options)
}
