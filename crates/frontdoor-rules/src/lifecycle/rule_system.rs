use super::SystemConfig;
use crate::rule_resource::{self, Rule};
use crate::tags_resource::{self, Tags};
use reconcile_framework::{LifecycleController, PlaneClient, PlaneOptions};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

pub type RuleController = LifecycleController<Rule, PlaneClient<Rule>>;
pub type TagsController = LifecycleController<Tags, PlaneClient<Tags>>;

/// Owns the in-memory planes and the controllers driving resources against them.
pub struct RuleSystem {
    pub rules: RuleController,
    pub tags: TagsController,
    handles: Vec<JoinHandle<()>>,
}

impl RuleSystem {
    /// Spawns one plane per resource kind and builds a controller for each.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &SystemConfig) -> Self {
        let options = PlaneOptions::from(&config.plane);
        let timeouts = config.timeouts();

        let (rule_plane, rule_client) = rule_resource::new(config.plane.buffer_size, options);
        let rule_handle = tokio::spawn(rule_plane.run());

        let (tags_plane, tags_client) = tags_resource::new(config.plane.buffer_size, options);
        let tags_handle = tokio::spawn(tags_plane.run());

        info!(?options, ?timeouts, "System started");
        Self {
            rules: LifecycleController::new(rule_client, timeouts),
            tags: LifecycleController::new(tags_client, timeouts),
            handles: vec![rule_handle, tags_handle],
        }
    }

    /// Drops the controllers and waits for every plane to stop.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        info!("Shutting down system...");
        drop(self.rules);
        drop(self.tags);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Plane task failed");
                return Err(e);
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
