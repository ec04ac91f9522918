use envconfig::Envconfig;
use reconcile_framework::{PlaneOptions, ReconcilerConfig, Timeouts};
use std::time::Duration;

/// Settings of the in-memory management planes.
#[derive(Envconfig, Clone, Debug)]
pub struct PlaneConfig {
    /// Bound of each plane's request channel.
    #[envconfig(from = "PLANE_BUFFER_SIZE", default = "32")]
    pub buffer_size: usize,

    #[envconfig(from = "PLANE_POLLS_TO_COMPLETE", default = "1")]
    pub polls_to_complete: u32,

    #[envconfig(from = "PLANE_FAIL_OPERATIONS", default = "false")]
    pub fail_operations: bool,

    /// Seconds after which an operation nobody polls completes on its own.
    #[envconfig(from = "PLANE_OPERATION_TTL_SECS", default = "60")]
    pub operation_ttl_secs: u64,
}

impl From<&PlaneConfig> for PlaneOptions {
    fn from(config: &PlaneConfig) -> Self {
        Self {
            polls_to_complete: config.polls_to_complete,
            fail_operations: config.fail_operations,
            operation_ttl: Duration::from_secs(config.operation_ttl_secs),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemConfig {
    pub reconciler: ReconcilerConfig,
    pub plane: PlaneConfig,
}

impl SystemConfig {
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Ok(Self {
            reconciler: ReconcilerConfig::init_from_env()?,
            plane: PlaneConfig::init_from_env()?,
        })
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from(&self.reconciler)
    }
}
