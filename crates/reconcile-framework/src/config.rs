//! Timeout budgets and polling cadence, read from the environment.

use crate::error::LifecycleOp;
use envconfig::Envconfig;
use std::time::Duration;

#[derive(Envconfig, Clone, Debug)]
pub struct ReconcilerConfig {
    #[envconfig(from = "RECONCILE_CREATE_TIMEOUT_SECS", default = "1800")]
    pub create_timeout_secs: u64,

    #[envconfig(from = "RECONCILE_READ_TIMEOUT_SECS", default = "300")]
    pub read_timeout_secs: u64,

    #[envconfig(from = "RECONCILE_UPDATE_TIMEOUT_SECS", default = "1800")]
    pub update_timeout_secs: u64,

    #[envconfig(from = "RECONCILE_DELETE_TIMEOUT_SECS", default = "1800")]
    pub delete_timeout_secs: u64,

    #[envconfig(from = "RECONCILE_POLL_INTERVAL_MS", default = "1000")]
    pub poll_interval_ms: u64,
}

/// Per-operation budgets injected into a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
    pub poll_interval: Duration,
}

impl Timeouts {
    pub fn for_op(&self, operation: LifecycleOp) -> Duration {
        match operation {
            LifecycleOp::Create => self.create,
            LifecycleOp::Read => self.read,
            LifecycleOp::Update => self.update,
            LifecycleOp::Delete => self.delete,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(30 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(30 * 60),
            delete: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl From<&ReconcilerConfig> for Timeouts {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            create: Duration::from_secs(config.create_timeout_secs),
            read: Duration::from_secs(config.read_timeout_secs),
            update: Duration::from_secs(config.update_timeout_secs),
            delete: Duration::from_secs(config.delete_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}
