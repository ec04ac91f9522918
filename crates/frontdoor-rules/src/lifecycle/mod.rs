//! # System Lifecycle & Orchestration
//!
//! Wires the in-memory planes to lifecycle controllers and tears them down again.
//!
//! ## The RuleSystem Pattern
//!
//! ```rust,ignore
//! let config = SystemConfig::from_env()?;
//! let system = RuleSystem::new(&config);
//!
//! let mut rule = ResourceInstance::absent();
//! system.rules.create(&mut rule, &desired).await?;
//!
//! system.shutdown().await?;
//! ```
//!
//! Each plane is an actor task owning its store; the controllers hold the only clients.
//!
//! ## Graceful Shutdown
//!
//! 1. **Drop the controllers** - their clients are the last senders, so the channels close
//! 2. **Planes detect closure** - `receiver.recv()` returns `None` and the loop ends
//! 3. **Await completion** - every plane task is joined; a panicked task is reported
//!
//! ## Configuration
//!
//! [`SystemConfig`] gathers the controller budgets
//! ([`ReconcilerConfig`](reconcile_framework::ReconcilerConfig)) and the plane settings
//! ([`PlaneConfig`]), both read from the environment with defaults.

pub mod config;
pub mod rule_system;

pub use config::*;
pub use rule_system::*;
