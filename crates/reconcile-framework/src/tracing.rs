//! # Tracing Setup
//!
//! Initializes structured logging for a process hosting controllers.
//!
//! ```bash
//! RUST_LOG=info cargo run      # lifecycle transitions only
//! RUST_LOG=debug cargo run     # full payloads, once per operation
//! ```
//!
//! Controller operations run inside `#[instrument]` spans named after the operation
//! (`create`, `read`, `update`, `delete`). The span carries the resource kind from the start
//! and the identity as soon as it is known, so interleaved reconciliations of different
//! resources stay readable.

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`. Call once, at startup.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
