//! This crate exists to add a layer of indirection between the workspace and its
//! observability dependencies. Crates should depend on `tracing` through this
//! re-export so that version upgrades and compile-time level filtering are decided
//! in exactly one place.

// Export tracing publicly so we can have a single workspace-wide version.
pub use tracing;
