//! Cache system that ties loading, eviction, and observability together.
//!
//! # Data Structures
//! The centerpiece is [`Cache`]: a concurrency-safe key-value store that maps keys to
//! shared load futures and keeps entries in strict LRU order, bounded by a fixed
//! capacity. Loads are driven to completion by background tasks
//! ([`TokioTask`](utils::TokioTask)), so results arrive even when no waiter polls, and
//! every concurrent request for one key receives the same result.
//!
//! The cache reports the lifecycle of every entry to a [`Hook`](hook::Hook) and asks it
//! whether fresh entries should be kept:
//!
//! ```text
//! +-------+   insert / loaded / evict    +------+
//! |       | ---------------------------> |      |
//! | Cache |                              | Hook |
//! |       | <--------------------------- |      |
//! +-------+        keep or evict         +------+
//! ```
//!
//! Hooks are chained via [`HookChain`](hook::chain::HookChain) and drive metrics via
//! [`ObserverHook`](hook::observer::ObserverHook).
//!
//! # Generations
//! Every inserted entry is tagged with a unique generation. Since a key can be removed
//! and re-inserted, hook implementations use the generation to tell the incarnations
//! apart, and the cache uses it internally so that cleanup after a failed load never
//! removes a newer entry for the same key.
pub mod cache;
pub mod hook;
pub mod interfaces;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod utils;

pub use cache::{Cache, CacheState, EntryUsage};
pub use interfaces::{ArcResult, DynError};
