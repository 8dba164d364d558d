//! Hooks into cache behavior.
pub mod chain;
pub mod observer;

#[cfg(test)]
pub(crate) mod test_utils;

use super::DynError;

/// A trait for hooking into cache updates.
///
/// This can be used for:
///
/// - injecting metrics
/// - maintaining secondary indices
/// - vetoing entries right after they finished loading
///
/// Note: members are called under locks and should therefore be quick to run and must not
/// call back into the cache.
///
/// # Eventual Consistency
/// [`evict`](Self::evict) is only emitted once the load future of the affected entry has
/// finished. A key may therefore be observed in two versions at the same time, an old one
/// that was already removed from the cache but whose future still runs, and a new one. Use
/// the generation number to tell them apart.
pub trait Hook<K>: std::fmt::Debug + Send + Sync {
    /// Called before a new entry is stored.
    fn insert(&self, _generation: u64, _k: &K) {}

    /// An entry finished loading.
    ///
    /// The hook may reject the fresh entry by returning [`HookDecision::Evict`].
    fn loaded(&self, _generation: u64, _k: &K, _res: Result<(), &DynError>) -> HookDecision {
        HookDecision::default()
    }

    /// An entry was removed.
    fn evict(&self, _generation: u64, _k: &K, _res: EvictResult) {}
}

/// Outcome of [`Hook::loaded`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HookDecision {
    /// Keep the entry in the cache.
    #[default]
    Keep,

    /// Evict the entry from the cache.
    Evict,
}

impl HookDecision {
    /// Combine two decisions, biased towards eviction.
    pub fn favor_evict(self, other: Self) -> Self {
        match (self, other) {
            (Self::Keep, Self::Keep) => Self::Keep,
            _ => Self::Evict,
        }
    }
}

/// Entry state at the time it was removed, reported to [`Hook::evict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictResult {
    /// The entry never finished loading.
    Unloaded,

    /// The entry was fully loaded.
    Loaded,

    /// The entry failed to load.
    Failed,
}
