//! Chain multiple [`Hook`]s.
use std::sync::Arc;

use crate::cache_system::interfaces::DynError;

use super::{EvictResult, Hook, HookDecision};

/// Chains multiple [`Hook`]s.
///
/// All members are called in order. Decisions are combined with
/// [`favor_evict`](HookDecision::favor_evict), so a single hook can veto an entry.
pub struct HookChain<K> {
    hooks: Box<[Arc<dyn Hook<K>>]>,
}

impl<K> HookChain<K> {
    /// Create a new chain from the given hooks.
    pub fn new(hooks: impl IntoIterator<Item = Arc<dyn Hook<K>>>) -> Self {
        Self {
            hooks: hooks.into_iter().collect(),
        }
    }
}

impl<K> std::fmt::Debug for HookChain<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<K> Hook<K> for HookChain<K>
where
    K: Send + Sync,
{
    fn insert(&self, generation: u64, k: &K) {
        for hook in &self.hooks {
            hook.insert(generation, k);
        }
    }

    fn loaded(&self, generation: u64, k: &K, res: Result<(), &DynError>) -> HookDecision {
        self.hooks
            .iter()
            .fold(None, |decision: Option<HookDecision>, hook| {
                let this = hook.loaded(generation, k, res);
                Some(match decision {
                    None => this,
                    Some(other) => other.favor_evict(this),
                })
            })
            .unwrap_or_default()
    }

    fn evict(&self, generation: u64, k: &K, res: EvictResult) {
        for hook in &self.hooks {
            hook.evict(generation, k, res);
        }
    }
}
