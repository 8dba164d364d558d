use std::marker::PhantomData;

use metric::{U64Counter, U64Gauge};
use observability_deps::tracing::debug;

use crate::cache_system::{
    hook::{EvictResult, Hook, HookDecision},
    interfaces::DynError,
};

/// [`Hook`] that emits metrics and log messages for cache transitions.
///
/// Never vetoes an entry.
#[derive(Debug)]
pub struct ObserverHook<K>
where
    K: std::fmt::Debug,
{
    _k: PhantomData<dyn Fn() -> K + Send + Sync + 'static>,
    inserted_entries: U64Counter,
    compiled_ok_entries: U64Counter,
    compiled_err_entries: U64Counter,
    evict_pending_entries: U64Counter,
    evict_compiled_entries: U64Counter,
    evict_failed_entries: U64Counter,
    #[allow(dead_code)]
    capacity_entries: U64Gauge,
}

impl<K> ObserverHook<K>
where
    K: std::fmt::Debug,
{
    pub fn new(cache: &'static str, metrics: &metric::Registry, capacity: u64) -> Self {
        let metric_entries = metrics.register_metric::<U64Counter>(
            "plan_cache_change_entries",
            "Changes of plan cache entries",
        );

        Self {
            _k: Default::default(),
            inserted_entries: metric_entries
                .recorder(&[("cache", cache), ("transition", "inserted")]),
            compiled_ok_entries: metric_entries.recorder(&[
                ("cache", cache),
                ("transition", "compiled"),
                ("result", "ok"),
            ]),
            compiled_err_entries: metric_entries.recorder(&[
                ("cache", cache),
                ("transition", "compiled"),
                ("result", "err"),
            ]),
            evict_pending_entries: metric_entries.recorder(&[
                ("cache", cache),
                ("transition", "evicted"),
                ("state", "pending"),
            ]),
            evict_compiled_entries: metric_entries.recorder(&[
                ("cache", cache),
                ("transition", "evicted"),
                ("state", "compiled"),
            ]),
            evict_failed_entries: metric_entries.recorder(&[
                ("cache", cache),
                ("transition", "evicted"),
                ("state", "failed"),
            ]),
            capacity_entries: {
                let gauge = metrics
                    .register_metric::<U64Gauge>(
                        "plan_cache_capacity_entries",
                        "Configured plan cache capacity in entries",
                    )
                    .recorder(&[("cache", cache)]);
                gauge.set(capacity);
                gauge
            },
        }
    }
}

impl<K> Hook<K> for ObserverHook<K>
where
    K: std::fmt::Debug + Send + Sync,
{
    fn insert(&self, generation: u64, k: &K) {
        debug!(generation, ?k, "insert");
        self.inserted_entries.inc(1);
    }

    fn loaded(&self, generation: u64, k: &K, res: Result<(), &DynError>) -> HookDecision {
        match res {
            Ok(()) => {
                debug!(generation, ?k, "compiled successfully");
                self.compiled_ok_entries.inc(1);
            }
            Err(e) => {
                debug!(generation, ?k, %e, "failed to compile");
                self.compiled_err_entries.inc(1);
            }
        }

        HookDecision::Keep
    }

    fn evict(&self, generation: u64, k: &K, res: EvictResult) {
        match res {
            EvictResult::Unloaded => {
                debug!(generation, ?k, "evict entry that never finished compiling");
                self.evict_pending_entries.inc(1);
            }
            EvictResult::Loaded => {
                debug!(generation, ?k, "evict compiled entry");
                self.evict_compiled_entries.inc(1);
            }
            EvictResult::Failed => {
                debug!(generation, ?k, "evict entry that failed to compile");
                self.evict_failed_entries.inc(1);
            }
        }
    }
}
