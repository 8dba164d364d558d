//! Plan cache facade that ties bucketing, key derivation, parameter binding and the
//! underlying cache together.
use std::{fmt, future::Future, num::NonZeroUsize, sync::Arc};

use metric::{Registry, U64Counter};
use observability_deps::tracing::{debug, warn};

use crate::{
    bucket::{BucketConfig, BucketSpec, Bucketing},
    cache_system::{
        hook::{chain::HookChain, observer::ObserverHook, Hook},
        Cache, CacheState, DynError,
    },
    error::Error,
    params::{PaddingPolicy, ValueList},
    plan_key::PlanKey,
};

/// Cache name used within metric attributes.
const CACHE_NAME: &str = "plan";

/// Default number of plans the cache retains.
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Parameters for [`PlanCache`].
#[derive(Debug, Clone, Copy)]
pub struct PlanCacheParams<'a> {
    /// Maximum number of plans kept resident, see [`DEFAULT_CAPACITY`].
    pub capacity: NonZeroUsize,

    /// Controls bucket sizing and the fallback cutoff.
    pub bucket_config: BucketConfig,

    /// How bound value lists are extended to the padded count.
    pub padding_policy: PaddingPolicy,

    /// Metric registry for cache observability.
    pub metrics: &'a Registry,
}

impl PlanCacheParams<'_> {
    /// Build cache from parameters.
    pub fn build<T>(self) -> PlanCache<T>
    where
        T: Send + Sync + 'static,
    {
        let Self {
            capacity,
            bucket_config,
            padding_policy,
            metrics,
        } = self;

        let observer = Arc::new(ObserverHook::new(CACHE_NAME, metrics, capacity.get() as u64));
        let hook: Arc<dyn Hook<PlanKey>> = Arc::new(HookChain::new([observer as _]));
        let cache = Cache::new(capacity, hook);

        let access = metrics
            .register_metric::<U64Counter>("plan_cache_access", "Requests to the plan cache");

        // same name and attributes as the instruments the hook drives, so these handles
        // observe the hook's counts
        let change = metrics.register_metric::<U64Counter>(
            "plan_cache_change_entries",
            "Changes of plan cache entries",
        );

        PlanCache {
            cache,
            bucket_config,
            padding_policy,
            access_hit: access.recorder(&[("cache", CACHE_NAME), ("status", "hit")]),
            access_miss: access.recorder(&[("cache", CACHE_NAME), ("status", "miss")]),
            access_miss_already_compiling: access.recorder(&[
                ("cache", CACHE_NAME),
                ("status", "miss_already_compiling"),
            ]),
            evicted_pending: change.recorder(&[
                ("cache", CACHE_NAME),
                ("transition", "evicted"),
                ("state", "pending"),
            ]),
            evicted_compiled: change.recorder(&[
                ("cache", CACHE_NAME),
                ("transition", "evicted"),
                ("state", "compiled"),
            ]),
        }
    }
}

/// Outcome of a successful [`get_or_compile`](PlanCache::get_or_compile).
pub enum Prepared<T> {
    /// The statement was normalized onto a bucketed shape.
    Bucketed {
        /// Compiled plan, shared with all other requests of the same shape.
        plan: Arc<T>,

        /// Values padded to the bucketed parameter count, ready to bind.
        params: ValueList,

        /// The bucketing that produced this shape.
        spec: BucketSpec,
    },

    /// The list exceeds the bucketing cutoff.
    ///
    /// The caller should execute the statement verbatim instead. Deliberately not an
    /// error, oversized lists are valid queries that are merely not worth caching.
    Fallback {
        /// Number of values in the request.
        raw_count: usize,

        /// Configured cutoff that was exceeded.
        max_count: usize,
    },
}

impl<T> Prepared<T> {
    /// Returns true if the request fell back to an unbucketed execution.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

impl<T> fmt::Debug for Prepared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucketed { plan: _, params, spec } => f
                .debug_struct("Bucketed")
                .field("params", params)
                .field("spec", spec)
                .finish_non_exhaustive(),
            Self::Fallback {
                raw_count,
                max_count,
            } => f
                .debug_struct("Fallback")
                .field("raw_count", raw_count)
                .field("max_count", max_count)
                .finish(),
        }
    }
}

/// Point-in-time snapshot of cache effectiveness, see [`PlanCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Requests served by an already compiled plan.
    pub hits: u64,

    /// Requests that had to compile, including ones that joined an in-flight
    /// compilation.
    pub misses: u64,

    /// Number of resident plans, including ones still compiling.
    pub size: usize,

    /// Plans dropped due to the capacity bound or an explicit wipe. Removals of failed
    /// compilations do not count, those were never cached.
    pub evictions: u64,
}

/// Compiled-plan cache keyed by statement shape.
///
/// Requests are normalized before the cache is consulted: the value count is padded up to
/// a power-of-two bucket and the cache key is derived from the statement template and the
/// padded count only. Requests whose lengths fall into the same bucket therefore share
/// one compiled plan, and concurrent misses for one shape trigger a single compilation.
///
/// `T` is the compiled plan type, opaque to this crate.
pub struct PlanCache<T>
where
    T: Send + Sync + 'static,
{
    cache: Cache<PlanKey, T>,
    bucket_config: BucketConfig,
    padding_policy: PaddingPolicy,
    access_hit: U64Counter,
    access_miss: U64Counter,
    access_miss_already_compiling: U64Counter,
    evicted_pending: U64Counter,
    evicted_compiled: U64Counter,
}

impl<T> PlanCache<T>
where
    T: Send + Sync + 'static,
{
    /// Normalize a request and return its compiled plan, compiling on a miss.
    ///
    /// The value count is padded up to its bucket, the cache key is derived from the
    /// statement template and the padded count, and `compile_fn` is called iff no plan for
    /// that key is resident or being compiled. `compile_fn` receives the derived key and
    /// must only construct the compilation future, the work itself runs on a background
    /// task and is shared by all concurrent requests for the key.
    ///
    /// Lists longer than the configured cutoff return [`Prepared::Fallback`] without
    /// consulting the cache. Empty lists are rejected with [`Error::InvalidArgument`].
    /// Failed compilations are reported to every waiting request and are not cached, the
    /// next request for the key compiles again.
    ///
    /// Dropping the returned future does not stop an in-flight compilation, other waiters
    /// still receive the plan.
    pub async fn get_or_compile<F, Fut>(
        &self,
        statement: impl Into<Arc<str>>,
        values: ValueList,
        compile_fn: F,
    ) -> Result<Prepared<T>, Error>
    where
        F: FnOnce(&PlanKey) -> Fut + Send,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let spec = match self.bucket_config.compute_bucket(values.len())? {
            Bucketing::Bucketed(spec) => spec,
            Bucketing::Fallback {
                raw_count,
                max_count,
            } => {
                debug!(
                    raw_count,
                    max_count,
                    "membership list exceeds bucketing cutoff, not caching"
                );
                return Ok(Prepared::Fallback {
                    raw_count,
                    max_count,
                });
            }
        };

        let key = PlanKey::derive(statement, spec.padded_count());

        // bind before consulting the cache, a list that cannot be padded must not
        // trigger a compilation
        let params = values.bind(&spec, self.padding_policy)?;

        let (res, state) = self.cache.get_or_load(&key, compile_fn).await;

        match state {
            CacheState::WasCached => self.access_hit.inc(1),
            CacheState::AlreadyLoading => self.access_miss_already_compiling.inc(1),
            CacheState::NewEntry => self.access_miss.inc(1),
        }
        debug!(
            %key,
            ?state,
            raw_count = spec.raw_count(),
            padded_count = spec.padded_count(),
            "plan cache access"
        );

        match res {
            Ok(plan) => Ok(Prepared::Bucketed { plan, params, spec }),
            Err(e) => {
                warn!(%key, %e, "plan compilation failed");
                Err(Error::CompileFailure(e))
            }
        }
    }

    /// Effectiveness counters and the current size.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.access_hit.fetch(),
            misses: self.access_miss.fetch() + self.access_miss_already_compiling.fetch(),
            size: self.cache.len(),
            evictions: self.evicted_pending.fetch() + self.evicted_compiled.fetch(),
        }
    }

    /// Number of resident plans, including ones still compiling.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if no plans are resident.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop all resident plans.
    ///
    /// Compilations that are still running are detached and their results discarded.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<T> fmt::Debug for PlanCache<T>
where
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCache")
            .field("cache", &self.cache)
            .field("bucket_config", &self.bucket_config)
            .field("padding_policy", &self.padding_policy)
            .finish_non_exhaustive()
    }
}
