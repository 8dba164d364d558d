//! Core concurrency-safe cache structure.
use std::{
    fmt,
    future::Future,
    hash::Hash,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    time::Instant,
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use lru::LruCache;
use parking_lot::Mutex;

use crate::cache_system::{
    hook::{EvictResult, Hook, HookDecision},
    interfaces::{ArcResult, DynError},
    utils::{CatchUnwindDynErrorExt, TokioTask},
};

/// State that provides more information about [`get_or_load`](Cache::get_or_load) results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// Entry was already part of the cache and fully loaded.
    WasCached,

    /// Entry was already part of the cache but did not finish loading yet.
    AlreadyLoading,

    /// A new entry was created.
    NewEntry,
}

/// Result of a load future, stored as [`AtomicU8`] within [`EntryState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadStatus {
    NotReady,
    Success,
    Failure,
}

impl From<LoadStatus> for u8 {
    fn from(status: LoadStatus) -> Self {
        match status {
            LoadStatus::NotReady => 0,
            LoadStatus::Success => 1,
            LoadStatus::Failure => 2,
        }
    }
}

impl From<u8> for LoadStatus {
    fn from(status: u8) -> Self {
        match status {
            0 => Self::NotReady,
            1 => Self::Success,
            2 => Self::Failure,
            _ => unreachable!("load status out of range"),
        }
    }
}

type LoadFut<V> = Shared<BoxFuture<'static, ArcResult<V>>>;

/// Load state of an entry, shared by the cache slot and the load task.
///
/// Dropping the last reference reports the eviction to the hook, which by construction
/// only happens once neither the cache nor the load task use the entry anymore.
struct EntryState<K> {
    generation: u64,
    key: K,
    hook: Arc<dyn Hook<K>>,
    load_status: AtomicU8,
}

impl<K> Drop for EntryState<K> {
    fn drop(&mut self) {
        let res = match LoadStatus::from(self.load_status.load(Ordering::SeqCst)) {
            LoadStatus::NotReady => EvictResult::Unloaded,
            LoadStatus::Success => EvictResult::Loaded,
            LoadStatus::Failure => EvictResult::Failed,
        };
        self.hook.evict(self.generation, &self.key, res);
    }
}

/// A cache slot and its usage bookkeeping.
struct CacheEntry<K, V> {
    fut: LoadFut<V>,
    state: Arc<EntryState<K>>,
    created_at: Instant,
    last_used_at: Instant,
    hit_count: u64,
}

impl<K, V> CacheEntry<K, V> {
    fn touch(&mut self) {
        self.last_used_at = Instant::now();
        self.hit_count += 1;
    }
}

/// Usage snapshot of a single cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryUsage {
    /// When the entry was inserted.
    pub created_at: Instant,

    /// When the entry was last served from the cache.
    ///
    /// Starts out equal to [`created_at`](Self::created_at).
    pub last_used_at: Instant,

    /// How often the entry was served from the cache after its insertion.
    pub hit_count: u64,
}

/// Return value of [`Cache::get_or_load_impl`].
enum GetOrLoadRes<V> {
    /// A new entry was created.
    New(LoadFut<V>),

    /// The entry was already known.
    Known(LoadFut<V>),
}

/// Concurrency-safe cache that maps keys to failable, shared load futures, bounded by
/// strict LRU eviction.
///
/// # Loading
/// Loads are driven by a background tokio task, so they make progress even when no waiter
/// polls. Concurrent requests for one key share a single load, every waiter receives the
/// same result. The loader is called at most once per cache miss.
///
/// # Capacity
/// The cache never holds more than `capacity` entries, including ones that are still
/// loading. When an insert exceeds the bound, the least recently used entry is dropped
/// immediately. If the dropped entry was still loading and no waiter is left, the load
/// task is aborted.
///
/// # Failures
/// A failed or panicked load is broadcast to every current waiter and the entry removes
/// itself, so the next request for that key loads again. Failures are never served from
/// the cache.
pub struct Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    generation_counter: AtomicU64,
    hook: Arc<dyn Hook<K>>,
    entries: Arc<Mutex<LruCache<K, CacheEntry<K, V>>>>,
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a new, empty cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize, hook: Arc<dyn Hook<K>>) -> Self {
        Self {
            generation_counter: AtomicU64::new(0),
            hook,
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Get an existing entry or start loading it using `f`.
    ///
    /// `f` must only construct the load future and return quickly, it runs under the cache
    /// lock. The returned future can be dropped without stopping the load, other waiters
    /// and later requests still receive the result.
    pub async fn get_or_load<F, Fut>(&self, k: &K, f: F) -> (ArcResult<V>, CacheState)
    where
        F: FnOnce(&K) -> Fut + Send,
        Fut: Future<Output = Result<V, DynError>> + Send + 'static,
    {
        match self.get_or_load_impl(k, f) {
            GetOrLoadRes::New(fut) => (fut.await, CacheState::NewEntry),
            GetOrLoadRes::Known(fut) => match fut.peek() {
                Some(res) => (res.clone(), CacheState::WasCached),
                None => (fut.await, CacheState::AlreadyLoading),
            },
        }
    }

    fn get_or_load_impl<F, Fut>(&self, k: &K, f: F) -> GetOrLoadRes<V>
    where
        F: FnOnce(&K) -> Fut + Send,
        Fut: Future<Output = Result<V, DynError>> + Send + 'static,
    {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(k) {
            entry.touch();
            return GetOrLoadRes::Known(entry.fut.clone());
        }

        let generation = self.generation_counter.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(EntryState {
            generation,
            key: k.clone(),
            hook: Arc::clone(&self.hook),
            load_status: AtomicU8::new(LoadStatus::NotReady.into()),
        });
        let state_captured = Arc::clone(&state);
        let entries_captured = Arc::downgrade(&self.entries);
        let load_fut = f(k);
        let fut = async move {
            let res = load_fut.catch_unwind_dyn_error().await;

            let status = if res.is_ok() {
                LoadStatus::Success
            } else {
                LoadStatus::Failure
            };
            state_captured
                .load_status
                .store(status.into(), Ordering::SeqCst);

            let decision = state_captured.hook.loaded(
                state_captured.generation,
                &state_captured.key,
                res.as_ref().map(|_| ()),
            );

            // failed loads must not stay cached, and the hook may veto fresh entries
            if res.is_err() || decision == HookDecision::Evict {
                if let Some(entries) = entries_captured.upgrade() {
                    let mut guard = entries.lock();
                    let same_generation = guard
                        .peek(&state_captured.key)
                        .is_some_and(|entry| entry.state.generation == state_captured.generation);
                    let removed = if same_generation {
                        guard.pop(&state_captured.key)
                    } else {
                        // a newer generation took over the slot in the meantime
                        None
                    };
                    drop(guard);
                    drop(removed);
                }
            }

            res.map(Arc::new)
        };

        // the task keeps loading even when all waiters are gone, and aborts once the
        // entry is evicted with nobody listening
        let fut = TokioTask::spawn(fut).boxed().shared();

        self.hook.insert(generation, k);
        let now = Instant::now();
        let evicted = entries.push(
            k.clone(),
            CacheEntry {
                fut: fut.clone(),
                state,
                created_at: now,
                last_used_at: now,
                hit_count: 0,
            },
        );
        debug_assert!(
            !evicted.as_ref().is_some_and(|(evicted_k, _)| evicted_k == k),
            "freshly inserted key cannot displace itself",
        );
        drop(entries);

        // entry destructors report to the hook, run them after releasing the lock
        drop(evicted);

        GetOrLoadRes::New(fut)
    }

    /// Number of entries, including ones that are still loading.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check for an entry without updating its recency.
    pub fn contains(&self, k: &K) -> bool {
        self.entries.lock().contains(k)
    }

    /// Usage bookkeeping of a single entry.
    ///
    /// Probing does not count as a use.
    pub fn usage(&self, k: &K) -> Option<EntryUsage> {
        self.entries.lock().peek(k).map(|entry| EntryUsage {
            created_at: entry.created_at,
            last_used_at: entry.last_used_at,
            hit_count: entry.hit_count,
        })
    }

    /// Drop all entries.
    ///
    /// Loads that are still running are detached and their results discarded.
    pub fn clear(&self) {
        let mut guard = self.entries.lock();
        let cap = guard.cap();
        let drained = std::mem::replace(&mut *guard, LruCache::new(cap));
        drop(guard);

        drop(drained);
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
