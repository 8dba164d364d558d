//! Test utils for [`Hook`]s.

use std::{collections::VecDeque, sync::Mutex};

use crate::cache_system::interfaces::DynError;

use super::{EvictResult, Hook, HookDecision};

/// Record of a single [`Hook`] call.
///
/// Errors are flattened to their string representation to keep assertions simple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TestHookRecord<K> {
    /// [`Hook::insert`]
    Insert(u64, K),

    /// [`Hook::loaded`]
    Loaded(u64, K, Result<(), String>),

    /// [`Hook::evict`]
    Evict(u64, K, EvictResult),
}

/// [`Hook`] that records calls and can mock [`loaded`](Hook::loaded) decisions.
#[derive(Debug)]
pub(crate) struct TestHook<K>
where
    K: Clone + std::fmt::Debug + Eq + Send,
{
    state: Mutex<TestHookState<K>>,
}

#[derive(Debug)]
struct TestHookState<K> {
    records: Vec<TestHookRecord<K>>,
    loaded_decisions: VecDeque<HookDecision>,
}

impl<K> TestHook<K>
where
    K: Clone + std::fmt::Debug + Eq + Send,
{
    /// All calls so far, in order.
    pub(crate) fn records(&self) -> Vec<TestHookRecord<K>> {
        self.state.lock().unwrap().records.clone()
    }

    /// Mock the decision for the next [`loaded`](Hook::loaded) call.
    ///
    /// Decisions queue up in FIFO order. Calls without a mocked decision keep the entry.
    pub(crate) fn mock_next_loaded(&self, decision: HookDecision) {
        self.state.lock().unwrap().loaded_decisions.push_back(decision);
    }
}

impl<K> Default for TestHook<K>
where
    K: Clone + std::fmt::Debug + Eq + Send,
{
    fn default() -> Self {
        Self {
            state: Mutex::new(TestHookState {
                records: Vec::new(),
                loaded_decisions: VecDeque::new(),
            }),
        }
    }
}

impl<K> Hook<K> for TestHook<K>
where
    K: Clone + std::fmt::Debug + Eq + Send + Sync,
{
    fn insert(&self, generation: u64, k: &K) {
        self.state
            .lock()
            .unwrap()
            .records
            .push(TestHookRecord::Insert(generation, k.clone()));
    }

    fn loaded(&self, generation: u64, k: &K, res: Result<(), &DynError>) -> HookDecision {
        let mut state = self.state.lock().unwrap();
        state.records.push(TestHookRecord::Loaded(
            generation,
            k.clone(),
            res.map_err(|e| e.to_string()),
        ));
        state.loaded_decisions.pop_front().unwrap_or_default()
    }

    fn evict(&self, generation: u64, k: &K, res: EvictResult) {
        self.state
            .lock()
            .unwrap()
            .records
            .push(TestHookRecord::Evict(generation, k.clone(), res));
    }
}
