//! An in-memory metric abstraction.
//!
//! A [`Registry`] vends named [`Metric`]s. Each metric is a family of instruments
//! of one kind that are distinguished by their [`Attributes`]. Instruments are
//! shared: requesting a recorder for attributes that already exist returns a
//! handle onto the same underlying value, so independent components can
//! contribute to one instrument without coordination.
//!
//! ```
//! use metric::{Registry, U64Counter};
//!
//! let registry = Registry::new();
//! let requests = registry.register_metric::<U64Counter>("requests", "Number of requests");
//!
//! let ok = requests.recorder(&[("result", "ok")]);
//! ok.inc(1);
//!
//! // A second recorder with equal attributes observes the same value.
//! assert_eq!(requests.recorder(&[("result", "ok")]).fetch(), 1);
//! ```

use std::{
    any::Any,
    borrow::Cow,
    collections::BTreeMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

/// A set of key-value pairs that distinguishes one instrument of a [`Metric`]
/// from its siblings.
///
/// Keys are stored in sorted order, so equal sets compare equal regardless of
/// the order in which they were assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attributes(BTreeMap<&'static str, Cow<'static, str>>);

impl Attributes {
    /// Set the given attribute, replacing any existing value for the key.
    pub fn insert(&mut self, key: &'static str, value: impl Into<Cow<'static, str>>) {
        self.0.insert(key, value.into());
    }

    /// Iterate over the attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.0.iter().map(|(key, value)| (*key, value.as_ref()))
    }

    /// Number of attributes in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set contains no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&'static str, &'static str); N]> for Attributes {
    fn from(attributes: [(&'static str, &'static str); N]) -> Self {
        Self(
            attributes
                .into_iter()
                .map(|(key, value)| (key, Cow::Borrowed(value)))
                .collect(),
        )
    }
}

impl<const N: usize> From<&[(&'static str, &'static str); N]> for Attributes {
    fn from(attributes: &[(&'static str, &'static str); N]) -> Self {
        Self::from(*attributes)
    }
}

impl From<&[(&'static str, &'static str)]> for Attributes {
    fn from(attributes: &[(&'static str, &'static str)]) -> Self {
        Self(
            attributes
                .iter()
                .map(|(key, value)| (*key, Cow::Borrowed(*value)))
                .collect(),
        )
    }
}

/// An instrument type that a [`Registry`] can vend.
///
/// Instruments are shared handles: clones must observe the same underlying
/// value.
pub trait MetricObserver: Debug + Default + Clone + Send + Sync + 'static {
    /// Short kind name used by reporters, e.g. `"u64_counter"`.
    fn kind() -> &'static str;
}

/// A named family of instruments of type `T`, one per attribute set.
#[derive(Debug, Clone)]
pub struct Metric<T>
where
    T: MetricObserver,
{
    name: &'static str,
    description: &'static str,
    instruments: Arc<Mutex<BTreeMap<Attributes, T>>>,
}

impl<T> Metric<T>
where
    T: MetricObserver,
{
    fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            instruments: Default::default(),
        }
    }

    /// Name of this metric.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable description of this metric.
    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Get or create the instrument for the given attributes.
    ///
    /// Repeated calls with equal attributes return handles onto the same
    /// underlying value.
    pub fn recorder(&self, attributes: impl Into<Attributes>) -> T {
        let attributes = attributes.into();
        let mut instruments = self.instruments.lock();
        instruments.entry(attributes).or_default().clone()
    }

    /// Get the instrument for the given attributes, if it exists.
    pub fn get_observer(&self, attributes: &Attributes) -> Option<T> {
        self.instruments.lock().get(attributes).cloned()
    }

    /// Number of distinct attribute sets.
    pub fn num_instruments(&self) -> usize {
        self.instruments.lock().len()
    }
}

struct RegistryEntry {
    description: &'static str,
    kind: &'static str,
    metric: Box<dyn Any + Send>,
}

impl Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("description", &self.description)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A registry of uniquely named metrics.
///
/// Registering the same name twice with the same instrument type returns the
/// existing metric, so components do not need to coordinate who registers
/// first. The description of the first registration wins.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: Mutex<BTreeMap<&'static str, RegistryEntry>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric with the given name, or look up the existing one.
    ///
    /// # Panics
    ///
    /// If the name is already registered with a different instrument type.
    pub fn register_metric<T>(&self, name: &'static str, description: &'static str) -> Metric<T>
    where
        T: MetricObserver,
    {
        let mut metrics = self.metrics.lock();
        let entry = metrics.entry(name).or_insert_with(|| RegistryEntry {
            description,
            kind: T::kind(),
            metric: Box::new(Metric::<T>::new(name, description)),
        });

        match entry.metric.downcast_ref::<Metric<T>>() {
            Some(metric) => metric.clone(),
            None => panic!(
                "metric '{name}' already registered as kind '{}', not '{}'",
                entry.kind,
                T::kind(),
            ),
        }
    }

    /// `(name, kind, description)` of every registered metric, in name order.
    pub fn instruments(&self) -> Vec<(&'static str, &'static str, &'static str)> {
        self.metrics
            .lock()
            .iter()
            .map(|(name, entry)| (*name, entry.kind, entry.description))
            .collect()
    }
}

/// A monotonic counter.
#[derive(Debug, Clone, Default)]
pub struct U64Counter {
    value: Arc<AtomicU64>,
}

impl U64Counter {
    /// Increment the counter by `count`.
    pub fn inc(&self, count: u64) {
        self.value.fetch_add(count, Ordering::Relaxed);
    }

    /// Current value of the counter.
    pub fn fetch(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl MetricObserver for U64Counter {
    fn kind() -> &'static str {
        "u64_counter"
    }
}

/// A value that can move both up and down.
#[derive(Debug, Clone, Default)]
pub struct U64Gauge {
    value: Arc<AtomicU64>,
}

impl U64Gauge {
    /// Set the gauge to an absolute value.
    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Increase the gauge by `delta`.
    pub fn inc(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Decrease the gauge by `delta`, saturating at zero.
    pub fn dec(&self, delta: u64) {
        let _ = self.value.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
            Some(value.saturating_sub(delta))
        });
    }

    /// Current value of the gauge.
    pub fn fetch(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl MetricObserver for U64Gauge {
    fn kind() -> &'static str {
        "u64_gauge"
    }
}
