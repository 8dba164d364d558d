//! Plan-cache-friendly normalization of variable-length membership predicates.
//!
//! Queries of the form `WHERE col IN (...)` arrive with arbitrary list lengths. Treated
//! naively, every length is a distinct statement shape that the query engine must compile
//! separately, which churns its plan cache. This crate collapses the lengths onto a small
//! set of shapes and keeps the compiled plans resident:
//!
//! - [`bucket`]: computes the padded parameter count, the next power of two of the list
//!   length with a configurable floor, or signals fallback for lists that are too long to
//!   bucket.
//! - [`plan_key`]: derives the cache key from the statement template and the padded count.
//!   The raw length and the values are deliberately excluded, so invocations with different
//!   lengths but equal padded counts share one plan.
//! - [`cache_system`]: a generic concurrency-safe cache with a strict LRU capacity bound.
//!   Loads are deduplicated, so concurrent misses for one key trigger a single compilation
//!   whose result (or failure) is shared by all waiters.
//! - [`params`]: scalar parameter values, type-homogeneity validation and the padding step
//!   that extends a value list to the padded count.
//! - [`cache`]: the [`PlanCache`] facade that ties the pipeline together and exposes
//!   metrics and a statistics snapshot.
//!
//! Padding repeats the last real value. `x IN (a, b, b, b)` selects exactly the rows of
//! `x IN (a, b)`, so padding never changes which rows match.

pub mod bucket;
pub mod cache;
pub mod cache_system;
pub mod error;
pub mod params;
pub mod plan_key;

pub use bucket::{BucketConfig, BucketSpec, Bucketing};
pub use cache::{CacheStats, PlanCache, PlanCacheParams, Prepared};
pub use error::Error;
pub use params::{PaddingPolicy, ParamValue, ValueList};
pub use plan_key::PlanKey;
