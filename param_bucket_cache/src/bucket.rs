//! Power-of-two bucketing of value-list lengths.

use crate::error::Error;

/// Default minimum padded count.
pub const DEFAULT_MIN_BUCKET: usize = 4;

/// Default largest list length that is still bucketed.
pub const DEFAULT_MAX_COUNT: usize = 512;

/// Validated bucketing configuration.
///
/// Strategy selection is a construction-time decision: pick the bucket boundaries once,
/// wire the config into the cache, and every invocation is bucketed the same way. There
/// are no runtime toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    min_bucket: usize,
    max_count: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            min_bucket: DEFAULT_MIN_BUCKET,
            max_count: DEFAULT_MAX_COUNT,
        }
    }
}

impl BucketConfig {
    /// Create a config with the given boundaries.
    ///
    /// `min_bucket` must be a power of two so that every padded count is one as well.
    /// `max_count` must be at least `min_bucket` and small enough that its next power of
    /// two is representable.
    pub fn new(min_bucket: usize, max_count: usize) -> Result<Self, Error> {
        if !min_bucket.is_power_of_two() {
            return Err(Error::invalid_argument(format!(
                "min_bucket must be a power of two, got {min_bucket}"
            )));
        }
        if max_count < min_bucket {
            return Err(Error::invalid_argument(format!(
                "max_count ({max_count}) must not be smaller than min_bucket ({min_bucket})"
            )));
        }
        if max_count.checked_next_power_of_two().is_none() {
            return Err(Error::invalid_argument(format!(
                "max_count ({max_count}) is too large to bucket"
            )));
        }
        Ok(Self {
            min_bucket,
            max_count,
        })
    }

    /// Minimum padded count.
    pub fn min_bucket(&self) -> usize {
        self.min_bucket
    }

    /// Largest list length that is still bucketed.
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Compute the padding target for a list of `raw_count` values.
    ///
    /// Deterministic and free of side effects. An empty list matches nothing and is
    /// rejected before any cache interaction. Lists longer than
    /// [`max_count`](Self::max_count) request the fallback strategy instead of producing
    /// ever-larger shapes.
    pub fn compute_bucket(&self, raw_count: usize) -> Result<Bucketing, Error> {
        if raw_count == 0 {
            return Err(Error::invalid_argument(
                "an empty membership list matches nothing and cannot be bucketed",
            ));
        }
        if raw_count > self.max_count {
            return Ok(Bucketing::Fallback {
                raw_count,
                max_count: self.max_count,
            });
        }

        // cannot overflow, construction checked that max_count has a next power of two
        let padded_count = raw_count.next_power_of_two().max(self.min_bucket);
        Ok(Bucketing::Bucketed(BucketSpec {
            raw_count,
            padded_count,
            min_bucket: self.min_bucket,
            max_count: self.max_count,
        }))
    }
}

/// Outcome of [`BucketConfig::compute_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucketing {
    /// The list fits a bucket.
    Bucketed(BucketSpec),

    /// The list is longer than the configured maximum.
    ///
    /// Padding such a list would produce huge shapes and risk engine limits on parameter
    /// counts, so the caller must switch to an unbounded strategy, e.g. a temp-table
    /// join. This is an expected result, not an error.
    Fallback {
        /// Number of values in the list.
        raw_count: usize,
        /// Configured maximum.
        max_count: usize,
    },
}

/// The padding target of a single value list.
///
/// Computed fresh on every invocation, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    raw_count: usize,
    padded_count: usize,
    min_bucket: usize,
    max_count: usize,
}

impl BucketSpec {
    /// Number of real values.
    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    /// Total number of parameter slots after padding.
    ///
    /// This is `max(min_bucket, next_power_of_two(raw_count))`.
    pub fn padded_count(&self) -> usize {
        self.padded_count
    }

    /// Number of padding slots.
    pub fn padding_len(&self) -> usize {
        self.padded_count - self.raw_count
    }

    /// Minimum padded count of the config that produced this spec.
    pub fn min_bucket(&self) -> usize {
        self.min_bucket
    }

    /// Largest bucketed list length of the config that produced this spec.
    pub fn max_count(&self) -> usize {
        self.max_count
    }
}
