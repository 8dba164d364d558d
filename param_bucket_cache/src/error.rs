//! Error type of this crate.

use crate::cache_system::DynError;

/// Errors surfaced to callers.
///
/// Over-long value lists are NOT an error, see [`Bucketing::Fallback`]: switching to an
/// unbounded strategy is an expected outcome that callers handle in their normal control
/// flow. Capacity pressure never surfaces either, it is always resolved by evicting the
/// least recently used plan.
///
/// [`Bucketing::Fallback`]: crate::bucket::Bucketing::Fallback
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input was malformed, e.g. an empty value list or mixed value types.
    ///
    /// Retrying does not help, the caller has to fix the request.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// The query engine failed to compile the statement.
    ///
    /// Every waiter of the shared compilation receives this error. The key is not cached,
    /// so the next request for the same shape triggers a fresh compilation.
    #[error("plan compilation failed: {0}")]
    CompileFailure(DynError),
}

impl Error {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}
