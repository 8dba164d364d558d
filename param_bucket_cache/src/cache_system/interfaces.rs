//! Type aliases shared by the cache plumbing.

use std::sync::Arc;

/// Dynamic error type.
///
/// Loads are shared by all waiters of a key, so the same error instance must be cloneable
/// to every one of them, hence the [`Arc`].
pub type DynError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type with value wrapped into [`Arc`] and a [`DynError`] error side.
pub type ArcResult<T> = Result<Arc<T>, DynError>;
