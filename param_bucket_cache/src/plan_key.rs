//! Cache keys for compiled plans.

use std::{fmt, sync::Arc};

/// Key under which a compiled plan is cached.
///
/// Derived from the statement template, i.e. the query text with the membership list
/// reduced to placeholders, and the padded parameter count. Invocations with different raw
/// lengths but equal padded counts derive equal keys and therefore share one plan. The raw
/// length, the values and the padding choice are deliberately not part of the key.
///
/// The full template text is retained, so key equality is exact rather than modulo a hash
/// collision. Keys are cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    statement: Arc<str>,
    padded_count: usize,
}

impl PlanKey {
    /// Derive the key for a statement template and padded count.
    ///
    /// Pure and deterministic, equal inputs always derive equal keys.
    pub fn derive(statement: impl Into<Arc<str>>, padded_count: usize) -> Self {
        Self {
            statement: statement.into(),
            padded_count,
        }
    }

    /// The statement template.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Number of placeholders the plan is compiled for.
    pub fn padded_count(&self) -> usize {
        self.padded_count
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [n={}]", self.statement, self.padded_count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    const STATEMENT: &str = "SELECT * FROM t WHERE c IN (...)";

    #[test]
    fn test_equality() {
        let a = PlanKey::derive(STATEMENT, 8);
        let b = PlanKey::derive(STATEMENT.to_owned(), 8);
        assert_eq!(a, b);

        assert_ne!(a, PlanKey::derive(STATEMENT, 16));
        assert_ne!(a, PlanKey::derive("SELECT * FROM u WHERE c IN (...)", 8));
    }

    #[test]
    fn test_hash_agrees_with_eq() {
        let keys: HashSet<_> = [
            PlanKey::derive(STATEMENT, 8),
            PlanKey::derive(STATEMENT, 8),
            PlanKey::derive(STATEMENT, 16),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_accessors_and_display() {
        let key = PlanKey::derive(STATEMENT, 8);
        assert_eq!(key.statement(), STATEMENT);
        assert_eq!(key.padded_count(), 8);
        assert_eq!(
            key.to_string(),
            "SELECT * FROM t WHERE c IN (...) [n=8]",
        );
    }
}
