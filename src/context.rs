//! Per-unit-of-work key/value context read by contextual resolvers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Read access to the ambient state of one logical unit of work
/// (a request, a job, ...).
///
/// Implementations must bump [`ContextSource::version`] on every mutation so
/// cached comments can detect that they are stale.
pub trait ContextSource: Send + Sync {
    /// Current values together with the version they were read at.
    fn snapshot(&self) -> ContextSnapshot;

    /// Mutation counter. Any change to the values must change this number.
    fn version(&self) -> u64;
}

/// An immutable copy of a context's values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    version: u64,
    values: BTreeMap<String, String>,
}

impl ContextSnapshot {
    pub fn new(version: u64, values: BTreeMap<String, String>) -> Self {
        Self { version, values }
    }

    /// A snapshot with no values, used when no context is attached.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The stock [`ContextSource`]: a thread-safe map with a mutation counter.
///
/// Create one per request or job and share it (behind an `Arc`) between the
/// code that records state and the connection that tags queries.
///
/// ```rust
/// use sea_orm_query_tags::{ContextSource, QueryContext};
///
/// let context = QueryContext::new();
/// let before = context.version();
/// context.set("request_id", "abc-123");
/// assert_ne!(context.version(), before);
/// assert_eq!(context.get("request_id").as_deref(), Some("abc-123"));
/// ```
#[derive(Debug, Default)]
pub struct QueryContext {
    values: RwLock<BTreeMap<String, String>>,
    version: AtomicU64,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write(|values| {
            values.insert(key.into(), value.into());
        });
    }

    /// Set several values as one mutation.
    pub fn set_many<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.write(|values| {
            values.extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        });
    }

    /// Remove a value, returning it if it was present.
    pub fn remove(&self, key: &str) -> Option<String> {
        let mut removed = None;
        self.write(|values| removed = values.remove(key));
        removed
    }

    /// Remove every value.
    pub fn clear(&self) {
        self.write(|values| values.clear());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn write(&self, mutate: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut values = self
            .values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        mutate(&mut values);
        // Bumped while the write lock is held so a snapshot never pairs new
        // values with an old version.
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

impl ContextSource for QueryContext {
    fn snapshot(&self) -> ContextSnapshot {
        let values = self
            .values
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ContextSnapshot::new(self.version.load(Ordering::Acquire), values.clone())
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mutation_bumps_version() {
        let context = QueryContext::new();
        assert_eq!(context.version(), 0);

        context.set("user_id", "42");
        assert_eq!(context.version(), 1);

        context.set_many([("controller", "posts"), ("action", "index")]);
        assert_eq!(context.version(), 2);

        assert_eq!(context.remove("user_id").as_deref(), Some("42"));
        assert_eq!(context.version(), 3);

        context.clear();
        assert_eq!(context.version(), 4);
        assert!(context.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let context = QueryContext::new();
        context.set("job", "ReportJob");

        let snapshot = context.snapshot();
        context.set("job", "OtherJob");

        assert_eq!(snapshot.get("job"), Some("ReportJob"));
        assert_eq!(snapshot.version(), 1);
        assert_eq!(context.snapshot().get("job"), Some("OtherJob"));
    }

    #[test]
    fn test_contexts_are_independent() {
        let first = QueryContext::new();
        let second = QueryContext::new();
        first.set("request_id", "a");

        assert_eq!(second.version(), 0);
        assert_eq!(second.get("request_id"), None);
    }
}
