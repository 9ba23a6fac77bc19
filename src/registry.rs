//! Named tag resolvers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::ContextSnapshot;
use crate::error::{BoxError, QueryTagsError, Result};

type Resolved = std::result::Result<Option<String>, BoxError>;
type ComputeFn = dyn Fn() -> Resolved + Send + Sync;
type ContextFn = dyn Fn(&ContextSnapshot) -> Resolved + Send + Sync;

/// How the value of a tag is produced.
///
/// A resolver producing `None` or an empty string is left out of the comment.
#[derive(Clone)]
pub enum Resolver {
    /// A fixed value.
    Constant(String),
    /// Computed on every render, without looking at the context.
    Computed(Arc<ComputeFn>),
    /// Computed on every render from the current context snapshot.
    Contextual(Arc<ContextFn>),
}

impl Resolver {
    /// A fixed value, stored in its `Display` form.
    pub fn constant(value: impl fmt::Display) -> Self {
        Resolver::Constant(value.to_string())
    }

    /// A value computed on every render without looking at the context.
    pub fn computed<F, V>(compute: F) -> Self
    where
        F: Fn() -> Option<V> + Send + Sync + 'static,
        V: Into<String>,
    {
        Resolver::Computed(Arc::new(move || -> Resolved { Ok(compute().map(Into::into)) }))
    }

    /// A computed value that may fail. Failures abort rendering.
    pub fn try_computed<F, V, E>(compute: F) -> Self
    where
        F: Fn() -> std::result::Result<Option<V>, E> + Send + Sync + 'static,
        V: Into<String>,
        E: Into<BoxError>,
    {
        Resolver::Computed(Arc::new(move || -> Resolved {
            compute().map(|v| v.map(Into::into)).map_err(Into::into)
        }))
    }

    /// A value computed on every render from the context snapshot.
    pub fn contextual<F, V>(compute: F) -> Self
    where
        F: Fn(&ContextSnapshot) -> Option<V> + Send + Sync + 'static,
        V: Into<String>,
    {
        Resolver::Contextual(Arc::new(move |ctx: &ContextSnapshot| -> Resolved {
            Ok(compute(ctx).map(Into::into))
        }))
    }

    /// A contextual value that may fail. Failures abort rendering.
    pub fn try_contextual<F, V, E>(compute: F) -> Self
    where
        F: Fn(&ContextSnapshot) -> std::result::Result<Option<V>, E> + Send + Sync + 'static,
        V: Into<String>,
        E: Into<BoxError>,
    {
        Resolver::Contextual(Arc::new(move |ctx: &ContextSnapshot| -> Resolved {
            compute(ctx).map(|v| v.map(Into::into)).map_err(Into::into)
        }))
    }

    /// Reads `key` from the context snapshot.
    pub fn context_value(key: impl Into<String>) -> Self {
        let key = key.into();
        Resolver::contextual(move |ctx| ctx.get(&key).map(str::to_owned))
    }

    /// Produce the value for the tag `label`, dropping empty results.
    pub fn resolve(&self, label: &str, context: &ContextSnapshot) -> Result<Option<String>> {
        let value = match self {
            Resolver::Constant(value) => Some(value.clone()),
            Resolver::Computed(compute) => {
                compute().map_err(|e| QueryTagsError::resolver(label, e))?
            }
            Resolver::Contextual(compute) => {
                compute(context).map_err(|e| QueryTagsError::resolver(label, e))?
            }
        };
        Ok(value.filter(|v| !v.is_empty()))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Resolver::Computed(_) => f.write_str("Computed(..)"),
            Resolver::Contextual(_) => f.write_str("Contextual(..)"),
        }
    }
}

impl From<&str> for Resolver {
    fn from(value: &str) -> Self {
        Resolver::Constant(value.to_string())
    }
}

impl From<String> for Resolver {
    fn from(value: String) -> Self {
        Resolver::Constant(value)
    }
}

/// Mapping from tag name to [`Resolver`].
///
/// Built at configuration time and read on every render. Registering a name
/// that already exists replaces the earlier resolver.
///
/// ```rust
/// use sea_orm_query_tags::{ContextSnapshot, Resolver, TagRegistry};
///
/// let mut registry = TagRegistry::new();
/// registry.register("application", Resolver::constant("billing"));
///
/// let value = registry.resolve("application", &ContextSnapshot::empty()).unwrap();
/// assert_eq!(value.as_deref(), Some("billing"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    resolvers: HashMap<String, Resolver>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `application` and `pid` tags.
    pub fn with_defaults(application: impl fmt::Display) -> Self {
        let mut registry = Self::new();
        registry.register("application", Resolver::constant(application));
        registry.register(
            "pid",
            Resolver::computed(|| Some(std::process::id().to_string())),
        );
        registry
    }

    /// Register `resolver` under `name`, replacing any earlier one.
    pub fn register(&mut self, name: impl Into<String>, resolver: impl Into<Resolver>) {
        self.resolvers.insert(name.into(), resolver.into());
    }

    pub fn get(&self, name: &str) -> Option<&Resolver> {
        self.resolvers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Resolve a named tag. Unknown names yield `Ok(None)`.
    pub fn resolve(&self, name: &str, context: &ContextSnapshot) -> Result<Option<String>> {
        match self.resolvers.get(name) {
            Some(resolver) => resolver.resolve(name, context),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io;

    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> ContextSnapshot {
        let values: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ContextSnapshot::new(1, values)
    }

    #[test]
    fn test_unknown_name_is_dropped() {
        let registry = TagRegistry::new();
        assert_eq!(registry.resolve("missing", &ContextSnapshot::empty()).unwrap(), None);
    }

    #[test]
    fn test_resolver_shapes() {
        let mut registry = TagRegistry::new();
        registry.register("constant", Resolver::constant(42));
        registry.register("computed", Resolver::computed(|| Some("computed")));
        registry.register("controller", Resolver::context_value("controller"));

        let ctx = snapshot(&[("controller", "posts")]);
        assert_eq!(registry.resolve("constant", &ctx).unwrap().as_deref(), Some("42"));
        assert_eq!(registry.resolve("computed", &ctx).unwrap().as_deref(), Some("computed"));
        assert_eq!(registry.resolve("controller", &ctx).unwrap().as_deref(), Some("posts"));
    }

    #[test]
    fn test_empty_and_none_are_dropped() {
        let mut registry = TagRegistry::new();
        registry.register("empty", Resolver::constant(""));
        registry.register("none", Resolver::computed(|| None::<String>));
        registry.register("absent", Resolver::context_value("user_id"));

        let ctx = ContextSnapshot::empty();
        assert_eq!(registry.resolve("empty", &ctx).unwrap(), None);
        assert_eq!(registry.resolve("none", &ctx).unwrap(), None);
        assert_eq!(registry.resolve("absent", &ctx).unwrap(), None);
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = TagRegistry::new();
        registry.register("application", "first");
        registry.register("application", "second");

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry
                .resolve("application", &ContextSnapshot::empty())
                .unwrap()
                .as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_failing_resolver_surfaces_error() {
        let mut registry = TagRegistry::new();
        registry.register(
            "broken",
            Resolver::try_computed(|| {
                Err::<Option<String>, _>(io::Error::new(io::ErrorKind::Other, "boom"))
            }),
        );

        let err = registry.resolve("broken", &ContextSnapshot::empty()).unwrap_err();
        match err {
            QueryTagsError::Resolver { tag, source } => {
                assert_eq!(tag, "broken");
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_with_defaults() {
        let registry = TagRegistry::with_defaults("active_record");
        let ctx = ContextSnapshot::empty();

        assert_eq!(
            registry.resolve("application", &ctx).unwrap().as_deref(),
            Some("active_record")
        );
        assert_eq!(
            registry.resolve("pid", &ctx).unwrap(),
            Some(std::process::id().to_string())
        );
    }
}
