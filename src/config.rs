//! Configuration for query tagging.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::format::CommentFormat;
use crate::registry::{Resolver, TagRegistry};
use crate::tags::TagSpec;

/// Configuration options for query tagging.
///
/// # Example
///
/// ```rust
/// use sea_orm_query_tags::{CommentFormat, QueryTagsConfig, Resolver};
///
/// let config = QueryTagsConfig::default()
///     .with_application("billing")
///     .with_format(CommentFormat::SqlCommenter)
///     .with_tag("application")
///     .with_label("request_id", Resolver::context_value("request_id"))
///     .with_cache(true);
/// ```
#[derive(Debug, Clone)]
pub struct QueryTagsConfig {
    /// Comment serialization.
    /// Default: `CommentFormat::Legacy`
    pub format: CommentFormat,

    /// Ordered tags rendered into each comment.
    /// Default: empty (no comment is emitted)
    pub tags: TagSpec,

    /// Whether the comment goes before the statement instead of after it.
    /// Default: `false`
    pub prepend: bool,

    /// Whether the rendered comment is memoized per unit of work until its
    /// context changes.
    /// Default: `false`
    pub cache: bool,

    /// Resolvers for named tags.
    /// Default: empty
    pub registry: Arc<TagRegistry>,
}

impl Default for QueryTagsConfig {
    fn default() -> Self {
        Self {
            format: CommentFormat::Legacy,
            tags: TagSpec::new(),
            prepend: false,
            cache: false,
            registry: Arc::new(TagRegistry::new()),
        }
    }
}

impl QueryTagsConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the comment serialization format.
    pub fn with_format(mut self, format: CommentFormat) -> Self {
        self.format = format;
        self
    }

    /// Replace the whole tag spec.
    pub fn with_tags(mut self, tags: impl Into<TagSpec>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Append a reference to a registered tag.
    pub fn with_tag(mut self, name: impl Into<String>) -> Self {
        self.tags = self.tags.tag(name);
        self
    }

    /// Append an inline labeled resolver.
    pub fn with_label(mut self, label: impl Into<String>, resolver: impl Into<Resolver>) -> Self {
        self.tags = self.tags.label(label, resolver);
        self
    }

    /// Place the comment before the statement instead of after it.
    pub fn with_prepend(mut self, prepend: bool) -> Self {
        self.prepend = prepend;
        self
    }

    /// Enable or disable per-unit-of-work caching of the rendered comment.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Replace the registry used to resolve named tags.
    pub fn with_registry(mut self, registry: TagRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Register a named resolver.
    ///
    /// The registry is copied first if another configuration shares it.
    pub fn with_resolver(mut self, name: impl Into<String>, resolver: impl Into<Resolver>) -> Self {
        Arc::make_mut(&mut self.registry).register(name, resolver);
        self
    }

    /// Register the `application` tag as a constant.
    pub fn with_application(self, name: impl fmt::Display) -> Self {
        self.with_resolver("application", Resolver::constant(name))
    }

    /// Legacy `key:value` comments in configured order.
    pub fn legacy() -> Self {
        Self::default()
    }

    /// Sorted, percent-encoded sqlcommenter comments with caching enabled.
    pub fn sqlcommenter() -> Self {
        Self {
            format: CommentFormat::SqlCommenter,
            cache: true,
            ..Self::default()
        }
    }
}

/// Shared tagging engine holding the active configuration.
///
/// Every [`QueryTags::reconfigure`] bumps a generation counter. Cache slots
/// record the generation they were filled under and treat any other
/// generation as stale.
#[derive(Debug)]
pub struct QueryTags {
    config: RwLock<Arc<QueryTagsConfig>>,
    generation: AtomicU64,
}

impl QueryTags {
    /// Create an engine for `config` at generation 0.
    pub fn new(config: QueryTagsConfig) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            generation: AtomicU64::new(0),
        }
    }

    /// The active configuration and the generation it belongs to.
    pub fn current(&self) -> (Arc<QueryTagsConfig>, u64) {
        let config = self
            .config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        (Arc::clone(&config), self.generation.load(Ordering::Acquire))
    }

    /// The active configuration.
    pub fn config(&self) -> Arc<QueryTagsConfig> {
        self.current().0
    }

    /// The current configuration generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swap in a new configuration, invalidating every cached comment.
    pub fn reconfigure(&self, config: QueryTagsConfig) {
        let mut current = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::new(config);
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            generation = self.generation.load(Ordering::Acquire),
            "Query tags reconfigured"
        );
    }
}

impl Default for QueryTags {
    fn default() -> Self {
        Self::new(QueryTagsConfig::default())
    }
}

impl From<QueryTagsConfig> for QueryTags {
    fn from(config: QueryTagsConfig) -> Self {
        Self::new(config)
    }
}
