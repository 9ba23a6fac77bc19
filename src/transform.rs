//! Query transformation steps and the query-tags step.

use std::fmt;
use std::sync::Arc;

use crate::annotate::annotate;
use crate::cache::{CacheOutcome, CacheSlot};
use crate::config::{QueryTags, QueryTagsConfig};
use crate::context::{ContextSnapshot, ContextSource, QueryContext};
use crate::error::Result;
use crate::render::render;

/// A `(sql) -> sql` step applied just before a statement reaches the driver.
pub trait QueryTransformer: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn transform(&self, sql: String) -> Result<String>;
}

/// An ordered list of transformation steps.
#[derive(Clone, Default)]
pub struct TransformChain {
    steps: Vec<Arc<dyn QueryTransformer>>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Steps run in the order they were added.
    pub fn with(mut self, step: impl QueryTransformer + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn push(&mut self, step: Arc<dyn QueryTransformer>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run `sql` through every step, stopping at the first error.
    pub fn apply(&self, sql: String) -> Result<String> {
        self.steps.iter().try_fold(sql, |sql, step| step.transform(sql))
    }
}

impl fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.name()))
            .finish()
    }
}

/// Query tagging for one unit of work.
///
/// Pairs the shared [`QueryTags`] engine with the context of a single
/// request or job and that unit's cache slot. Create one per unit of work;
/// scopes never observe each other's context or cache.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use sea_orm_query_tags::{QueryContext, QueryTags, QueryTagsConfig, Resolver, TagScope};
///
/// let tags = Arc::new(QueryTags::new(
///     QueryTagsConfig::default()
///         .with_application("billing")
///         .with_tag("application")
///         .with_label("request_id", Resolver::context_value("request_id")),
/// ));
///
/// let context = Arc::new(QueryContext::new());
/// context.set("request_id", "abc");
///
/// let scope = TagScope::new(tags, context);
/// assert_eq!(
///     scope.annotate("select 1").unwrap(),
///     "select 1 /*application:billing,request_id:abc*/"
/// );
/// ```
pub struct TagScope {
    tags: Arc<QueryTags>,
    context: Arc<dyn ContextSource>,
    slot: CacheSlot,
}

impl TagScope {
    pub fn new(tags: Arc<QueryTags>, context: Arc<dyn ContextSource>) -> Self {
        Self {
            tags,
            context,
            slot: CacheSlot::new(),
        }
    }

    /// A scope with an empty context of its own.
    pub fn detached(tags: Arc<QueryTags>) -> Self {
        Self::new(tags, Arc::new(QueryContext::new()))
    }

    /// The same engine with a different context and a fresh cache slot.
    pub fn with_context(&self, context: Arc<dyn ContextSource>) -> Self {
        Self::new(Arc::clone(&self.tags), context)
    }

    pub fn tags(&self) -> &Arc<QueryTags> {
        &self.tags
    }

    pub fn context(&self) -> &Arc<dyn ContextSource> {
        &self.context
    }

    /// The comment for the current context.
    ///
    /// With caching disabled this renders on every call. With caching
    /// enabled the previously rendered comment is reused until the context
    /// version or the configuration generation changes.
    pub fn comment(&self) -> Result<Arc<str>> {
        let (config, generation) = self.tags.current();
        self.comment_for(&config, generation)
    }

    /// Annotate `sql` with the current comment.
    pub fn annotate(&self, sql: &str) -> Result<String> {
        let (config, generation) = self.tags.current();
        let comment = self.comment_for(&config, generation)?;
        Ok(annotate(sql, &comment, config.prepend))
    }

    fn comment_for(&self, config: &QueryTagsConfig, generation: u64) -> Result<Arc<str>> {
        let render_now = |snapshot: &ContextSnapshot| -> Result<String> {
            let comment = render(&config.tags, config.format, &config.registry, snapshot)?;
            tracing::debug!(
                format = %config.format,
                tags = config.tags.len(),
                empty = comment.is_empty(),
                "Rendered query comment"
            );
            Ok(comment)
        };

        if !config.cache {
            return render_now(&self.context.snapshot()).map(Arc::from);
        }

        let (comment, outcome) = self
            .slot
            .get_or_render(generation, &*self.context, render_now)?;
        match outcome {
            CacheOutcome::Hit => tracing::trace!("Query comment cache hit"),
            CacheOutcome::Override => tracing::trace!("Serving overridden query comment"),
            CacheOutcome::Miss => tracing::trace!(
                context_version = self.context.version(),
                "Query comment cache miss"
            ),
        }
        Ok(comment)
    }

    /// Force `comment` to be used for this scope until [`TagScope::clear_cached_comment`]
    /// or the engine is reconfigured. Only honored when caching is enabled.
    pub fn set_cached_comment(&self, comment: impl Into<Arc<str>>) {
        self.slot.set_comment(self.tags.generation(), comment);
    }

    /// The comment currently held by the cache slot, if any.
    pub fn cached_comment(&self) -> Option<Arc<str>> {
        self.slot.cached()
    }

    pub fn clear_cached_comment(&self) {
        self.slot.clear();
    }
}

impl fmt::Debug for TagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagScope")
            .field("tags", &self.tags)
            .field("context_version", &self.context.version())
            .field("slot", &self.slot)
            .finish()
    }
}

impl QueryTransformer for TagScope {
    fn name(&self) -> &str {
        "query_tags"
    }

    fn transform(&self, sql: String) -> Result<String> {
        self.annotate(&sql)
    }
}

impl<T: QueryTransformer + ?Sized> QueryTransformer for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&self, sql: String) -> Result<String> {
        (**self).transform(sql)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::QueryTagsError;
    use crate::format::CommentFormat;
    use crate::registry::Resolver;

    struct Uppercase;

    impl QueryTransformer for Uppercase {
        fn name(&self) -> &str {
            "uppercase"
        }

        fn transform(&self, sql: String) -> Result<String> {
            Ok(sql.to_uppercase())
        }
    }

    struct Reject;

    impl QueryTransformer for Reject {
        fn name(&self) -> &str {
            "reject"
        }

        fn transform(&self, _sql: String) -> Result<String> {
            Err(QueryTagsError::Transform {
                step: self.name().to_string(),
                message: "rejected".to_string(),
            })
        }
    }

    fn counting_config(calls: Arc<AtomicUsize>, cache: bool) -> QueryTagsConfig {
        QueryTagsConfig::default()
            .with_cache(cache)
            .with_label(
                "user_id",
                Resolver::contextual(move |ctx| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ctx.get("user_id").map(str::to_owned)
                }),
            )
    }

    #[test]
    fn test_empty_config_leaves_sql_unchanged() {
        let scope = TagScope::detached(Arc::new(QueryTags::default()));
        assert_eq!(scope.annotate("select id from posts").unwrap(), "select id from posts");
    }

    #[test]
    fn test_prepend_from_config() {
        let tags = QueryTags::new(
            QueryTagsConfig::default()
                .with_application("active_record")
                .with_tag("application")
                .with_prepend(true),
        );
        let scope = TagScope::detached(Arc::new(tags));
        assert_eq!(
            scope.annotate("select id from posts").unwrap(),
            "/*application:active_record*/ select id from posts"
        );
    }

    #[test]
    fn test_cache_disabled_renders_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tags = Arc::new(QueryTags::new(counting_config(Arc::clone(&calls), false)));
        let context = Arc::new(QueryContext::new());
        context.set("user_id", "1");
        let scope = TagScope::new(tags, context);

        scope.comment().unwrap();
        scope.comment().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(scope.cached_comment().is_none());
    }

    #[test]
    fn test_cache_reuses_comment_until_context_changes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tags = Arc::new(QueryTags::new(counting_config(Arc::clone(&calls), true)));
        let context = Arc::new(QueryContext::new());
        context.set("user_id", "1");
        let scope = TagScope::new(tags, Arc::clone(&context) as Arc<dyn ContextSource>);

        let first = scope.comment().unwrap();
        let second = scope.comment().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        context.set("user_id", "2");
        let third = scope.comment().unwrap();
        assert_eq!(&*third, "/*user_id:2*/");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reconfigure_invalidates_cache() {
        let tags = Arc::new(QueryTags::new(
            QueryTagsConfig::default().with_cache(true).with_label("a", "1"),
        ));
        let scope = TagScope::detached(Arc::clone(&tags));
        assert_eq!(&*scope.comment().unwrap(), "/*a:1*/");

        tags.reconfigure(
            QueryTagsConfig::default()
                .with_cache(true)
                .with_format(CommentFormat::SqlCommenter)
                .with_label("a", "1"),
        );
        assert_eq!(&*scope.comment().unwrap(), "/*a='1'*/");
    }

    #[test]
    fn test_override_is_served() {
        let tags = Arc::new(QueryTags::new(
            QueryTagsConfig::default().with_cache(true).with_label("a", "1"),
        ));
        let scope = TagScope::detached(tags);

        scope.set_cached_comment("/*cached-comment*/");
        assert_eq!(
            scope.annotate("select 1").unwrap(),
            "select 1 /*cached-comment*/"
        );

        scope.clear_cached_comment();
        assert_eq!(scope.annotate("select 1").unwrap(), "select 1 /*a:1*/");
    }

    #[test]
    fn test_scopes_do_not_share_cache() {
        let tags = Arc::new(QueryTags::new(
            QueryTagsConfig::default()
                .with_cache(true)
                .with_label("user_id", Resolver::context_value("user_id")),
        ));
        let alice = Arc::new(QueryContext::new());
        alice.set("user_id", "alice");
        let bob = Arc::new(QueryContext::new());
        bob.set("user_id", "bob");

        let first = TagScope::new(Arc::clone(&tags), alice);
        let second = first.with_context(bob);

        assert_eq!(&*first.comment().unwrap(), "/*user_id:alice*/");
        assert_eq!(&*second.comment().unwrap(), "/*user_id:bob*/");
        assert_eq!(&*first.comment().unwrap(), "/*user_id:alice*/");
    }

    #[test]
    fn test_resolver_mutating_its_context_renders_fresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let context = Arc::new(QueryContext::new());
        context.set("n", "0");

        let live = Arc::clone(&context);
        let counter = Arc::clone(&calls);
        let tags = Arc::new(QueryTags::new(QueryTagsConfig::default().with_cache(true).with_label(
            "n",
            Resolver::contextual(move |ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                let n = ctx.get("n")?.to_string();
                let next = n.parse::<u32>().ok()? + 1;
                live.set("n", next.to_string());
                Some(n)
            }),
        )));
        let scope = TagScope::new(tags, Arc::clone(&context) as Arc<dyn ContextSource>);

        let comments: Vec<String> = (0..3).map(|_| scope.comment().unwrap().to_string()).collect();

        assert_eq!(comments, ["/*n:0*/", "/*n:1*/", "/*n:2*/"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_chain_runs_in_order() {
        let tags = Arc::new(QueryTags::new(QueryTagsConfig::default().with_label("app", "x")));
        let chain = TransformChain::new()
            .with(Uppercase)
            .with(TagScope::detached(tags));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.apply("select 1".to_string()).unwrap(), "SELECT 1 /*app:x*/");
    }

    #[test]
    fn test_chain_stops_on_error() {
        let chain = TransformChain::new().with(Reject).with(Uppercase);
        let err = chain.apply("select 1".to_string()).unwrap_err();
        assert!(matches!(err, QueryTagsError::Transform { ref step, .. } if step == "reject"));
    }
}
