//! Rendering of tag specs into SQL comments.

use crate::context::ContextSnapshot;
use crate::error::Result;
use crate::escape::escape;
use crate::format::CommentFormat;
use crate::registry::TagRegistry;
use crate::tags::{TagEntry, TagSpec};

/// Resolve every entry of `tags` into `(label, value)` pairs, in order.
///
/// Pairs whose value is missing or empty are dropped. The first failing
/// resolver aborts resolution.
pub fn resolve_pairs(
    tags: &TagSpec,
    registry: &TagRegistry,
    context: &ContextSnapshot,
) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(tags.len());

    for entry in tags.entries() {
        match entry {
            TagEntry::Named(name) => {
                if let Some(value) = registry.resolve(name, context)? {
                    pairs.push((name.clone(), value));
                }
            }
            TagEntry::Labeled(block) => {
                for (label, resolver) in block {
                    if let Some(value) = resolver.resolve(label, context)? {
                        pairs.push((label.clone(), value));
                    }
                }
            }
        }
    }

    Ok(pairs)
}

/// Serialize resolved pairs as a `/* ... */` comment.
///
/// Returns an empty string when there are no pairs.
pub fn format_comment(mut pairs: Vec<(String, String)>, format: CommentFormat) -> String {
    if pairs.is_empty() {
        return String::new();
    }

    if format.sorted() {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
    }

    let separator = format.key_value_separator();
    let content = pairs
        .iter()
        .map(|(label, value)| {
            let key = escape(label, format);
            let value = escape(value, format);
            match format {
                CommentFormat::Legacy => format!("{key}{separator}{value}"),
                CommentFormat::SqlCommenter => format!("{key}{separator}'{value}'"),
            }
        })
        .collect::<Vec<_>>()
        .join(",");

    format!("/*{content}*/")
}

/// Render `tags` into a comment for the given format and context.
///
/// ```rust
/// use sea_orm_query_tags::{render, CommentFormat, ContextSnapshot, Resolver, TagRegistry, TagSpec};
///
/// let registry = TagRegistry::with_defaults("active_record");
/// let tags = TagSpec::new()
///     .tag("application")
///     .label("custom_string", Resolver::constant("test content"));
///
/// let comment = render(&tags, CommentFormat::Legacy, &registry, &ContextSnapshot::empty()).unwrap();
/// assert_eq!(comment, "/*application:active_record,custom_string:test content*/");
/// ```
pub fn render(
    tags: &TagSpec,
    format: CommentFormat,
    registry: &TagRegistry,
    context: &ContextSnapshot,
) -> Result<String> {
    let pairs = resolve_pairs(tags, registry, context)?;
    Ok(format_comment(pairs, format))
}
