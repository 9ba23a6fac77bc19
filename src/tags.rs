//! Ordered tag specifications.

use crate::registry::Resolver;

/// One entry in a [`TagSpec`].
#[derive(Debug, Clone)]
pub enum TagEntry {
    /// A tag resolved through the registry by name.
    Named(String),
    /// Inline label/resolver pairs, emitted in the order given.
    Labeled(Vec<(String, Resolver)>),
}

/// The ordered list of tags to render into each comment.
///
/// Order is preserved for the legacy format. Labels are not deduplicated.
///
/// ```rust
/// use sea_orm_query_tags::{Resolver, TagSpec};
///
/// let tags = TagSpec::new()
///     .tag("application")
///     .label("custom_string", Resolver::constant("test content"));
/// assert_eq!(tags.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagSpec {
    entries: Vec<TagEntry>,
}

impl TagSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference to a registered tag.
    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.entries.push(TagEntry::Named(name.into()));
        self
    }

    /// Append an inline labeled resolver.
    pub fn label(mut self, label: impl Into<String>, resolver: impl Into<Resolver>) -> Self {
        self.entries
            .push(TagEntry::Labeled(vec![(label.into(), resolver.into())]));
        self
    }

    /// Append a block of labeled resolvers.
    pub fn labels<I, L, R>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<Resolver>,
    {
        let block = labels
            .into_iter()
            .map(|(label, resolver)| (label.into(), resolver.into()))
            .collect();
        self.entries.push(TagEntry::Labeled(block));
        self
    }

    pub fn push(&mut self, entry: TagEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    /// Number of tags, counting each label of a block.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| match entry {
                TagEntry::Named(_) => 1,
                TagEntry::Labeled(block) => block.len(),
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Into<String>> FromIterator<S> for TagSpec {
    fn from_iter<T: IntoIterator<Item = S>>(names: T) -> Self {
        Self {
            entries: names
                .into_iter()
                .map(|name| TagEntry::Named(name.into()))
                .collect(),
        }
    }
}

impl From<Vec<TagEntry>> for TagSpec {
    fn from(entries: Vec<TagEntry>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_preserves_order() {
        let tags = TagSpec::new()
            .tag("application")
            .labels([("controller", "posts"), ("action", "index")])
            .tag("pid");

        let names: Vec<&str> = tags
            .entries()
            .iter()
            .flat_map(|entry| match entry {
                TagEntry::Named(name) => vec![name.as_str()],
                TagEntry::Labeled(block) => block.iter().map(|(l, _)| l.as_str()).collect(),
            })
            .collect();
        assert_eq!(names, ["application", "controller", "action", "pid"]);
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn test_from_names() {
        let tags: TagSpec = ["application", "pid"].into_iter().collect();
        assert_eq!(tags.entries().len(), 2);
        assert!(TagSpec::new().is_empty());
    }
}
