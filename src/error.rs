//! Error types for comment rendering and query transformation.

/// Boxed error returned by fallible resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while rendering a query comment or transforming a statement.
#[derive(Debug, thiserror::Error)]
pub enum QueryTagsError {
    /// A resolver failed while computing the value of a tag.
    #[error("resolver for tag `{tag}` failed: {source}")]
    Resolver {
        tag: String,
        #[source]
        source: BoxError,
    },

    /// A format selector did not name a known comment format.
    #[error("unknown comment format: {0}")]
    UnknownFormat(String),

    /// A step in the transformation chain rejected the statement.
    #[error("query transformer `{step}` failed: {message}")]
    Transform { step: String, message: String },
}

impl QueryTagsError {
    pub(crate) fn resolver(tag: impl Into<String>, source: BoxError) -> Self {
        Self::Resolver {
            tag: tag.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryTagsError>;
