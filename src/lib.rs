//! # sea-orm-query-tags
//!
//! Contextual SQL comments for SeaORM queries.
//!
//! This crate attaches a `/* ... */` comment to every statement, carrying metadata such
//! as the application name, request id, or trace state. Slow-query logs and APM tools
//! can then correlate a query with the request or job that issued it.
//!
//! ## Features
//!
//! - **Pluggable Tags**: Constants, computed values, and values taken from the current
//!   request context
//! - **Two Formats**: Human-readable legacy `key:value` comments, or sorted and
//!   percent-encoded [sqlcommenter](https://google.github.io/sqlcommenter/) comments
//! - **Safe Escaping**: Tag values can never close the comment early and inject SQL
//! - **Optional Caching**: The rendered comment is reused until the context changes
//! - **Composable**: A plain `(sql) -> sql` step that chains with other transformers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sea_orm::Database;
//! use sea_orm_query_tags::prelude::*;
//!
//! // Configure once at startup
//! let tags = Arc::new(QueryTags::new(
//!     QueryTagsConfig::default()
//!         .with_application("billing")
//!         .with_tag("application")
//!         .with_label("request_id", Resolver::context_value("request_id")),
//! ));
//! let db = Database::connect("postgres://localhost/mydb").await?;
//!
//! // Per request
//! let context = Arc::new(QueryContext::new());
//! context.set("request_id", "abc-123");
//! let tagged = db.clone().with_query_tags(tags.clone(), context);
//!
//! // SELECT ... /*application:billing,request_id:abc-123*/
//! let users = Users::find().all(&tagged).await?;
//! ```
//!
//! ## Formats
//!
//! | Format | Output |
//! |--------|--------|
//! | `legacy` | `/*application:billing,request_id:abc-123*/` |
//! | `sqlcommenter` | `/*application='billing',request_id='abc-123'*/` |

mod annotate;
mod cache;
mod config;
mod connection;
mod context;
mod error;
mod escape;
mod format;
mod registry;
mod render;
mod tags;
mod transform;

pub use annotate::annotate;
pub use cache::{CacheOutcome, CacheSlot};
pub use config::{QueryTags, QueryTagsConfig};
pub use connection::{QueryTagsExt, TaggedConnection, TaggedTransaction};
pub use context::{ContextSnapshot, ContextSource, QueryContext};
pub use error::{BoxError, QueryTagsError, Result};
pub use escape::{escape, escape_sql_comment, guard_comment_delimiters, percent_encode_value};
pub use format::CommentFormat;
pub use registry::{Resolver, TagRegistry};
pub use render::{format_comment, render, resolve_pairs};
pub use tags::{TagEntry, TagSpec};
pub use transform::{QueryTransformer, TagScope, TransformChain};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CommentFormat, ContextSource, QueryContext, QueryTags, QueryTagsConfig, QueryTagsExt,
        QueryTransformer, Resolver, TagRegistry, TagScope, TagSpec, TaggedConnection,
        TaggedTransaction, TransformChain,
    };
}
