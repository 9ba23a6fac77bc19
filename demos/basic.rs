//! Basic example showing how to use sea-orm-query-tags.
//!
//! Run with: cargo run --example basic

use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database};
use sea_orm_query_tags::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sea_orm_query_tags=trace".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Format selector, as it would come from application settings
    let format: CommentFormat = std::env::var("QUERY_TAGS_FORMAT")
        .unwrap_or_else(|_| "sqlcommenter".into())
        .parse()?;

    let tags = Arc::new(QueryTags::new(
        QueryTagsConfig::default()
            .with_registry(TagRegistry::with_defaults("basic-example"))
            .with_format(format)
            .with_cache(true)
            .with_tag("application")
            .with_tag("pid")
            .with_label("request_id", Resolver::context_value("request_id")),
    ));

    // Connect to database
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    tracing::info!("Connecting to database...");

    let db = Database::connect(&database_url).await?;

    let context = Arc::new(QueryContext::new());
    context.set("request_id", "req-0001");

    // Option 1: Using the extension trait
    let tagged_db = db.with_query_tags(tags, context);

    // Option 2: With a custom transformation chain
    // let tagged_db = db.with_transformers(
    //     TransformChain::new().with(TagScope::new(tags, context))
    // );

    // SELECT 1 /*application='basic-example',pid='...',request_id='req-0001'*/
    tagged_db.execute_unprepared("SELECT 1").await?;

    tracing::info!("Query sent with tags");

    // You can also access the inner connection if needed
    let _inner = tagged_db.inner();

    Ok(())
}
