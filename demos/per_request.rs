//! Per-request tagging against a mock database.
//!
//! Each simulated request gets its own context and cache slot while sharing
//! one configured engine.
//!
//! Run with: cargo run --example per_request

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseBackend, MockDatabase, MockExecResult};
use sea_orm_query_tags::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn handle_request(
    tags: Arc<QueryTags>,
    request_id: &str,
    user_id: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ])
        .into_connection();

    let context = Arc::new(QueryContext::new());
    context.set("request_id", request_id);
    let tagged = db.with_query_tags(tags, Arc::clone(&context) as Arc<dyn ContextSource>);

    tagged.execute_unprepared("SELECT * FROM posts").await?;

    // Authentication happens mid-request; the cached comment is refreshed.
    context.set("user_id", user_id);
    tagged.execute_unprepared("UPDATE posts SET views = views + 1").await?;

    for transaction in tagged.into_inner().into_transaction_log() {
        tracing::info!(request_id, "{:?}", transaction);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tags = Arc::new(QueryTags::new(
        QueryTagsConfig::sqlcommenter()
            .with_application("per-request-example")
            .with_tag("application")
            .with_label("request_id", Resolver::context_value("request_id"))
            .with_label("user_id", Resolver::context_value("user_id")),
    ));

    let first = tokio::spawn(handle_request(Arc::clone(&tags), "req-1", "alice"));
    let second = tokio::spawn(handle_request(Arc::clone(&tags), "req-2", "bob"));

    first.await??;
    second.await??;

    Ok(())
}
