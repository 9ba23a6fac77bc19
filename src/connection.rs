//! Tagged database connection wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr,
    ExecResult, IsolationLevel, QueryResult, Statement, StreamTrait, TransactionError,
    TransactionTrait,
};

use crate::config::QueryTags;
use crate::context::ContextSource;
use crate::transform::{QueryTransformer, TagScope, TransformChain};

/// A wrapper around SeaORM's `DatabaseConnection` that rewrites every
/// statement through a [`TransformChain`] before it reaches the driver.
///
/// This wrapper implements `ConnectionTrait`, `StreamTrait`, and `TransactionTrait`,
/// making it a drop-in replacement for `DatabaseConnection`. The usual chain holds
/// a single [`TagScope`], which appends (or prepends) the query comment.
///
/// # Per-request scoping
///
/// Build one per request or job with [`TaggedConnection::scoped`] so each unit
/// of work tags queries from its own context and keeps its own cached comment.
/// The wrapper is not `Clone`: SeaORM's mock connection is not, and the
/// transformation chain is already shared behind an `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use sea_orm::Database;
/// use sea_orm_query_tags::{QueryContext, QueryTags, QueryTagsConfig, QueryTagsExt};
///
/// let tags = Arc::new(QueryTags::new(
///     QueryTagsConfig::sqlcommenter().with_application("billing").with_tag("application"),
/// ));
/// let db = Database::connect("postgres://localhost/mydb").await?;
///
/// let context = Arc::new(QueryContext::new());
/// context.set("request_id", "abc-123");
/// let tagged = db.with_query_tags(tags, context);
///
/// // All queries now carry /*application='billing'*/
/// let users = Users::find().all(&tagged).await?;
/// ```
#[derive(Debug)]
pub struct TaggedConnection {
    inner: DatabaseConnection,
    chain: Arc<TransformChain>,
}

impl TaggedConnection {
    /// Create a new tagged connection applying `chain` to every statement.
    pub fn new(connection: DatabaseConnection, chain: TransformChain) -> Self {
        Self {
            inner: connection,
            chain: Arc::new(chain),
        }
    }

    /// Create a tagged connection whose only step is a [`TagScope`] for `context`.
    pub fn scoped(
        connection: DatabaseConnection,
        tags: Arc<QueryTags>,
        context: Arc<dyn ContextSource>,
    ) -> Self {
        Self::new(
            connection,
            TransformChain::new().with(TagScope::new(tags, context)),
        )
    }

    /// Get a reference to the underlying `DatabaseConnection`.
    pub fn inner(&self) -> &DatabaseConnection {
        &self.inner
    }

    /// Get the transformation chain.
    pub fn chain(&self) -> &TransformChain {
        &self.chain
    }

    /// Consume the wrapper and return the inner `DatabaseConnection`.
    pub fn into_inner(self) -> DatabaseConnection {
        self.inner
    }

    fn transform(&self, sql: String) -> Result<String, DbErr> {
        rewrite(&self.chain, sql)
    }

    fn transform_statement(&self, stmt: Statement) -> Result<Statement, DbErr> {
        rewrite_statement(&self.chain, stmt)
    }

    /// Begin a transaction whose statements go through the same chain.
    pub async fn begin_tagged(&self) -> Result<TaggedTransaction, DbErr> {
        let transaction = self.inner.begin().await?;
        Ok(TaggedTransaction::new(transaction, Arc::clone(&self.chain)))
    }

    /// Begin a tagged transaction with the given isolation level and access mode.
    pub async fn begin_tagged_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<TaggedTransaction, DbErr> {
        let transaction = self
            .inner
            .begin_with_config(isolation_level, access_mode)
            .await?;
        Ok(TaggedTransaction::new(transaction, Arc::clone(&self.chain)))
    }

    /// Run `callback` inside a tagged transaction.
    ///
    /// Commits when the callback returns `Ok`, rolls back otherwise.
    pub async fn transaction_tagged<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c TaggedTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        let transaction = self
            .begin_tagged()
            .await
            .map_err(TransactionError::Connection)?;

        let result = callback(&transaction).await;
        match result {
            Ok(value) => {
                transaction
                    .commit()
                    .await
                    .map_err(TransactionError::Connection)?;
                Ok(value)
            }
            Err(e) => {
                transaction
                    .rollback()
                    .await
                    .map_err(TransactionError::Connection)?;
                Err(TransactionError::Transaction(e))
            }
        }
    }
}

/// Run `sql` through `chain`, converting failures into `DbErr`.
fn rewrite(chain: &TransformChain, sql: String) -> Result<String, DbErr> {
    chain.apply(sql).map_err(|e| {
        tracing::error!(error = %e, "Query transformation failed; statement not sent");
        DbErr::Custom(e.to_string())
    })
}

fn rewrite_statement(chain: &TransformChain, mut stmt: Statement) -> Result<Statement, DbErr> {
    stmt.sql = rewrite(chain, stmt.sql)?;
    Ok(stmt)
}

impl AsRef<DatabaseConnection> for TaggedConnection {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.inner
    }
}

#[async_trait]
impl ConnectionTrait for TaggedConnection {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let stmt = self.transform_statement(stmt)?;
        self.inner.execute(stmt).await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let sql = self.transform(sql.to_string())?;
        self.inner.execute_unprepared(&sql).await
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let stmt = self.transform_statement(stmt)?;
        self.inner.query_one(stmt).await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let stmt = self.transform_statement(stmt)?;
        self.inner.query_all(stmt).await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

#[async_trait]
impl StreamTrait for TaggedConnection {
    type Stream<'a> = <DatabaseConnection as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        let stmt = self.transform_statement(stmt);

        Box::pin(async move { self.inner.stream(stmt?).await })
    }
}

/// These return a plain `DatabaseTransaction`, whose statements are not
/// rewritten. Use [`TaggedConnection::begin_tagged`] or
/// [`TaggedConnection::transaction_tagged`] to keep tagging inside a transaction.
#[async_trait]
impl TransactionTrait for TaggedConnection {
    async fn begin(&self) -> Result<DatabaseTransaction, DbErr> {
        self.inner.begin().await
    }

    async fn begin_with_config(
        &self,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<DatabaseTransaction, DbErr> {
        self.inner
            .begin_with_config(isolation_level, access_mode)
            .await
    }

    async fn transaction<F, T, E>(&self, callback: F) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        self.inner.transaction(callback).await
    }

    async fn transaction_with_config<F, T, E>(
        &self,
        callback: F,
        isolation_level: Option<IsolationLevel>,
        access_mode: Option<AccessMode>,
    ) -> Result<T, TransactionError<E>>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>
            + Send,
        T: Send,
        E: std::fmt::Display + std::fmt::Debug + Send,
    {
        self.inner
            .transaction_with_config(callback, isolation_level, access_mode)
            .await
    }
}

/// A `DatabaseTransaction` whose statements go through the [`TransformChain`]
/// of the [`TaggedConnection`] that opened it.
///
/// # Example
///
/// ```rust,ignore
/// let txn = tagged.begin_tagged().await?;
/// // UPDATE posts SET views = views + 1 /*application:billing*/
/// txn.execute_unprepared("UPDATE posts SET views = views + 1").await?;
/// txn.commit().await?;
/// ```
pub struct TaggedTransaction {
    inner: DatabaseTransaction,
    chain: Arc<TransformChain>,
}

impl TaggedTransaction {
    fn new(transaction: DatabaseTransaction, chain: Arc<TransformChain>) -> Self {
        Self {
            inner: transaction,
            chain,
        }
    }

    /// Get a reference to the underlying `DatabaseTransaction`.
    pub fn inner(&self) -> &DatabaseTransaction {
        &self.inner
    }

    /// Consume the wrapper and return the inner `DatabaseTransaction`.
    pub fn into_inner(self) -> DatabaseTransaction {
        self.inner
    }

    /// Commit the transaction.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.inner.commit().await
    }

    /// Roll back the transaction.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.inner.rollback().await
    }
}

impl std::fmt::Debug for TaggedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggedTransaction")
            .field("chain", &self.chain)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConnectionTrait for TaggedTransaction {
    fn get_database_backend(&self) -> DbBackend {
        self.inner.get_database_backend()
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        let stmt = rewrite_statement(&self.chain, stmt)?;
        self.inner.execute(stmt).await
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        let sql = rewrite(&self.chain, sql.to_string())?;
        self.inner.execute_unprepared(&sql).await
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        let stmt = rewrite_statement(&self.chain, stmt)?;
        self.inner.query_one(stmt).await
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        let stmt = rewrite_statement(&self.chain, stmt)?;
        self.inner.query_all(stmt).await
    }

    fn support_returning(&self) -> bool {
        self.inner.support_returning()
    }

    fn is_mock_connection(&self) -> bool {
        self.inner.is_mock_connection()
    }
}

#[async_trait]
impl StreamTrait for TaggedTransaction {
    type Stream<'a> = <DatabaseTransaction as StreamTrait>::Stream<'a>;

    fn stream<'a>(
        &'a self,
        stmt: Statement,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Stream<'a>, DbErr>> + 'a + Send>> {
        let stmt = rewrite_statement(&self.chain, stmt);

        Box::pin(async move { self.inner.stream(stmt?).await })
    }
}

/// Extension trait for easy wrapping of database connections.
pub trait QueryTagsExt {
    /// Tag queries from `context` using the shared `tags` engine.
    fn with_query_tags(
        self,
        tags: Arc<QueryTags>,
        context: Arc<dyn ContextSource>,
    ) -> TaggedConnection;

    /// Apply a custom transformation chain.
    fn with_transformers(self, chain: TransformChain) -> TaggedConnection;

    /// Apply a single transformation step.
    fn with_transformer(self, step: impl QueryTransformer + 'static) -> TaggedConnection;
}

impl QueryTagsExt for DatabaseConnection {
    fn with_query_tags(
        self,
        tags: Arc<QueryTags>,
        context: Arc<dyn ContextSource>,
    ) -> TaggedConnection {
        TaggedConnection::scoped(self, tags, context)
    }

    fn with_transformers(self, chain: TransformChain) -> TaggedConnection {
        TaggedConnection::new(self, chain)
    }

    fn with_transformer(self, step: impl QueryTransformer + 'static) -> TaggedConnection {
        TaggedConnection::new(self, TransformChain::new().with(step))
    }
}
