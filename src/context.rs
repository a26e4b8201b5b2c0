//! Persistence context
//!
//! Owns the one connection pool of the process. Every DAO is handed a clone
//! of the same context, so they all share that pool. The pool is opened on
//! first use and the embedded schema in `migrations/` is applied at that
//! point. `close()` releases it; after that the context refuses to reopen.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Sqlite, Transaction};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Shared handle to the process-wide connection pool
#[derive(Clone)]
pub struct PersistenceContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: DatabaseConfig,
    pool: OnceCell<SqlitePool>,
    closed: AtomicBool,
}

impl PersistenceContext {
    /// Create a context for the configured database. Nothing is opened yet.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                config,
                pool: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Private in-memory store, used by tests
    pub fn in_memory() -> Self {
        Self::new(DatabaseConfig {
            url: IN_MEMORY_URL.to_string(),
            max_connections: 1,
            ..DatabaseConfig::default()
        })
    }

    /// The shared pool, opened and migrated on first call
    pub async fn pool(&self) -> AppResult<&SqlitePool> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(AppError::ContextClosed);
        }
        self.inner.pool.get_or_try_init(|| self.open()).await
    }

    /// A live connection for a single DAO operation
    pub async fn connection(&self) -> AppResult<PoolConnection<Sqlite>> {
        let conn = self.pool().await?.acquire().await?;
        Ok(conn)
    }

    /// Start a transaction. Dropping it without `commit()` rolls back.
    pub async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        let tx = self.pool().await?.begin().await?;
        Ok(tx)
    }

    pub fn is_open(&self) -> bool {
        self.inner.pool.initialized() && !self.inner.closed.load(Ordering::Acquire)
    }

    /// Release every connection. Safe to call repeatedly, or before the pool
    /// was ever opened.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pool) = self.inner.pool.get() {
            pool.close().await;
            tracing::info!("Persistence context closed");
        }
    }

    fn is_in_memory(&self) -> bool {
        self.inner.config.url.contains(":memory:")
    }

    async fn open(&self) -> AppResult<SqlitePool> {
        let config = &self.inner.config;

        let mut connect_opts = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .disable_statement_logging();

        // An in-memory database lives and dies with its connection, so the
        // pool keeps exactly one and never recycles it.
        let pool_opts = if self.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            connect_opts = connect_opts.journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections.max(1))
                .acquire_timeout(Duration::from_secs(30))
        };

        let pool = pool_opts.connect_with(connect_opts).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("Persistence context opened ({})", config.url);
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_lazily_on_first_use() {
        let ctx = PersistenceContext::in_memory();
        assert!(!ctx.is_open());

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('publishers', 'books', 'copies', 'users', 'librarians', 'borrowings')",
        )
        .fetch_one(ctx.pool().await.unwrap())
        .await
        .unwrap();

        assert_eq!(tables, 6);
        assert!(ctx.is_open());
    }

    #[tokio::test]
    async fn clones_share_one_pool() {
        let ctx = PersistenceContext::in_memory();
        let other = ctx.clone();

        sqlx::query("INSERT INTO publishers (name) VALUES ('Shared')")
            .execute(ctx.pool().await.unwrap())
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM publishers")
            .fetch_one(other.pool().await.unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let ctx = PersistenceContext::in_memory();
        ctx.pool().await.unwrap();

        ctx.close().await;
        ctx.close().await;

        assert!(!ctx.is_open());
        assert!(matches!(ctx.connection().await, Err(AppError::ContextClosed)));
    }

    #[tokio::test]
    async fn close_without_open_never_connects() {
        let ctx = PersistenceContext::in_memory();
        ctx.close().await;

        assert!(matches!(ctx.pool().await, Err(AppError::ContextClosed)));
        assert!(matches!(ctx.begin().await, Err(AppError::ContextClosed)));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("library.db").display()),
            ..DatabaseConfig::default()
        };

        let ctx = PersistenceContext::new(config.clone());
        sqlx::query("INSERT INTO users (name, email) VALUES ('Ada', 'ada@example.com')")
            .execute(ctx.pool().await.unwrap())
            .await
            .unwrap();
        ctx.close().await;

        let reopened = PersistenceContext::new(config);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(reopened.pool().await.unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
        reopened.close().await;
    }
}
