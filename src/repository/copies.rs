//! Copies repository

use async_trait::async_trait;
use sqlx::SqliteConnection;

use super::{not_found, require_id, Dao};
use crate::{
    context::PersistenceContext,
    error::{AppError, AppResult},
    models::{Copy, CopyStatus, Entity},
};

#[derive(Clone)]
pub struct CopyDao {
    ctx: PersistenceContext,
}

impl CopyDao {
    pub fn new(ctx: PersistenceContext) -> Self {
        Self { ctx }
    }

    /// All copies of one book, ordered by id
    pub async fn find_by_book(&self, book_id: i64) -> AppResult<Vec<Copy>> {
        let mut conn = self.ctx.connection().await?;
        CopyInternal::find_by_book(&mut conn, book_id).await
    }
}

#[async_trait]
impl Dao<Copy> for CopyDao {
    async fn create(&self, copy: &mut Copy) -> AppResult<()> {
        if copy.status != CopyStatus::Available {
            return Err(AppError::BusinessRule(
                "A new copy must start out available; borrow it afterwards".to_string(),
            ));
        }

        let mut conn = self.ctx.connection().await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO copies (book_id, status) VALUES (?, ?) RETURNING id",
        )
        .bind(copy.book_id)
        .bind(copy.status.as_str())
        .fetch_one(&mut *conn)
        .await?;

        copy.set_id(id);
        tracing::debug!("Created copy {} of book {}", id, copy.book_id);
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<Copy>> {
        let mut conn = self.ctx.connection().await?;
        CopyInternal::find_by_id(&mut conn, id).await
    }

    async fn find_all(&self) -> AppResult<Vec<Copy>> {
        let mut conn = self.ctx.connection().await?;
        let rows = sqlx::query_as::<_, CopyRow>(
            "SELECT id, book_id, status FROM copies ORDER BY id",
        )
        .fetch_all(&mut *conn)
        .await?;
        rows.into_iter().map(Copy::try_from).collect()
    }

    /// The status may only be written as what the borrowings already imply:
    /// `Borrowed` with an open borrowing, `Available` without one. Use the
    /// borrowing DAO to move a copy in or out of circulation.
    async fn update(&self, copy: &Copy) -> AppResult<()> {
        let id = require_id(copy)?;
        let mut tx = self.ctx.begin().await?;

        if CopyInternal::find_by_id(&mut tx, id).await?.is_none() {
            return Err(not_found::<Copy>(id));
        }

        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrowings WHERE copy_id = ? AND return_date IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let expected = if open > 0 {
            CopyStatus::Borrowed
        } else {
            CopyStatus::Available
        };
        if copy.status != expected {
            tracing::warn!("Refused status {} for copy {} (expected {})", copy.status, id, expected);
            return Err(AppError::BusinessRule(format!(
                "Copy {} is {} according to its borrowings",
                id, expected
            )));
        }

        sqlx::query("UPDATE copies SET book_id = ?, status = ? WHERE id = ?")
            .bind(copy.book_id)
            .bind(copy.status.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Refused while any borrowing, open or returned, references the copy
    async fn delete(&self, id: i64) -> AppResult<()> {
        let mut tx = self.ctx.begin().await?;

        if CopyInternal::find_by_id(&mut tx, id).await?.is_none() {
            return Ok(());
        }

        let borrowings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM borrowings WHERE copy_id = ?")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if borrowings > 0 {
            tracing::warn!("Refused to delete copy {} with {} borrowings", id, borrowings);
            return Err(AppError::BusinessRule(format!(
                "Cannot delete copy {}: it has {} borrowing record(s)",
                id, borrowings
            )));
        }

        sqlx::query("DELETE FROM copies WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("Deleted copy {}", id);
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct CopyRow {
    id: i64,
    book_id: i64,
    status: String,
}

impl TryFrom<CopyRow> for Copy {
    type Error = AppError;

    fn try_from(row: CopyRow) -> Result<Self, Self::Error> {
        Ok(Copy {
            id: Some(row.id),
            book_id: row.book_id,
            status: row.status.parse()?,
        })
    }
}

/// Copy queries that run on a caller-supplied connection or transaction
pub(super) struct CopyInternal;

impl CopyInternal {
    pub(super) async fn find_by_id(
        con: &mut SqliteConnection,
        id: i64,
    ) -> AppResult<Option<Copy>> {
        let row = sqlx::query_as::<_, CopyRow>(
            "SELECT id, book_id, status FROM copies WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *con)
        .await?;
        row.map(Copy::try_from).transpose()
    }

    pub(super) async fn find_by_book(
        con: &mut SqliteConnection,
        book_id: i64,
    ) -> AppResult<Vec<Copy>> {
        let rows = sqlx::query_as::<_, CopyRow>(
            "SELECT id, book_id, status FROM copies WHERE book_id = ? ORDER BY id",
        )
        .bind(book_id)
        .fetch_all(&mut *con)
        .await?;
        rows.into_iter().map(Copy::try_from).collect()
    }

    pub(super) async fn set_status(
        con: &mut SqliteConnection,
        id: i64,
        status: CopyStatus,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE copies SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&mut *con)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found::<Copy>(id));
        }
        Ok(())
    }
}
